use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::time::Instant;

use tracing::debug;

use crate::audio::AudioData;
use crate::error::{CaptureError, PlaybackError, Result};

/// How the transport's position advances while playing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Follow the wall clock
    Realtime,
    /// Advance by a fixed step on every tick
    Stepped { step: f64 },
}

/// Lifecycle notifications from the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    MetadataLoaded { duration: f64 },
    Ended,
}

/// Receiving end of a transport subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct EventSubscription {
    rx: Receiver<TransportEvent>,
    _alive: Arc<()>,
}

impl EventSubscription {
    pub fn try_next(&self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain pending events and report whether `Ended` was among them
    pub fn ended(&self) -> bool {
        let mut ended = false;
        while let Some(event) = self.try_next() {
            ended |= event == TransportEvent::Ended;
        }
        ended
    }
}

struct Listener {
    tx: Sender<TransportEvent>,
    alive: Weak<()>,
}

/// Audio transport supplying the clock position
///
/// Paused and ended follow media element semantics: an ended transport is
/// also paused, and playing it again restarts from zero.
pub struct MediaTransport {
    track: Arc<AudioData>,
    pacing: Pacing,
    position: f64,
    paused: bool,
    ended: bool,
    anchor: Option<(Instant, f64)>,
    listeners: Vec<Listener>,
    route_claimed: bool,
}

impl MediaTransport {
    pub fn new(track: Arc<AudioData>, pacing: Pacing) -> Self {
        Self {
            track,
            pacing,
            position: 0.0,
            paused: true,
            ended: false,
            anchor: None,
            listeners: Vec::new(),
            route_claimed: false,
        }
    }

    pub fn track(&self) -> &Arc<AudioData> {
        &self.track
    }

    pub fn duration(&self) -> f64 {
        self.track.duration
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn set_pacing(&mut self, pacing: Pacing) {
        let position = self.position();
        self.pacing = pacing;
        self.position = position;
        self.anchor = (!self.paused).then(|| (Instant::now(), position));
    }

    /// Current position in seconds
    pub fn position(&self) -> f64 {
        match (self.pacing, self.anchor) {
            (Pacing::Realtime, Some((started, base))) => {
                (base + started.elapsed().as_secs_f64()).min(self.duration())
            }
            _ => self.position,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended
    }

    pub fn play(&mut self) -> Result<()> {
        if !self.track.is_playable() {
            return Err(PlaybackError::EmptyTrack.into());
        }
        if self.ended {
            self.position = 0.0;
            self.ended = false;
        }
        if self.paused {
            self.paused = false;
            self.anchor = Some((Instant::now(), self.position));
            debug!("Transport playing from {:.3}s", self.position);
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.position = self.position();
            self.paused = true;
            self.anchor = None;
            debug!("Transport paused at {:.3}s", self.position);
        }
    }

    /// Jump to a position, clamped to the track
    pub fn seek(&mut self, seconds: f64) -> f64 {
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration())
        } else {
            0.0
        };
        self.position = target;
        self.ended = false;
        if !self.paused {
            self.anchor = Some((Instant::now(), target));
        }
        target
    }

    /// Advance one refresh and emit `Ended` when the track runs out
    pub fn tick(&mut self) {
        if !self.is_playing() {
            return;
        }

        if let Pacing::Stepped { step } = self.pacing {
            self.position += step;
        }

        let position = self.position();
        if position >= self.duration() {
            self.position = self.duration();
            self.paused = true;
            self.ended = true;
            self.anchor = None;
            debug!("Transport ended at {:.3}s", self.position);
            self.emit(TransportEvent::Ended);
        }
    }

    /// Listen for lifecycle events. Metadata is already known, so it is
    /// delivered right away.
    pub fn subscribe(&mut self) -> EventSubscription {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(TransportEvent::MetadataLoaded { duration: self.duration() });

        let alive = Arc::new(());
        self.listeners.retain(|listener| listener.alive.strong_count() > 0);
        self.listeners.push(Listener { tx, alive: Arc::downgrade(&alive) });
        EventSubscription { rx, _alive: alive }
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|listener| listener.alive.strong_count() > 0).count()
    }

    fn emit(&mut self, event: TransportEvent) {
        self.listeners.retain(|listener| listener.tx.send(event).is_ok());
    }

    /// Hand the track to an audio routing graph. Only one graph may ever be
    /// built per transport.
    pub fn claim_route(&mut self) -> Result<Arc<AudioData>> {
        if self.route_claimed {
            return Err(CaptureError::RoutingAlreadyConstructed.into());
        }
        if !self.track.is_playable() {
            return Err(CaptureError::TransportUndecodable {
                reason: "track has no samples".to_string(),
            }.into());
        }
        self.route_claimed = true;
        Ok(Arc::clone(&self.track))
    }

    pub fn route_claimed(&self) -> bool {
        self.route_claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(seconds: usize, step: f64) -> MediaTransport {
        let track = AudioData::from_samples(vec![0.0; seconds * 10], 10, 1);
        MediaTransport::new(Arc::new(track), Pacing::Stepped { step })
    }

    #[test]
    fn test_stepped_transport_ends_once() {
        let mut transport = transport(1, 0.25);
        let subscription = transport.subscribe();
        transport.play().unwrap();

        for _ in 0..3 {
            transport.tick();
        }
        assert_eq!(transport.position(), 0.75);
        assert!(!subscription.ended());

        transport.tick();
        transport.tick();
        assert!(transport.is_ended());
        assert!(transport.is_paused());
        assert_eq!(transport.position(), 1.0);
        assert!(subscription.ended());
        // Only one Ended was emitted
        assert!(!subscription.ended());
    }

    #[test]
    fn test_paused_transport_does_not_advance() {
        let mut transport = transport(2, 0.5);
        transport.tick();
        assert_eq!(transport.position(), 0.0);

        transport.play().unwrap();
        transport.tick();
        transport.pause();
        transport.tick();
        assert_eq!(transport.position(), 0.5);
    }

    #[test]
    fn test_play_after_end_restarts() {
        let mut transport = transport(1, 1.0);
        transport.play().unwrap();
        transport.tick();
        assert!(transport.is_ended());

        transport.play().unwrap();
        assert_eq!(transport.position(), 0.0);
        assert!(transport.is_playing());
    }

    #[test]
    fn test_seek_clamps_and_clears_end() {
        let mut transport = transport(2, 1.0);
        assert_eq!(transport.seek(-3.0), 0.0);
        assert_eq!(transport.seek(9.0), 2.0);
        assert_eq!(transport.seek(f64::NAN), 0.0);
        assert!(!transport.is_ended());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let mut transport = transport(1, 0.5);
        let kept = transport.subscribe();
        let dropped = transport.subscribe();
        drop(dropped);

        assert_eq!(transport.listener_count(), 1);
        assert_eq!(transport.listener_count(), 1);
        assert!(matches!(kept.try_next(), Some(TransportEvent::MetadataLoaded { duration }) if duration == 1.0));
        // Counting listeners sends nothing
        assert_eq!(kept.try_next(), None);
    }

    #[test]
    fn test_empty_track_cannot_play_or_route() {
        let mut transport = MediaTransport::new(
            Arc::new(AudioData::from_samples(Vec::new(), 44100, 2)),
            Pacing::Realtime,
        );
        assert!(transport.play().is_err());
        assert!(transport.claim_route().is_err());
        assert!(!transport.route_claimed());
    }
}
