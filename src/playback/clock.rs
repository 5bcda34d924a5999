use crate::playback::transport::MediaTransport;

/// Where the current time last came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    Transport,
    Seek,
}

/// Authoritative current time in seconds
///
/// Follows the transport while it plays. A seek moves both the clock and the
/// transport and should be followed by an immediate render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    current: f64,
    source: ClockSource,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            current: 0.0,
            source: ClockSource::Transport,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }

    /// Take the transport's position as the current time
    pub fn sync(&mut self, transport: &MediaTransport) -> f64 {
        self.current = transport.position();
        self.source = ClockSource::Transport;
        self.current
    }

    /// Jump to a time. Returns the clamped time actually set.
    pub fn seek(&mut self, transport: &mut MediaTransport, seconds: f64) -> f64 {
        self.current = transport.seek(seconds);
        self.source = ClockSource::Seek;
        self.current
    }

    pub fn reset(&mut self, transport: &mut MediaTransport) {
        self.seek(transport, 0.0);
    }
}
