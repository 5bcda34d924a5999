use std::sync::Arc;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tracing::{debug, info};

use crate::audio::types::AudioData;
use crate::error::{CaptureError, PlaybackError, Result};
use crate::playback::MediaTransport;

/// Somewhere to hear the track while it plays
pub trait MonitorOutput {
    /// Queue interleaved samples for playback
    fn play(&mut self, samples: &[f32], sample_rate: u32, channels: u16);

    fn pause(&mut self) {}

    fn resume(&mut self) {}
}

/// Default system output device
pub struct SpeakerOutput {
    // Dropping the stream silences the sink
    _stream: OutputStream,
    sink: Sink,
}

impl SpeakerOutput {
    pub fn open() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| PlaybackError::OutputUnavailable { reason: e.to_string() })?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| PlaybackError::OutputUnavailable { reason: e.to_string() })?;

        debug!("Opened default audio output");
        Ok(Self { _stream: stream, sink })
    }
}

impl MonitorOutput for SpeakerOutput {
    fn play(&mut self, samples: &[f32], sample_rate: u32, channels: u16) {
        if samples.is_empty() {
            return;
        }
        self.sink.append(SamplesBuffer::new(channels, sample_rate, samples.to_vec()));
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }
}

/// Capture-side destination of the routing graph
///
/// Only collects samples while open, so playback before or after a capture
/// never leaks into the recording.
#[derive(Debug)]
pub struct CaptureMix {
    buffer: Vec<f32>,
    open: bool,
    sample_rate: u32,
    channels: u16,
}

impl CaptureMix {
    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            buffer: Vec::new(),
            open: false,
            sample_rate,
            channels,
        }
    }

    pub fn open(&mut self) {
        self.buffer.clear();
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.buffer.clear();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn push(&mut self, samples: &[f32]) {
        if self.open {
            self.buffer.extend_from_slice(samples);
        }
    }

    /// Take everything routed since the last drain
    pub fn drain(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.buffer)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Splits the transport's audio between the monitor and the capture mix
///
/// There is at most one graph per transport; see
/// [`MediaTransport::claim_route`]. Once built it stays connected for the
/// transport's lifetime and is reused by every later capture.
pub struct AudioGraph {
    track: Arc<AudioData>,
    monitor: Option<Box<dyn MonitorOutput>>,
    mix: CaptureMix,
}

impl AudioGraph {
    /// Build the graph for a transport. Fails if one was already built.
    pub fn construct(transport: &mut MediaTransport, monitor: Option<Box<dyn MonitorOutput>>) -> Result<Self> {
        let track = transport.claim_route()?;
        info!("Audio routing graph connected ({} Hz, {} ch, monitor: {})",
              track.sample_rate, track.channels, monitor.is_some());

        Ok(Self {
            mix: CaptureMix::new(track.sample_rate, track.channels),
            track,
            monitor,
        })
    }

    /// The graph in `slot`, built on first use
    pub fn connect<'a>(
        slot: &'a mut Option<AudioGraph>,
        transport: &mut MediaTransport,
        monitor: &mut Option<Box<dyn MonitorOutput>>,
    ) -> Result<&'a mut AudioGraph> {
        if slot.is_none() {
            *slot = Some(Self::construct(transport, monitor.take())?);
        }
        slot.as_mut().ok_or_else(|| CaptureError::RoutingFailed {
            reason: "routing graph missing after construction".to_string(),
        }.into())
    }

    pub fn track(&self) -> &Arc<AudioData> {
        &self.track
    }

    /// Route the track between two positions to both destinations
    pub fn route(&mut self, from: f64, to: f64) {
        let samples = self.track.span(from, to);
        if samples.is_empty() {
            return;
        }
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.play(samples, self.track.sample_rate, self.track.channels);
        }
        self.mix.push(samples);
    }

    pub fn capture_mix(&mut self) -> &mut CaptureMix {
        &mut self.mix
    }

    pub fn monitor_mut(&mut self) -> Option<&mut (dyn MonitorOutput + 'static)> {
        self.monitor.as_deref_mut()
    }

    pub fn has_monitor(&self) -> bool {
        self.monitor.is_some()
    }

    /// Tear the graph down, handing back its monitor
    pub fn into_monitor(self) -> Option<Box<dyn MonitorOutput>> {
        self.monitor
    }
}
