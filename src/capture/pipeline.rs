use std::fmt;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::audio::{AudioGraph, MonitorOutput};
use crate::capture::artifact::CaptureArtifact;
use crate::capture::recorder::{CaptureTracks, Recorder};
use crate::error::{CaptureError, CompositorError, PreconditionError, Result};
use crate::playback::{AnimationScheduler, DriveMode, EventSubscription, MediaTransport, PlaybackClock};
use crate::video::{Frame, FrameSize};

/// Where a capture session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Armed,
    Recording,
    Finalizing,
    Complete,
    Error,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// The playback pieces a capture session drives
pub struct CaptureContext<'a> {
    pub transport: &'a mut MediaTransport,
    pub clock: &'a mut PlaybackClock,
    pub scheduler: &'a mut AnimationScheduler,
    /// Routing graph slot, filled on first use and kept for the transport's lifetime
    pub graph: &'a mut Option<AudioGraph>,
    /// Monitor handed to the graph when it is built
    pub monitor: &'a mut Option<Box<dyn MonitorOutput>>,
}

struct CaptureSession {
    ended: EventSubscription,
    frames: u64,
    started: Option<Instant>,
}

/// Records composited frames and routed audio into one artifact
///
/// `Idle → Armed → Recording → Finalizing → Complete → Idle`, with any
/// failure passing through `Error` back to `Idle`. Only one session may be
/// active at a time.
pub struct CapturePipeline {
    state: CaptureState,
    recorder: Box<dyn Recorder>,
    session: Option<CaptureSession>,
    file_name: String,
    fps: u32,
    last_error: Option<String>,
}

impl CapturePipeline {
    pub fn new(recorder: Box<dyn Recorder>, file_name: impl Into<String>, fps: u32) -> Self {
        Self {
            state: CaptureState::Idle,
            recorder,
            session: None,
            file_name: file_name.into(),
            fps,
            last_error: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether a session is armed, recording or finalizing
    pub fn is_active(&self) -> bool {
        matches!(self.state, CaptureState::Armed | CaptureState::Recording | CaptureState::Finalizing)
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Message for the most recent failed or cancelled session
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn recorder_name(&self) -> &str {
        self.recorder.name()
    }

    pub fn frames_captured(&self) -> u64 {
        self.session.as_ref().map_or(0, |session| session.frames)
    }

    /// Percentage of the track recorded so far
    pub fn progress(&self, transport: &MediaTransport) -> f64 {
        if !self.is_active() || transport.duration() <= 0.0 {
            return 0.0;
        }
        (transport.position() / transport.duration() * 100.0).clamp(0.0, 100.0)
    }

    /// Prepare a session: rewind, connect audio routing and bind the recorder
    pub fn arm(&mut self, ctx: &mut CaptureContext<'_>, frame_size: FrameSize, assets_ready: bool) -> Result<()> {
        if self.is_active() {
            return Err(PreconditionError::CaptureInProgress.into());
        }
        if !assets_ready {
            return Err(PreconditionError::MissingImages.into());
        }
        if let Some(mode) = ctx.scheduler.mode() {
            return Err(PreconditionError::SchedulerBusy(mode.to_string()).into());
        }

        info!("🎬 Arming capture with {} recorder", self.recorder.name());
        self.state = CaptureState::Armed;
        self.last_error = None;
        ctx.clock.reset(ctx.transport);

        let (sample_rate, channels) = match AudioGraph::connect(ctx.graph, ctx.transport, ctx.monitor) {
            Ok(graph) => (graph.track().sample_rate, graph.track().channels),
            Err(e) => return Err(self.fail(ctx, e)),
        };

        let tracks = CaptureTracks {
            width: frame_size.width,
            height: frame_size.height,
            fps: self.fps,
            sample_rate,
            channels,
        };
        if let Err(e) = self.recorder.bind(tracks) {
            return Err(self.fail(ctx, e));
        }

        self.session = Some(CaptureSession {
            ended: ctx.transport.subscribe(),
            frames: 0,
            started: None,
        });
        Ok(())
    }

    /// Start recording and playing the transport under the scheduler
    pub fn start(&mut self, ctx: &mut CaptureContext<'_>) -> Result<()> {
        if self.state != CaptureState::Armed {
            return Err(CaptureError::InvalidState {
                expected: CaptureState::Armed.to_string(),
                found: self.state.to_string(),
            }.into());
        }

        if let Err(e) = self.recorder.start() {
            return Err(self.fail(ctx, e));
        }
        if let Some(session) = self.session.as_mut() {
            session.started = Some(Instant::now());
        }
        self.state = CaptureState::Recording;

        if let Err(e) = ctx.transport.play() {
            let e = CaptureError::TransportUndecodable { reason: e.to_string() }.into();
            return Err(self.fail(ctx, e));
        }
        if let Err(e) = ctx.scheduler.activate(DriveMode::Capture) {
            return Err(self.fail(ctx, e.into()));
        }
        if let Some(graph) = ctx.graph.as_mut() {
            graph.capture_mix().open();
        }

        info!("🔴 Recording started");
        Ok(())
    }

    /// Hand one rendered frame, plus the audio routed since the last one,
    /// to the recorder
    pub fn record_frame(&mut self, ctx: &mut CaptureContext<'_>, frame: &Frame) -> Result<()> {
        if self.state != CaptureState::Recording {
            return Err(CaptureError::InvalidState {
                expected: CaptureState::Recording.to_string(),
                found: self.state.to_string(),
            }.into());
        }

        let audio = ctx.graph.as_mut().map(|graph| graph.capture_mix().drain()).unwrap_or_default();
        let written = self.recorder.write_frame(frame).and_then(|_| self.recorder.write_audio(&audio));
        if let Err(e) = written {
            return Err(self.fail(ctx, e));
        }

        if let Some(session) = self.session.as_mut() {
            session.frames += 1;
        }
        Ok(())
    }

    /// Finalize once the transport has reported its end
    pub fn poll(&mut self, ctx: &mut CaptureContext<'_>) -> Result<Option<CaptureArtifact>> {
        if self.state != CaptureState::Recording {
            return Ok(None);
        }
        let ended = self.session.as_ref().is_some_and(|session| session.ended.ended());
        if !ended {
            return Ok(None);
        }
        self.finalize(ctx).map(Some)
    }

    fn finalize(&mut self, ctx: &mut CaptureContext<'_>) -> Result<CaptureArtifact> {
        self.state = CaptureState::Finalizing;
        info!("🏁 Transport ended, finalizing capture");
        if ctx.scheduler.mode() == Some(DriveMode::Capture) {
            ctx.scheduler.deactivate();
        }

        let tail = ctx.graph.as_mut().map(|graph| graph.capture_mix().drain()).unwrap_or_default();
        let mut chunks = self.recorder.take_data();
        let stopped = self.recorder.write_audio(&tail).and_then(|_| self.recorder.stop());
        match stopped {
            Ok(rest) => chunks.extend(rest),
            Err(e) => return Err(self.fail(ctx, e)),
        }

        self.state = CaptureState::Complete;
        let (frames, elapsed) = self.session.as_ref().map_or((0, 0.0), |session| {
            (session.frames, session.started.map_or(0.0, |s| s.elapsed().as_secs_f64()))
        });
        let artifact = CaptureArtifact::from_chunks(
            &self.file_name,
            self.recorder.mime_type(),
            chunks,
            frames,
            ctx.transport.duration(),
        );
        info!("✅ Capture complete: {} frames, {} bytes in {:.2}s", frames, artifact.len(), elapsed);

        self.teardown(ctx);
        self.state = CaptureState::Idle;
        Ok(artifact)
    }

    /// Abandon the active session without producing an artifact
    pub fn cancel(&mut self, ctx: &mut CaptureContext<'_>) -> bool {
        if !self.is_active() {
            return false;
        }

        warn!("Capture cancelled at {:.2}s", ctx.transport.position());
        if self.state == CaptureState::Recording {
            if let Err(e) = self.recorder.stop() {
                warn!("Recorder did not stop cleanly: {}", e);
            }
        }
        self.teardown(ctx);
        self.state = CaptureState::Idle;
        self.last_error = Some(CaptureError::Cancelled.to_string());
        true
    }

    fn fail(&mut self, ctx: &mut CaptureContext<'_>, err: CompositorError) -> CompositorError {
        let was_recording = self.state == CaptureState::Recording;
        self.state = CaptureState::Error;
        error!("❌ Capture failed: {}", err);

        if was_recording {
            if let Err(e) = self.recorder.stop() {
                warn!("Recorder did not stop cleanly: {}", e);
            }
        }
        self.last_error = Some(err.user_message());
        self.teardown(ctx);
        self.state = CaptureState::Idle;
        err
    }

    fn teardown(&mut self, ctx: &mut CaptureContext<'_>) {
        if ctx.scheduler.mode() == Some(DriveMode::Capture) {
            ctx.scheduler.deactivate();
        }
        ctx.transport.pause();
        if let Some(graph) = ctx.graph.as_mut() {
            graph.capture_mix().close();
        }
        self.session = None;
    }
}
