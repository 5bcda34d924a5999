use std::fmt;

use tracing::debug;

use crate::error::PreconditionError;
use crate::playback::clock::PlaybackClock;
use crate::playback::transport::MediaTransport;

/// Who is driving the render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    Playback,
    Capture,
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playback => write!(f, "playback"),
            Self::Capture => write!(f, "capture"),
        }
    }
}

/// One serviced refresh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshTick {
    /// Time to render
    pub time: f64,
    /// Refreshes serviced since the scheduler was created
    pub frame: u64,
    /// Whether another refresh was requested
    pub continuing: bool,
}

/// Requests one render per display refresh while active
///
/// At most one refresh request is pending at a time. The loop stops on its
/// own once the transport pauses or ends.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    mode: Option<DriveMode>,
    pending: Option<u64>,
    next_request: u64,
    frames: u64,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start driving renders. Re-activating the same mode is a no-op.
    pub fn activate(&mut self, mode: DriveMode) -> Result<(), PreconditionError> {
        match self.mode {
            Some(active) if active == mode => Ok(()),
            Some(active) => Err(PreconditionError::SchedulerBusy(active.to_string())),
            None => {
                debug!("Scheduler driven by {}", mode);
                self.mode = Some(mode);
                self.request_refresh();
                Ok(())
            }
        }
    }

    /// Stop driving and cancel any pending refresh
    pub fn deactivate(&mut self) {
        if let Some(mode) = self.mode.take() {
            debug!("Scheduler released by {}", mode);
        }
        self.pending = None;
    }

    pub fn mode(&self) -> Option<DriveMode> {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frames_serviced(&self) -> u64 {
        self.frames
    }

    fn request_refresh(&mut self) {
        self.pending = Some(self.next_request);
        self.next_request += 1;
    }

    /// Service a display refresh
    ///
    /// Reads the render time from the transport, then advances the transport
    /// to the next refresh. Returns `None` when nothing was pending.
    pub fn on_refresh(&mut self, clock: &mut PlaybackClock, transport: &mut MediaTransport) -> Option<RefreshTick> {
        self.pending.take()?;
        self.mode?;

        let time = clock.sync(transport);
        transport.tick();
        self.frames += 1;

        let continuing = transport.is_playing();
        if continuing {
            self.request_refresh();
        } else {
            self.deactivate();
        }

        Some(RefreshTick {
            time,
            frame: self.frames,
            continuing,
        })
    }
}
