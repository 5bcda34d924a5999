//! # Playback Module
//!
//! The authoritative time position and the per-refresh render loop.
//!
//! - [`MediaTransport`] models the audio element: it plays, pauses, seeks,
//!   and reports `Ended` to its subscribers
//! - [`PlaybackClock`] follows the transport or jumps on a seek
//! - [`AnimationScheduler`] hands out one render time per refresh while
//!   playback or a capture drives it, never both at once

pub mod clock;
pub mod scheduler;
pub mod transport;

pub use clock::{ClockSource, PlaybackClock};
pub use scheduler::{AnimationScheduler, DriveMode, RefreshTick};
pub use transport::{EventSubscription, MediaTransport, Pacing, TransportEvent};
