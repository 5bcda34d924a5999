//! # Audio Module
//!
//! Decodes the voiceover track that drives the playback clock and routes its
//! samples to the speakers and to the capture mix while a capture runs.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reelcast::audio::AudioLoader;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let track = AudioLoader::load("voiceover.wav").await?;
//! println!("{:.1}s at {} Hz", track.duration, track.sample_rate);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod routing;
pub mod types;

pub use loader::AudioLoader;
pub use routing::{AudioGraph, CaptureMix, MonitorOutput, SpeakerOutput};
pub use types::{AudioData, AudioFormat};
