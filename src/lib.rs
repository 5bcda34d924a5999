//! # Reelcast
//!
//! Render timed image and caption timelines against an audio clock, play them
//! back, and capture them into a single video file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reelcast::{
//!     composition::CompositionEngine,
//!     config::Config,
//!     timeline::JsonScriptGenerator,
//! };
//! use std::path::PathBuf;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let mut engine = CompositionEngine::new(Config::default())?;
//! let images = vec![PathBuf::from("one.png"), PathBuf::from("two.jpg")];
//! let generator = JsonScriptGenerator::new("timeline.json");
//!
//! let output = engine.export("voiceover.wav", &images, &generator, "out/").await?;
//! println!("Saved {:?}", output);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`assets`] - Uploaded images and their decoded rasters
//! - [`timeline`] - Timed segments, generator output and project snapshots
//! - [`video`] - Caption layout, display lists and the frame compositor
//! - [`audio`] - Track decoding and audio routing
//! - [`playback`] - Transport, playback clock and refresh scheduling
//! - [`capture`] - Recording state machine and recorders
//! - [`composition`] - The engine tying a session together
//! - [`config`] - Configuration management
//!
//! ## Custom Timeline Generators
//!
//! Timelines come from anything implementing
//! [`TimelineGenerator`](timeline::TimelineGenerator):
//!
//! ```rust,no_run
//! use reelcast::timeline::{Animation, GeneratedSegment, GenerationRequest, TimelineGenerator, Transition};
//! use reelcast::Result;
//!
//! struct OneShot;
//!
//! impl TimelineGenerator for OneShot {
//!     fn name(&self) -> &str {
//!         "one_shot"
//!     }
//!
//!     fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<GeneratedSegment>> {
//!         Ok(vec![GeneratedSegment {
//!             start_time: 0.0,
//!             end_time: request.audio.duration,
//!             image_index: 0,
//!             caption: "Hello".to_string(),
//!             animation: Animation::ZoomIn,
//!             transition: Transition::Fade,
//!         }])
//!     }
//! }
//! ```

pub mod assets;
pub mod audio;
pub mod capture;
pub mod composition;
pub mod config;
pub mod error;
pub mod playback;
pub mod timeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::CompositionEngine,
    config::Config,
    error::{CompositorError, Result},
    timeline::{Timeline, TimelineGenerator},
    video::{Frame, FrameCompositor},
};
