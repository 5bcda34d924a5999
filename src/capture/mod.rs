//! # Capture Module
//!
//! Records the composited frames and the routed audio of one full pass
//! through the track into a single downloadable file.

pub mod artifact;
pub mod pipeline;
pub mod recorder;

pub use artifact::CaptureArtifact;
pub use pipeline::{CaptureContext, CapturePipeline, CaptureState};
pub use recorder::{CaptureTracks, EncodedChunk, FfmpegRecorder, Recorder};
