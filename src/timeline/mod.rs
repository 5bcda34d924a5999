//! # Timeline Module
//!
//! The ordered list of timed segments that the compositor renders, how a
//! generator's output becomes one, and the metadata-only project snapshot.
//!
//! A [`Timeline`] is immutable once built. A new generation result replaces
//! it wholesale through [`adopt`]; a failed adoption leaves the previous
//! timeline untouched.

pub mod generate;
pub mod snapshot;
pub mod types;

pub use generate::{adopt, GeneratedSegment, GenerationRequest, JsonScriptGenerator, TimelineGenerator};
pub use snapshot::{ProjectSnapshot, SnapshotAsset, SNAPSHOT_FILE_NAME};
pub use types::{Animation, Timeline, TimelineSegment, Transition};
