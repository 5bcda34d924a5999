//! # Composition Engine
//!
//! The engine owns one editing session and wires the other modules together:
//! assets feed the compositor, the transport drives the clock, the scheduler
//! decides when frames are rendered, and a running capture receives each one.

pub mod engine;

// Re-exports for convenience
pub use engine::{CompositionEngine, RefreshOutcome};
