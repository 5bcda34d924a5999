//! # Video Module
//!
//! Frame compositing: caption layout, display lists, and rasterization of
//! a timeline at a point in time.

pub mod caption;
pub mod compositor;
pub mod draw;
pub mod font;
pub mod types;

pub use caption::{wrap, CaptionLayout, CaptionLine, Shadow};
pub use compositor::{animation_transform, cover_fit, transition_alpha, FrameCompositor, FADE_DURATION};
pub use draw::{DisplayList, DrawCommand, Rasterizer, Rect, Transform};
pub use font::{CaptionFace, FontBook, LineMask};
pub use types::{Frame, FrameSize};
