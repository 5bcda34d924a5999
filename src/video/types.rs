use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// One composited output frame
///
/// A thin wrapper around an RGB buffer. Frames compare equal when every
/// pixel matches, which is how determinism is checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self { buffer: ImageBuffer::new(width, height) }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self { buffer: ImageBuffer::from_pixel(width, height, Rgb(color)) }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width(), self.height())
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Packed rgb24 rows, as fed to the encoder
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Whether every pixel has the same color
    pub fn is_uniform(&self, color: [u8; 3]) -> bool {
        self.buffer.pixels().all(|pixel| pixel.0 == color)
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Output frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

impl From<(u32, u32)> for FrameSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}
