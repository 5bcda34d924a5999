use std::sync::Arc;

use image::imageops;
use image::{GrayImage, Luma, RgbaImage};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::video::caption::Shadow;
use crate::video::font::{CaptionFace, LineMask};
use crate::video::types::{Frame, FrameSize};

/// Axis-aligned rectangle in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Integer pixel span covered by this rect, clipped to the frame
    fn pixel_bounds(&self, frame: FrameSize) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.round().max(0.0);
        let y0 = self.y.round().max(0.0);
        let x1 = (self.x + self.width).round().min(frame.width as f64);
        let y1 = (self.y + self.height).round().min(frame.height as f64);
        (x1 > x0 && y1 > y0).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Scale about the frame center, applied after a horizontal shift
///
/// Maps a draw-space point `p` to `(p + translate - center) * scale + center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub translate_x: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform { scale: 1.0, translate_x: 0.0 };

    pub fn new(scale: f64, translate_x: f64) -> Self {
        Self { scale, translate_x }
    }

    /// Frame point back to draw space
    pub fn invert(&self, x: f64, y: f64, center: (f64, f64)) -> (f64, f64) {
        (
            (x - center.0) / self.scale + center.0 - self.translate_x,
            (y - center.1) / self.scale + center.1,
        )
    }
}

/// One drawing operation, in painter's order
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Fill {
        color: [u8; 3],
    },
    Image {
        raster: Arc<RgbaImage>,
        placement: Rect,
        transform: Transform,
        alpha: f64,
    },
    Rect {
        rect: Rect,
        color: [u8; 4],
    },
    Text {
        text: String,
        center_x: f64,
        /// Bottom edge of the line box
        bottom_y: f64,
        color: [u8; 4],
        shadow: Option<Shadow>,
    },
}

/// Everything needed to paint one frame
#[derive(Debug, Clone)]
pub struct DisplayList {
    pub size: FrameSize,
    pub commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(size: FrameSize) -> Self {
        Self { size, commands: Vec::new() }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The image command, if this frame draws one
    pub fn image(&self) -> Option<(&Rect, &Transform, f64)> {
        self.commands.iter().find_map(|command| match command {
            DrawCommand::Image { placement, transform, alpha, .. } => Some((placement, transform, *alpha)),
            _ => None,
        })
    }

    /// Caption lines in drawing order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Paints display lists into frames
pub struct Rasterizer {
    pool: Arc<ThreadPool>,
}

impl Rasterizer {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    pub fn rasterize(&self, list: &DisplayList, face: &CaptionFace<'_>) -> Frame {
        let mut frame = Frame::new_black(list.size.width, list.size.height);

        for command in &list.commands {
            match command {
                DrawCommand::Fill { color } => {
                    frame = Frame::new_filled(list.size.width, list.size.height, *color);
                }
                DrawCommand::Image { raster, placement, transform, alpha } => {
                    self.draw_image(&mut frame, raster, placement, transform, *alpha);
                }
                DrawCommand::Rect { rect, color } => fill_rect(&mut frame, rect, *color),
                DrawCommand::Text { text, center_x, bottom_y, color, shadow } => {
                    if let Some(mask) = face.rasterize(text) {
                        let left = (center_x - mask.width as f64 / 2.0).round() as i64;
                        let top = (bottom_y - mask.height as f64).round() as i64;
                        if let Some(shadow) = shadow {
                            draw_shadow(&mut frame, &mask, left, top, shadow);
                        }
                        draw_mask(&mut frame, &mask_image(&mask), left, top, *color);
                    }
                }
            }
        }

        frame
    }

    /// Inverse-map every frame pixel into the source raster, sampling bilinearly
    fn draw_image(&self, frame: &mut Frame, raster: &RgbaImage, placement: &Rect, transform: &Transform, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 || placement.width <= 0.0 || placement.height <= 0.0 || transform.scale <= 0.0 {
            return;
        }

        let size = frame.size();
        let center = size.center();
        let stride = size.width as usize * 3;
        let (raster_w, raster_h) = (raster.width() as f64, raster.height() as f64);
        let data: &mut [u8] = frame.as_image_mut();

        self.pool.install(|| {
            data.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
                for x in 0..size.width as usize {
                    let (sx, sy) = transform.invert(x as f64 + 0.5, y as f64 + 0.5, center);
                    let u = (sx - placement.x) / placement.width * raster_w;
                    let v = (sy - placement.y) / placement.height * raster_h;
                    if u < 0.0 || v < 0.0 || u >= raster_w || v >= raster_h {
                        continue;
                    }

                    let [r, g, b, a] = sample_bilinear(raster, u - 0.5, v - 0.5);
                    let coverage = alpha * a / 255.0;
                    blend(&mut row[x * 3..x * 3 + 3], [r, g, b], coverage);
                }
            });
        });
    }
}

fn sample_bilinear(raster: &RgbaImage, u: f64, v: f64) -> [f64; 4] {
    let max_x = raster.width() as i64 - 1;
    let max_y = raster.height() as i64 - 1;
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;

    let texel = |x: i64, y: i64| raster.get_pixel(x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32).0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let p00 = texel(x0, y0);
    let p10 = texel(x0 + 1, y0);
    let p01 = texel(x0, y0 + 1);
    let p11 = texel(x0 + 1, y0 + 1);

    let mut out = [0.0; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

fn blend(pixel: &mut [u8], color: [f64; 3], alpha: f64) {
    for (dst, src) in pixel.iter_mut().zip(color) {
        let value = src * alpha + *dst as f64 * (1.0 - alpha);
        *dst = value.round().clamp(0.0, 255.0) as u8;
    }
}

fn rgb(color: [u8; 4]) -> [f64; 3] {
    [color[0] as f64, color[1] as f64, color[2] as f64]
}

fn fill_rect(frame: &mut Frame, rect: &Rect, color: [u8; 4]) {
    let Some((x0, y0, x1, y1)) = rect.pixel_bounds(frame.size()) else {
        return;
    };
    let alpha = color[3] as f64 / 255.0;
    let image = frame.as_image_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            blend(&mut image.get_pixel_mut(x, y).0, rgb(color), alpha);
        }
    }
}

fn mask_image(mask: &LineMask) -> GrayImage {
    GrayImage::from_raw(mask.width, mask.height, mask.coverage.clone())
        .unwrap_or_else(|| GrayImage::new(mask.width, mask.height))
}

/// Blend a solid color through a coverage mask placed at (left, top)
fn draw_mask(frame: &mut Frame, mask: &GrayImage, left: i64, top: i64, color: [u8; 4]) {
    let (width, height) = (frame.width() as i64, frame.height() as i64);
    let opacity = color[3] as f64 / 255.0;
    let image = frame.as_image_mut();

    for (mx, my, Luma([coverage])) in mask.enumerate_pixels() {
        if *coverage == 0 {
            continue;
        }
        let x = left + mx as i64;
        let y = top + my as i64;
        if x < 0 || y < 0 || x >= width || y >= height {
            continue;
        }
        let alpha = opacity * *coverage as f64 / 255.0;
        blend(&mut image.get_pixel_mut(x as u32, y as u32).0, rgb(color), alpha);
    }
}

/// Offset, blurred copy of the glyph coverage
fn draw_shadow(frame: &mut Frame, mask: &LineMask, left: i64, top: i64, shadow: &Shadow) {
    let pad = (shadow.blur.ceil() as u32).max(1);
    let mut padded = GrayImage::new(mask.width + pad * 2, mask.height + pad * 2);
    for y in 0..mask.height {
        for x in 0..mask.width {
            padded.put_pixel(x + pad, y + pad, Luma([mask.at(x, y)]));
        }
    }

    // A canvas shadow blur of b is a gaussian with sigma b / 2
    let blurred = imageops::blur(&padded, shadow.blur / 2.0);
    draw_mask(
        frame,
        &blurred,
        left - pad as i64 + shadow.offset.0 as i64,
        top - pad as i64 + shadow.offset.1 as i64,
        shadow.color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptionStyle;
    use crate::video::font::FontBook;
    use image::Rgba;

    fn rasterizer() -> Rasterizer {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        Rasterizer::new(Arc::new(pool))
    }

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn test_transform_inverse() {
        let center = (640.0, 360.0);
        assert_eq!(Transform::IDENTITY.invert(10.0, 20.0, center), (10.0, 20.0));

        let zoom = Transform::new(2.0, 0.0);
        assert_eq!(zoom.invert(640.0, 360.0, center), (640.0, 360.0));
        assert_eq!(zoom.invert(0.0, 0.0, center), (320.0, 180.0));

        let shifted = Transform::new(1.0, 15.0);
        assert_eq!(shifted.invert(100.0, 50.0, center), (85.0, 50.0));
    }

    #[test]
    fn test_opaque_image_covers_frame() {
        let book = FontBook::fallback();
        let mut list = DisplayList::new(FrameSize::new(16, 8));
        list.push(DrawCommand::Fill { color: [0, 0, 0] });
        list.push(DrawCommand::Image {
            raster: solid(4, 2, [200, 100, 50, 255]),
            placement: Rect::new(0.0, 0.0, 16.0, 8.0),
            transform: Transform::IDENTITY,
            alpha: 1.0,
        });

        let frame = rasterizer().rasterize(&list, &book.face(CaptionStyle::Classic));
        assert!(frame.is_uniform([200, 100, 50]));
    }

    #[test]
    fn test_half_alpha_blends_with_background() {
        let book = FontBook::fallback();
        let mut list = DisplayList::new(FrameSize::new(4, 4));
        list.push(DrawCommand::Fill { color: [0, 0, 0] });
        list.push(DrawCommand::Image {
            raster: solid(2, 2, [200, 200, 200, 255]),
            placement: Rect::new(0.0, 0.0, 4.0, 4.0),
            transform: Transform::IDENTITY,
            alpha: 0.5,
        });

        let frame = rasterizer().rasterize(&list, &book.face(CaptionStyle::Classic));
        assert!(frame.is_uniform([100, 100, 100]));
    }

    #[test]
    fn test_zero_alpha_draws_nothing() {
        let book = FontBook::fallback();
        let mut list = DisplayList::new(FrameSize::new(4, 4));
        list.push(DrawCommand::Fill { color: [0, 0, 0] });
        list.push(DrawCommand::Image {
            raster: solid(2, 2, [255, 255, 255, 255]),
            placement: Rect::new(0.0, 0.0, 4.0, 4.0),
            transform: Transform::IDENTITY,
            alpha: 0.0,
        });

        let frame = rasterizer().rasterize(&list, &book.face(CaptionStyle::Classic));
        assert!(frame.is_uniform([0, 0, 0]));
    }

    #[test]
    fn test_rect_is_clipped_and_blended() {
        let book = FontBook::fallback();
        let mut list = DisplayList::new(FrameSize::new(10, 10));
        list.push(DrawCommand::Fill { color: [255, 255, 255] });
        list.push(DrawCommand::Rect {
            rect: Rect::new(-5.0, 8.0, 8.0, 10.0),
            color: [0, 0, 0, 102],
        });

        let frame = rasterizer().rasterize(&list, &book.face(CaptionStyle::Classic));
        assert_eq!(frame.get_pixel(0, 9), [153, 153, 153]);
        assert_eq!(frame.get_pixel(2, 8), [153, 153, 153]);
        assert_eq!(frame.get_pixel(3, 9), [255, 255, 255]);
        assert_eq!(frame.get_pixel(0, 7), [255, 255, 255]);
    }
}
