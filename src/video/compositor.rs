use std::sync::Arc;

use rayon::ThreadPool;

use crate::assets::AssetCache;
use crate::config::VideoConfig;
use crate::timeline::{Animation, Timeline, Transition};
use crate::video::caption::{CaptionLayout, BOX_COLOR, CAPTION_SHADOW, TEXT_COLOR};
use crate::video::draw::{DisplayList, DrawCommand, Rasterizer, Rect, Transform};
use crate::video::font::FontBook;
use crate::video::types::{Frame, FrameSize};

/// Background behind every frame
pub const BACKGROUND: [u8; 3] = [0, 0, 0];

/// Length of the fade-in at the start of a `Fade` segment
pub const FADE_DURATION: f64 = 0.5;

/// Motion for an animation at local progress `p`
pub fn animation_transform(animation: Animation, p: f64) -> Transform {
    match animation {
        Animation::ZoomIn => Transform::new(1.0 + 0.15 * p, 0.0),
        Animation::PanZoom => Transform::new(1.1, (p - 0.5) * 40.0),
        Animation::SlideLeft => Transform::new(1.0, -50.0 * p),
        Animation::Static | Animation::SlideRight => Transform::IDENTITY,
    }
}

/// Image opacity `elapsed` seconds into a segment
pub fn transition_alpha(transition: Transition, elapsed: f64) -> f64 {
    match transition {
        Transition::Fade if elapsed < FADE_DURATION => (elapsed / FADE_DURATION).clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Placement covering the whole frame with the image centered and its
/// overflow cropped
pub fn cover_fit(image_width: u32, image_height: u32, frame: FrameSize) -> Rect {
    let (iw, ih) = (image_width.max(1) as f64, image_height.max(1) as f64);
    let (fw, fh) = (frame.width as f64, frame.height as f64);
    let scale = (fw / iw).max(fh / ih);
    let (width, height) = (iw * scale, ih * scale);
    Rect::new((fw - width) / 2.0, (fh - height) / 2.0, width, height)
}

/// Turns a timestamp into a frame
///
/// `compose` only reads its inputs, so the same time, timeline, config and
/// cache contents always produce the same display list and the same pixels.
pub struct FrameCompositor {
    size: FrameSize,
    fonts: FontBook,
    rasterizer: Rasterizer,
}

impl FrameCompositor {
    pub fn new(size: FrameSize, fonts: FontBook, pool: Arc<ThreadPool>) -> Self {
        Self {
            size,
            fonts,
            rasterizer: Rasterizer::new(pool),
        }
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Change the output dimensions, e.g. after an aspect ratio change
    pub fn resize(&mut self, size: FrameSize) {
        self.size = size;
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    /// Describe the frame at time `t`
    pub fn compose(&self, t: f64, timeline: &Timeline, config: &VideoConfig, cache: &AssetCache) -> DisplayList {
        let mut list = DisplayList::new(self.size);
        list.push(DrawCommand::Fill { color: BACKGROUND });

        let Some(segment) = timeline.active_segment(t) else {
            return list;
        };
        let lookup = cache.peek(&segment.asset_id);
        let Some(raster) = lookup.raster() else {
            return list;
        };

        let p = segment.progress(t);
        list.push(DrawCommand::Image {
            placement: cover_fit(raster.width(), raster.height(), self.size),
            transform: animation_transform(segment.animation, p),
            alpha: transition_alpha(segment.transition, segment.elapsed(t)),
            raster: Arc::clone(raster),
        });

        let face = self.fonts.face(config.caption_style);
        let layout = CaptionLayout::compute(&segment.caption, self.size, &face);
        // Each box goes down right before its own line, over the previous line's shadow
        for line in layout.lines {
            list.push(DrawCommand::Rect {
                rect: line.background,
                color: BOX_COLOR,
            });
            list.push(DrawCommand::Text {
                text: line.text,
                center_x: self.size.width as f64 / 2.0,
                bottom_y: line.baseline_y,
                color: TEXT_COLOR,
                shadow: Some(CAPTION_SHADOW),
            });
        }

        list
    }

    pub fn rasterize(&self, list: &DisplayList, config: &VideoConfig) -> Frame {
        self.rasterizer.rasterize(list, &self.fonts.face(config.caption_style))
    }

    /// Compose and paint the frame at time `t`
    pub fn render(&self, t: f64, timeline: &Timeline, config: &VideoConfig, cache: &AssetCache) -> Frame {
        self.rasterize(&self.compose(t, timeline, config, cache), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TimelineSegment;
    use image::{Rgba, RgbaImage};

    const SIZE: FrameSize = FrameSize { width: 64, height: 36 };

    fn pool() -> Arc<ThreadPool> {
        Arc::new(rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap())
    }

    fn compositor() -> FrameCompositor {
        FrameCompositor::new(SIZE, FontBook::fallback(), pool())
    }

    fn segment(start: f64, end: f64, asset: &str) -> TimelineSegment {
        TimelineSegment {
            start_time: start,
            end_time: end,
            asset_id: asset.to_string(),
            caption: String::new(),
            animation: Animation::Static,
            transition: Transition::Cut,
        }
    }

    fn cache_with(entries: &[(&str, [u8; 4])]) -> AssetCache {
        let mut cache = AssetCache::new(pool());
        for (id, color) in entries {
            cache.insert_ready(*id, RgbaImage::from_pixel(8, 8, Rgba(*color)));
        }
        cache
    }

    #[test]
    fn test_gap_renders_background_only() {
        let timeline = Timeline::new(vec![segment(0.0, 5.0, "a")]).unwrap();
        let cache = cache_with(&[("a", [255, 0, 0, 255])]);
        let compositor = compositor();

        for t in [5.000001, 20.0, -1.0] {
            let list = compositor.compose(t, &timeline, &VideoConfig::default(), &cache);
            assert_eq!(list.len(), 1);
            let frame = compositor.render(t, &timeline, &VideoConfig::default(), &cache);
            assert!(frame.is_uniform(BACKGROUND));
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut seg = segment(0.0, 4.0, "a");
        seg.animation = Animation::PanZoom;
        seg.transition = Transition::Fade;
        seg.caption = "a caption that wraps onto more than a single line".to_string();
        let timeline = Timeline::new(vec![seg]).unwrap();
        let cache = cache_with(&[("a", [10, 200, 30, 255])]);
        let compositor = compositor();
        let config = VideoConfig::default();

        let first = compositor.render(0.3, &timeline, &config, &cache);
        let second = compositor.render(0.3, &timeline, &config, &cache);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zoom_in_scale_over_segment() {
        let mut seg = segment(0.0, 5.0, "a");
        seg.animation = Animation::ZoomIn;
        let timeline = Timeline::new(vec![seg]).unwrap();
        let cache = cache_with(&[("a", [1, 2, 3, 255])]);
        let compositor = compositor();
        let config = VideoConfig::default();

        let transform_at = |t: f64| {
            compositor.compose(t, &timeline, &config, &cache).image().map(|(_, transform, _)| *transform)
        };
        let start = transform_at(0.0).unwrap();
        let end = transform_at(5.0).unwrap();
        assert!((start.scale - 1.0).abs() < 1e-12);
        assert!((end.scale - 1.15).abs() < 1e-12);
        assert_eq!(end.translate_x, 0.0);
    }

    #[test]
    fn test_first_declared_segment_wins_overlap() {
        let timeline = Timeline::new(vec![segment(0.0, 10.0, "a"), segment(5.0, 15.0, "b")]).unwrap();
        let cache = cache_with(&[("a", [255, 0, 0, 255]), ("b", [0, 0, 255, 255])]);
        let compositor = compositor();

        let frame = compositor.render(7.0, &timeline, &VideoConfig::default(), &cache);
        assert!(frame.is_uniform([255, 0, 0]));
        let frame = compositor.render(12.0, &timeline, &VideoConfig::default(), &cache);
        assert!(frame.is_uniform([0, 0, 255]));
    }

    #[test]
    fn test_fade_alpha_ramp() {
        assert_eq!(transition_alpha(Transition::Fade, 0.0), 0.0);
        assert_eq!(transition_alpha(Transition::Fade, 0.25), 0.5);
        assert_eq!(transition_alpha(Transition::Fade, 0.5), 1.0);
        assert_eq!(transition_alpha(Transition::Fade, 4.0), 1.0);
        assert_eq!(transition_alpha(Transition::Cut, 0.0), 1.0);
        assert_eq!(transition_alpha(Transition::Dissolve, 0.0), 1.0);

        let mut seg = segment(2.0, 10.0, "a");
        seg.transition = Transition::Fade;
        let timeline = Timeline::new(vec![seg]).unwrap();
        let cache = cache_with(&[("a", [255, 255, 255, 255])]);
        let compositor = compositor();
        let config = VideoConfig::default();

        let alpha_at = |t: f64| compositor.compose(t, &timeline, &config, &cache).image().map(|(_, _, a)| a);
        assert_eq!(alpha_at(2.0), Some(0.0));
        assert_eq!(alpha_at(2.5), Some(1.0));
        assert_eq!(alpha_at(6.0), Some(1.0));
        assert!(compositor.render(2.0, &timeline, &config, &cache).is_uniform(BACKGROUND));
    }

    #[test]
    fn test_unavailable_asset_renders_blank() {
        let mut seg = segment(0.0, 5.0, "gone");
        seg.caption = "hidden".to_string();
        let timeline = Timeline::new(vec![seg]).unwrap();
        let compositor = compositor();

        let list = compositor.compose(1.0, &timeline, &VideoConfig::default(), &cache_with(&[]));
        assert_eq!(list.len(), 1);
        assert_eq!(list.texts().count(), 0);
    }

    #[test]
    fn test_captions_are_not_faded() {
        let mut seg = segment(0.0, 5.0, "a");
        seg.transition = Transition::Fade;
        seg.caption = "Hello world".to_string();
        let timeline = Timeline::new(vec![seg]).unwrap();
        let cache = cache_with(&[("a", [255, 255, 255, 255])]);
        let compositor = FrameCompositor::new(FrameSize::new(1280, 720), FontBook::fallback(), pool());

        let list = compositor.compose(0.0, &timeline, &VideoConfig::default(), &cache);
        assert_eq!(list.image().map(|(_, _, alpha)| alpha), Some(0.0));
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["Hello world"]);
        assert!(list.commands.iter().any(|c| matches!(c, DrawCommand::Rect { color, .. } if *color == BOX_COLOR)));
    }

    #[test]
    fn test_each_caption_box_precedes_its_line() {
        let mut seg = segment(0.0, 5.0, "a");
        seg.caption = "Hello world".to_string();
        let timeline = Timeline::new(vec![seg]).unwrap();
        let cache = cache_with(&[("a", [255, 255, 255, 255])]);

        // Too narrow for both words on one line
        let list = compositor().compose(1.0, &timeline, &VideoConfig::default(), &cache);
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["Hello", "world"]);

        let order: Vec<&str> = list.commands[2..]
            .iter()
            .map(|command| match command {
                DrawCommand::Rect { .. } => "box",
                DrawCommand::Text { .. } => "text",
                _ => "other",
            })
            .collect();
        assert_eq!(order, vec!["box", "text", "box", "text"]);
    }

    #[test]
    fn test_cover_fit_crops_overflow() {
        let wide = cover_fit(200, 50, FrameSize::new(100, 100));
        assert_eq!(wide, Rect::new(-150.0, 0.0, 400.0, 100.0));

        let tall = cover_fit(50, 200, FrameSize::new(1280, 720));
        assert_eq!(tall.width, 1280.0);
        assert_eq!(tall.height, 5120.0);
        assert_eq!(tall.y, (720.0 - 5120.0) / 2.0);
    }
}
