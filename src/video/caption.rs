//! Caption wrapping and placement.
//!
//! Captions are wrapped greedily to 80% of the frame width and stacked
//! above a fixed bottom margin, each line on its own translucent box.

use crate::video::draw::Rect;
use crate::video::font::CaptionFace;
use crate::video::types::FrameSize;

/// Maximum caption width relative to the frame width
pub const CAPTION_WIDTH_RATIO: f64 = 0.8;
/// Vertical distance between consecutive baselines
pub const LINE_HEIGHT: f64 = 40.0;
/// Gap between the caption block and the bottom edge
pub const BOTTOM_MARGIN: f64 = 50.0;
/// Horizontal padding of each line's background box
pub const BOX_PADDING: f64 = 10.0;
/// How far a background box extends above its baseline
pub const BOX_RISE: f64 = 30.0;

pub const TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];
pub const BOX_COLOR: [u8; 4] = [0, 0, 0, 102];

/// Shadow behind caption glyphs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: [u8; 4],
    pub blur: f32,
    pub offset: (i32, i32),
}

pub const CAPTION_SHADOW: Shadow = Shadow {
    color: [0, 0, 0, 204],
    blur: 8.0,
    offset: (2, 2),
};

/// Break text into lines no wider than `max_width`
///
/// A single word wider than the limit still gets a line of its own.
pub fn wrap(text: &str, max_width: f64, face: &CaptionFace<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if face.measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLine {
    pub text: String,
    pub width: f64,
    /// Bottom of the text, horizontally centered on the frame
    pub baseline_y: f64,
    pub background: Rect,
}

/// Positioned caption lines, top to bottom
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptionLayout {
    pub lines: Vec<CaptionLine>,
}

impl CaptionLayout {
    pub fn compute(text: &str, frame: FrameSize, face: &CaptionFace<'_>) -> Self {
        let width = frame.width as f64;
        let height = frame.height as f64;
        let wrapped = wrap(text, width * CAPTION_WIDTH_RATIO, face);

        let top = height - BOTTOM_MARGIN - wrapped.len() as f64 * LINE_HEIGHT;
        let lines = wrapped
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let text_width = face.measure(&text);
                let baseline_y = top + i as f64 * LINE_HEIGHT;
                CaptionLine {
                    background: Rect::new(
                        (width - text_width) / 2.0 - BOX_PADDING,
                        baseline_y - BOX_RISE,
                        text_width + BOX_PADDING * 2.0,
                        LINE_HEIGHT,
                    ),
                    text,
                    width: text_width,
                    baseline_y,
                }
            })
            .collect();

        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
