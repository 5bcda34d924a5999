use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};
use tracing::{debug, warn};

use crate::config::{CaptionConfig, CaptionStyle};

/// Regular faces tried when no font is configured
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Horizontal shear applied when an italic face is synthesized
const OBLIQUE_SHEAR: f32 = 0.2;

/// Advance per character, relative to the pixel size, without a font
const FALLBACK_ADVANCE: f32 = 0.55;
const FALLBACK_BOLD_ADVANCE: f32 = 0.6;

/// The caption fonts available to the compositor
///
/// Every face is optional. Without a regular face captions are still laid
/// out with fixed-advance metrics, but only their background boxes are
/// drawn.
#[derive(Default)]
pub struct FontBook {
    regular: Option<Font>,
    bold: Option<Font>,
    italic: Option<Font>,
}

impl FontBook {
    /// Metrics-only book with no glyphs
    pub fn fallback() -> Self {
        Self::default()
    }

    /// Load the configured faces, probing system fonts for a missing regular face
    pub fn load(config: &CaptionConfig) -> Self {
        let regular = match &config.font_path {
            Some(path) => load_font(path),
            None => SYSTEM_FONT_CANDIDATES
                .iter()
                .map(Path::new)
                .filter(|path| path.exists())
                .find_map(load_font),
        };

        if regular.is_none() {
            warn!("No caption font available, captions will render without glyphs");
        }

        Self {
            regular,
            bold: config.bold_font_path.as_deref().and_then(load_font),
            italic: config.italic_font_path.as_deref().and_then(load_font),
        }
    }

    /// Book with a single regular face from raw font bytes
    pub fn from_bytes(regular: &[u8]) -> Option<Self> {
        let font = Font::from_bytes(regular, FontSettings::default()).ok()?;
        Some(Self {
            regular: Some(font),
            ..Self::default()
        })
    }

    pub fn has_glyphs(&self) -> bool {
        self.regular.is_some()
    }

    /// Face for a caption style. Bold and italic are synthesized from the
    /// regular face when their own files are missing.
    pub fn face(&self, style: CaptionStyle) -> CaptionFace<'_> {
        match style {
            CaptionStyle::Bold => match &self.bold {
                Some(font) => CaptionFace::new(Some(font), 32.0, false, false, true),
                None => CaptionFace::new(self.regular.as_ref(), 32.0, true, false, true),
            },
            CaptionStyle::Karaoke => match &self.italic {
                Some(font) => CaptionFace::new(Some(font), 32.0, false, false, false),
                None => CaptionFace::new(self.regular.as_ref(), 32.0, false, true, false),
            },
            CaptionStyle::Classic => CaptionFace::new(self.regular.as_ref(), 28.0, false, false, false),
        }
    }
}

fn load_font(path: &Path) -> Option<Font> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read font {:?}: {}", path, e);
            return None;
        }
    };

    match Font::from_bytes(bytes, FontSettings::default()) {
        Ok(font) => {
            debug!("Loaded caption font {:?}", path);
            Some(font)
        }
        Err(e) => {
            warn!("Failed to parse font {:?}: {}", path, e);
            None
        }
    }
}

/// Coverage mask for one rendered line of text
#[derive(Debug, Clone)]
pub struct LineMask {
    pub width: u32,
    pub height: u32,
    /// Distance from the top of the mask to the baseline
    pub ascent: u32,
    pub coverage: Vec<u8>,
}

impl LineMask {
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.coverage[(y * self.width + x) as usize]
    }
}

/// A font at a size, with optional synthesized weight and slant
#[derive(Clone, Copy)]
pub struct CaptionFace<'a> {
    font: Option<&'a Font>,
    px: f32,
    embolden: bool,
    oblique: bool,
    bold_metrics: bool,
}

impl<'a> CaptionFace<'a> {
    fn new(font: Option<&'a Font>, px: f32, embolden: bool, oblique: bool, bold_metrics: bool) -> Self {
        Self { font, px, embolden, oblique, bold_metrics }
    }

    pub fn size(&self) -> f32 {
        self.px
    }

    pub fn has_glyphs(&self) -> bool {
        self.font.is_some()
    }

    /// Advance width of a line of text in pixels
    pub fn measure(&self, text: &str) -> f64 {
        let Some(font) = self.font else {
            let advance = if self.bold_metrics { FALLBACK_BOLD_ADVANCE } else { FALLBACK_ADVANCE };
            return (text.chars().count() as f32 * self.px * advance) as f64;
        };

        let mut width = 0.0f32;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                width += font.horizontal_kern(prev, ch, self.px).unwrap_or(0.0);
            }
            width += font.metrics(ch, self.px).advance_width;
            if self.embolden {
                width += 1.0;
            }
            previous = Some(ch);
        }
        width as f64
    }

    /// Rasterize a line of text into a coverage mask
    pub fn rasterize(&self, text: &str) -> Option<LineMask> {
        let font = self.font?;
        if text.is_empty() {
            return None;
        }

        let (ascent, descent) = match font.horizontal_line_metrics(self.px) {
            Some(line) => (line.ascent.ceil() as i32, (-line.descent).ceil() as i32),
            None => (self.px.ceil() as i32, (self.px * 0.25).ceil() as i32),
        };
        let height = (ascent + descent).max(1);

        let slant = |y: i32| -> i32 {
            if self.oblique {
                ((ascent - y) as f32 * OBLIQUE_SHEAR).round() as i32
            } else {
                0
            }
        };
        let left_pad = if self.oblique { (descent as f32 * OBLIQUE_SHEAR).ceil() as i32 } else { 0 };
        let right_pad = if self.oblique { (ascent as f32 * OBLIQUE_SHEAR).ceil() as i32 } else { 0 };
        let width = (self.measure(text).ceil() as i32 + left_pad + right_pad + 2).max(1);

        let mut coverage = vec![0u8; (width * height) as usize];
        let mut plot = |x: i32, y: i32, value: u8| {
            if x >= 0 && x < width && y >= 0 && y < height {
                let cell = &mut coverage[(y * width + x) as usize];
                *cell = (*cell).max(value);
            }
        };

        let mut pen_x = left_pad as f32;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                pen_x += font.horizontal_kern(prev, ch, self.px).unwrap_or(0.0);
            }

            let (metrics, bitmap) = font.rasterize(ch, self.px);
            let glyph_x = (pen_x + metrics.xmin as f32).round() as i32;
            let glyph_y = ascent - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                let y = glyph_y + gy as i32;
                let shift = slant(y);
                for gx in 0..metrics.width {
                    let value = bitmap[gy * metrics.width + gx];
                    if value == 0 {
                        continue;
                    }
                    let x = glyph_x + gx as i32 + shift;
                    plot(x, y, value);
                    if self.embolden {
                        plot(x + 1, y, value);
                    }
                }
            }

            pen_x += metrics.advance_width;
            if self.embolden {
                pen_x += 1.0;
            }
            previous = Some(ch);
        }

        Some(LineMask {
            width: width as u32,
            height: height as u32,
            ascent: ascent as u32,
            coverage,
        })
    }
}

/// Paths probed for a regular face, for diagnostics
pub fn system_font_candidates() -> Vec<PathBuf> {
    SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect()
}
