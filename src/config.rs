use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for reelcast
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Look of the generated video
    #[serde(default)]
    pub video: VideoConfig,

    /// Frame rendering settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Caption font settings
    #[serde(default)]
    pub caption: CaptionConfig,

    /// Capture and encoding settings
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;
        self.capture.validate()?;
        Ok(())
    }

    /// Output frame dimensions for the configured aspect ratio
    pub fn frame_size(&self) -> (u32, u32) {
        self.video.aspect_ratio.frame_size(self.render.short_side)
    }
}

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    /// Frame dimensions with the given length of the shorter side
    pub fn frame_size(&self, short_side: u32) -> (u32, u32) {
        // Nearest even length, as yuv420p encoders require
        let long_side = ((short_side as u64 * 16 + 9) / 18 * 2) as u32;
        match self {
            AspectRatio::Landscape => (long_side, short_side),
            AspectRatio::Portrait => (short_side, long_side),
            AspectRatio::Square => (short_side, short_side),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "16:9" => Some(AspectRatio::Landscape),
            "9:16" => Some(AspectRatio::Portrait),
            "1:1" => Some(AspectRatio::Square),
            _ => None,
        }
    }
}

/// Overall video vibe. Only forwarded to the timeline generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoStyle {
    #[default]
    Professional,
    Modern,
    Minimal,
}

/// Caption typography
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptionStyle {
    #[default]
    Classic,
    Karaoke,
    Bold,
}

impl CaptionStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "classic" => Some(CaptionStyle::Classic),
            "karaoke" => Some(CaptionStyle::Karaoke),
            "bold" => Some(CaptionStyle::Bold),
            _ => None,
        }
    }
}

/// Settings shared with the timeline generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    pub aspect_ratio: AspectRatio,
    pub style: VideoStyle,
    pub caption_style: CaptionStyle,
}

/// Frame rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Refresh and capture rate in whole frames per second
    pub fps: u32,

    /// Length of the shorter frame side in pixels
    pub short_side: u32,

    /// Worker threads for pixel work and asset decoding
    pub threads: usize,

    /// Log a warning when a frame takes longer than 1/fps
    pub warn_on_budget_overrun: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            short_side: 720,
            threads: num_cpus::get(),
            warn_on_budget_overrun: true,
        }
    }
}

impl RenderConfig {
    /// Soft per-frame time budget in seconds
    pub fn frame_budget(&self) -> f64 {
        1.0 / self.fps as f64
    }

    fn validate(&self) -> Result<()> {
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidValue {
                key: "render.fps".to_string(),
                value: self.fps.to_string()
            }.into());
        }

        // yuv420p needs even dimensions
        if self.short_side < 64 || self.short_side > 4320 || self.short_side % 2 != 0 {
            return Err(ConfigError::InvalidValue {
                key: "render.short_side".to_string(),
                value: self.short_side.to_string()
            }.into());
        }

        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "render.threads".to_string(),
                value: self.threads.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Caption font files. Unset paths fall back to system fonts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionConfig {
    pub font_path: Option<PathBuf>,
    pub bold_font_path: Option<PathBuf>,
    pub italic_font_path: Option<PathBuf>,
}

/// How the capture transport advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturePacing {
    /// One frame step per tick, as fast as rendering allows
    #[default]
    Offline,
    /// Follow the wall clock like interactive playback
    Realtime,
}

/// Capture pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub ffmpeg_path: String,
    pub file_name: String,
    pub pacing: CapturePacing,

    /// Play the captured audio through the speakers while recording
    pub monitor_audio: bool,

    /// Size of the encoded chunks handed back by the recorder
    pub chunk_size: usize,

    pub video_codec: String,
    pub audio_codec: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            file_name: "ai-video.webm".to_string(),
            pacing: CapturePacing::Offline,
            monitor_audio: false,
            chunk_size: 64 * 1024,
            video_codec: "libvpx".to_string(),
            audio_codec: "libopus".to_string(),
        }
    }
}

impl CaptureConfig {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "capture.chunk_size".to_string(),
                value: self.chunk_size.to_string()
            }.into());
        }

        if self.file_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "capture.file_name".to_string(),
                value: self.file_name.clone()
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_size(), (1280, 720));
        assert_eq!(config.capture.file_name, "ai-video.webm");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("reelcast.toml");

        let mut original_config = Config::default();
        original_config.video.caption_style = CaptionStyle::Karaoke;
        original_config.video.aspect_ratio = AspectRatio::Portrait;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.video, original_config.video);
        assert_eq!(loaded_config.render.fps, original_config.render.fps);
        assert_eq!(loaded_config.frame_size(), (720, 1280));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[video]\naspectRatio = \"1:1\"\nstyle = \"Modern\"\ncaptionStyle = \"Bold\"\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.video.aspect_ratio, AspectRatio::Square);
        assert_eq!(config.video.caption_style, CaptionStyle::Bold);
        assert_eq!(config.frame_size(), (720, 720));
        assert_eq!(config.capture.pacing, CapturePacing::Offline);
    }

    #[test]
    fn test_invalid_fps() {
        let mut config = Config::default();
        config.render.fps = 0;
        assert!(config.validate().is_err());
        config.render.fps = 121;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fractional_fps_is_rejected() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("fractional.toml");
        std::fs::write(&file_path, "[render]\nfps = 12.5\nshort_side = 720\nthreads = 2\nwarn_on_budget_overrun = true\n").unwrap();

        let result = Config::from_file(&file_path);
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn test_frame_sizes_are_even() {
        assert_eq!(AspectRatio::Landscape.frame_size(720), (1280, 720));
        assert_eq!(AspectRatio::Landscape.frame_size(480), (854, 480));
        assert_eq!(AspectRatio::Portrait.frame_size(1080), (1080, 1920));
        assert_eq!(AspectRatio::Landscape.frame_size(64), (114, 64));
        for short_side in (64..=2160).step_by(2) {
            let (width, height) = AspectRatio::Landscape.frame_size(short_side);
            assert_eq!(width % 2, 0, "{}", short_side);
            assert_eq!(height % 2, 0, "{}", short_side);
        }

        let mut config = Config::default();
        config.render.short_side = 481;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
