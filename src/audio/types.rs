use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decoded audio track with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Original file path
    pub file_path: PathBuf,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioData {
    /// Wrap already decoded interleaved samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let frames = samples.len() / channels.max(1) as usize;
        Self {
            duration: frames as f64 / sample_rate.max(1) as f64,
            samples,
            sample_rate,
            channels,
            file_path: PathBuf::new(),
            format: AudioFormat {
                extension: "pcm".to_string(),
                bit_depth: Some(32),
                compression: None,
                bitrate: None,
            },
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Frame index for a time in seconds, clamped to the track
    pub fn frame_at(&self, time: f64) -> usize {
        if !(time > 0.0) {
            return 0;
        }
        ((time * self.sample_rate as f64).round() as usize).min(self.frame_count())
    }

    /// Interleaved samples between two times
    pub fn span(&self, from: f64, to: f64) -> &[f32] {
        let channels = self.channels.max(1) as usize;
        let start = self.frame_at(from);
        let end = self.frame_at(to).max(start);
        &self.samples[start * channels..end * channels]
    }

    /// Whether the track has anything to play
    pub fn is_playable(&self) -> bool {
        self.channels > 0 && self.sample_rate > 0 && self.frame_count() > 0
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,

    /// Bitrate for compressed formats
    pub bitrate: Option<u32>,
}
