use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use crate::audio::types::{AudioData, AudioFormat};
use crate::error::{AudioError, Result};

/// Audio file loader supporting multiple formats
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file and return decoded samples
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref().to_path_buf();
        let extension = Self::detect_format(&path).unwrap_or_default();

        if !Self::is_format_supported(&extension) {
            return Err(AudioError::UnsupportedFormat { format: extension }.into());
        }

        // Decoding a long voiceover is CPU-bound
        let data = tokio::task::spawn_blocking(move || {
            if extension == "wav" {
                Self::load_wav(&path)
            } else {
                Self::load_with_symphonia(&path)
            }
        })
        .await
        .map_err(|e| AudioError::InvalidParameters { details: e.to_string() })??;

        info!("Loaded audio: {:.1}s, {} Hz, {} channels",
              data.duration, data.sample_rate, data.channels);
        Ok(data)
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<AudioData> {
        let load_failed = || AudioError::LoadFailed { path: path.display().to_string() };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| Self::int_to_float(s, bit_depth)))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| load_failed())?
            }
        };

        let mut data = AudioData::from_samples(samples, spec.sample_rate, spec.channels);
        data.file_path = path.to_path_buf();
        data.format = AudioFormat {
            extension: "wav".to_string(),
            bit_depth: Some(spec.bits_per_sample),
            compression: None,
            bitrate: None,
        };
        Ok(data)
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<AudioData> {
        let load_failed = || AudioError::LoadFailed { path: path.display().to_string() };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate
            .ok_or_else(|| AudioError::InvalidParameters {
                details: "No sample rate found".to_string()
            })?;
        let channels = codec_params.channels
            .ok_or_else(|| AudioError::InvalidParameters {
                details: "No channel information found".to_string()
            })?
            .count() as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut samples = Vec::new();
        let mut buffer: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let buffer = buffer.get_or_insert_with(|| {
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                    });
                    if buffer.capacity() < decoded.capacity() * channels as usize {
                        *buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    }
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(reason)) => {
                    debug!("Skipping undecodable packet: {}", reason);
                    continue;
                }
                Err(_) => break,
            }
        }

        let mut data = AudioData::from_samples(samples, sample_rate, channels);
        data.file_path = path.to_path_buf();
        data.format = AudioFormat {
            extension: Self::detect_format(path).unwrap_or_else(|| "unknown".to_string()),
            bit_depth: codec_params.bits_per_sample.map(|b| b as u16),
            compression: Some(format!("{:?}", codec_params.codec)),
            bitrate: None,
        };
        Ok(data)
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => (sample as f32 - 128.0) / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("voice.wav"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("voice.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("voice"), None);
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("xyz"));
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(128, 8), 0.0);
    }

    #[tokio::test]
    async fn test_load_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8000 {
            let value = if i % 2 == 0 { 16384 } else { -16384 };
            writer.write_sample(value as i16).unwrap();
            writer.write_sample(value as i16).unwrap();
        }
        writer.finalize().unwrap();

        let data = AudioLoader::load(&path).await.unwrap();
        assert_eq!(data.sample_rate, 8000);
        assert_eq!(data.channels, 2);
        assert!((data.duration - 1.0).abs() < 1e-9);
        assert_eq!(data.samples[0], 0.5);
    }

    #[tokio::test]
    async fn test_corrupt_wav_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        File::create(&path).unwrap().write_all(b"RIFF nope").unwrap();

        let result = AudioLoader::load(&path).await;
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Audio(AudioError::LoadFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let result = AudioLoader::load("notes.xyz").await;

        if let Err(crate::error::CompositorError::Audio(AudioError::UnsupportedFormat { format })) = result {
            assert_eq!(format, "xyz");
        } else {
            panic!("Expected UnsupportedFormat error");
        }
    }
}
