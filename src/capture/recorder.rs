use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::video::Frame;

/// The frame and audio streams a recorder is bound to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureTracks {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A piece of encoded output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk(pub Vec<u8>);

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encodes captured frames and audio into a media container
pub trait Recorder {
    fn name(&self) -> &str;

    fn mime_type(&self) -> &str {
        "video/webm"
    }

    /// Attach to the frame and audio streams of a session
    fn bind(&mut self, tracks: CaptureTracks) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Interleaved samples at the bound rate and channel count
    fn write_audio(&mut self, samples: &[f32]) -> Result<()>;

    /// Chunks encoded since the last call
    fn take_data(&mut self) -> Vec<EncodedChunk> {
        Vec::new()
    }

    /// Finish encoding and hand over the remaining chunks
    fn stop(&mut self) -> Result<Vec<EncodedChunk>>;
}

struct EncodeSession {
    tracks: CaptureTracks,
    encoder: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    audio: Option<hound::WavWriter<BufWriter<File>>>,
    audio_samples: u64,
}

/// Recorder backed by an external FFmpeg process
///
/// Frames are piped to FFmpeg as raw rgb24 and encoded to a video-only
/// webm. Audio goes to a float WAV next to it. Stopping muxes both into the
/// final file, which is returned in chunks.
pub struct FfmpegRecorder {
    config: CaptureConfig,
    tracks: Option<CaptureTracks>,
    session: Option<EncodeSession>,
    temp_dir: Option<TempDir>,
}

impl FfmpegRecorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            tracks: None,
            session: None,
            temp_dir: None,
        }
    }

    pub fn check_available(ffmpeg_path: &str) -> bool {
        Command::new(ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn ensure_temp_dir(&mut self) -> Result<PathBuf> {
        if let Some(ref temp_dir) = self.temp_dir {
            return Ok(temp_dir.path().to_path_buf());
        }

        let temp_dir = tempfile::Builder::new().prefix("reelcast_capture_").tempdir()?;
        let path = temp_dir.path().to_path_buf();
        self.temp_dir = Some(temp_dir);
        Ok(path)
    }

    fn encoding_failed<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> CaptureError + '_ {
        move |e| CaptureError::EncodingFailed {
            reason: format!("{}: {}", context, e),
        }
    }

    fn spawn_encoder(&self, tracks: &CaptureTracks, temp_dir: &Path) -> Result<Child> {
        let log = File::create(temp_dir.join("encoder.log"))?;
        let output = temp_dir.join("video_only.webm");

        let size = format!("{}x{}", tracks.width, tracks.height);
        let rate = tracks.fps.to_string();

        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.args([
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", size.as_str(),
            "-r", rate.as_str(),
            "-i", "-",
            "-c:v", self.config.video_codec.as_str(),
            "-b:v", "2M",
            "-pix_fmt", "yuv420p",
            "-an",
            "-y",
        ])
        .arg(&output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log));

        debug!("Spawning encoder: {:?}", cmd);
        cmd.spawn()
            .map_err(|e| CaptureError::RecorderUnavailable { reason: e.to_string() }.into())
    }

    fn mux(&self, temp_dir: &Path, with_audio: bool) -> Result<PathBuf> {
        let video = temp_dir.join("video_only.webm");
        if !with_audio {
            return Ok(video);
        }

        let output = temp_dir.join("capture.webm");
        let result = Command::new(&self.config.ffmpeg_path)
            .arg("-i").arg(&video)
            .arg("-i").arg(temp_dir.join("audio.wav"))
            .args(["-c:v", "copy", "-c:a", self.config.audio_codec.as_str(), "-shortest", "-y"])
            .arg(&output)
            .output()
            .map_err(Self::encoding_failed("FFmpeg execution failed"))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(CaptureError::EncodingFailed {
                reason: format!("FFmpeg mux failed: {}", stderr.lines().last().unwrap_or("")),
            }.into());
        }
        Ok(output)
    }

    fn read_chunks(&self, path: &Path) -> Result<Vec<EncodedChunk>> {
        let mut file = File::open(path)?;
        let mut chunks = Vec::new();
        loop {
            let mut chunk = vec![0u8; self.config.chunk_size];
            let read = file.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            chunk.truncate(read);
            chunks.push(EncodedChunk(chunk));
        }
        Ok(chunks)
    }

    fn encoder_log_tail(temp_dir: &Path) -> String {
        std::fs::read_to_string(temp_dir.join("encoder.log"))
            .ok()
            .and_then(|log| log.lines().last().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn cleanup(&mut self) {
        if let Some(mut session) = self.session.take() {
            drop(session.stdin.take());
            let _ = session.encoder.kill();
            let _ = session.encoder.wait();
        }
        if let Some(temp_dir) = self.temp_dir.take() {
            if let Err(e) = temp_dir.close() {
                warn!("Failed to remove temporary directory: {}", e);
            }
        }
    }
}

impl Recorder for FfmpegRecorder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn bind(&mut self, tracks: CaptureTracks) -> Result<()> {
        if !Self::check_available(&self.config.ffmpeg_path) {
            return Err(CaptureError::RecorderUnavailable {
                reason: format!("'{}' not found. Please install FFmpeg.", self.config.ffmpeg_path),
            }.into());
        }
        self.tracks = Some(tracks);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let tracks = self.tracks.ok_or_else(|| CaptureError::InvalidState {
            expected: "bound".to_string(),
            found: "unbound".to_string(),
        })?;
        let temp_dir = self.ensure_temp_dir()?;

        let mut encoder = self.spawn_encoder(&tracks, &temp_dir)?;
        let stdin = encoder.stdin.take().map(BufWriter::new);

        let audio = if tracks.sample_rate > 0 && tracks.channels > 0 {
            let spec = hound::WavSpec {
                channels: tracks.channels,
                sample_rate: tracks.sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            Some(hound::WavWriter::create(temp_dir.join("audio.wav"), spec)
                .map_err(Self::encoding_failed("Failed to create audio track"))?)
        } else {
            None
        };

        info!("Recording {}x{} @ {} fps with {}", tracks.width, tracks.height, tracks.fps, self.config.video_codec);
        self.session = Some(EncodeSession {
            tracks,
            encoder,
            stdin,
            audio,
            audio_samples: 0,
        });
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let session = self.session.as_mut().ok_or(CaptureError::EncodingFailed {
            reason: "recorder not started".to_string(),
        })?;

        if (frame.width(), frame.height()) != (session.tracks.width, session.tracks.height) {
            return Err(CaptureError::EncodingFailed {
                reason: format!("frame is {}x{}, expected {}x{}",
                                frame.width(), frame.height(), session.tracks.width, session.tracks.height),
            }.into());
        }

        let stdin = session.stdin.as_mut().ok_or(CaptureError::EncodingFailed {
            reason: "encoder input closed".to_string(),
        })?;
        stdin.write_all(frame.as_rgb_bytes())
            .map_err(Self::encoding_failed("Failed to write frame"))?;
        Ok(())
    }

    fn write_audio(&mut self, samples: &[f32]) -> Result<()> {
        let Some(writer) = self.session.as_mut().and_then(|s| s.audio.as_mut()) else {
            return Ok(());
        };
        for &sample in samples {
            writer.write_sample(sample)
                .map_err(Self::encoding_failed("Failed to write audio"))?;
        }
        if let Some(session) = self.session.as_mut() {
            session.audio_samples += samples.len() as u64;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<EncodedChunk>> {
        let mut session = self.session.take().ok_or(CaptureError::EncodingFailed {
            reason: "recorder not started".to_string(),
        })?;
        let temp_dir = self.ensure_temp_dir()?;

        if let Some(mut stdin) = session.stdin.take() {
            stdin.flush().map_err(Self::encoding_failed("Failed to flush frames"))?;
        }
        let status = session.encoder.wait()
            .map_err(Self::encoding_failed("FFmpeg execution failed"))?;
        if !status.success() {
            return Err(CaptureError::EncodingFailed {
                reason: format!("FFmpeg failed: {}", Self::encoder_log_tail(&temp_dir)),
            }.into());
        }

        let with_audio = session.audio_samples > 0;
        if let Some(writer) = session.audio.take() {
            writer.finalize().map_err(Self::encoding_failed("Failed to finalize audio"))?;
        }

        let output = self.mux(&temp_dir, with_audio)?;
        let chunks = self.read_chunks(&output)?;
        debug!("Encoded {} chunks ({} bytes)", chunks.len(), chunks.iter().map(EncodedChunk::len).sum::<usize>());

        self.cleanup();
        Ok(chunks)
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.cleanup();
    }
}
