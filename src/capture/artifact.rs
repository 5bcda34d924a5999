use std::path::{Path, PathBuf};

use tracing::info;

use crate::capture::recorder::EncodedChunk;
use crate::error::Result;

/// The finished recording of one capture session
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Frames handed to the recorder
    pub frames: u64,
    /// Transport time covered, in seconds
    pub duration: f64,
}

impl CaptureArtifact {
    /// Concatenate encoded chunks in order into one file
    pub fn from_chunks<I>(file_name: &str, mime_type: &str, chunks: I, frames: u64, duration: f64) -> Self
    where
        I: IntoIterator<Item = EncodedChunk>,
    {
        let bytes = chunks.into_iter().flat_map(|chunk| chunk.0).collect();
        Self {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            frames,
            duration,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the artifact under its own file name in `dir`
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        self.save_as(&path)?;
        Ok(path)
    }

    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), &self.bytes)?;
        info!("Saved {} ({:.1} KB, {} frames) to {:?}",
              self.mime_type, self.bytes.len() as f64 / 1024.0, self.frames, path.as_ref());
        Ok(())
    }
}
