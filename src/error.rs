use thiserror::Error;

/// Main error type for the reelcast library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Action not available: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Asset-level errors. The renderer never sees these; they are absorbed
/// into a blank segment.
#[derive(Error, Debug, Clone)]
pub enum AssetError {
    #[error("Failed to decode asset {id}: {reason}")]
    DecodeFailed { id: String, reason: String },

    #[error("Failed to read asset file: {path}")]
    ReadFailed { path: String },
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },
}

/// Errors raised while adopting a generated timeline
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Segment {index} has an invalid time range: {start}..{end}")]
    InvalidRange { index: usize, start: f64, end: f64 },

    #[error("Timeline generation failed: {reason}")]
    GenerationFailed { reason: String },

    #[error("Malformed timeline records: {reason}")]
    Malformed { reason: String },
}

/// Transport and scheduler errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No audio transport attached")]
    NoTransport,

    #[error("Audio track has no playable samples")]
    EmptyTrack,

    #[error("Audio output unavailable: {reason}")]
    OutputUnavailable { reason: String },
}

/// Capture pipeline failures. Any of these returns the pipeline to idle.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Recorder unavailable: {reason}")]
    RecorderUnavailable { reason: String },

    #[error("Audio routing graph already constructed for this transport")]
    RoutingAlreadyConstructed,

    #[error("Audio routing failed: {reason}")]
    RoutingFailed { reason: String },

    #[error("Transport audio could not be decoded: {reason}")]
    TransportUndecodable { reason: String },

    #[error("Encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Invalid capture state: expected {expected}, found {found}")]
    InvalidState { expected: String, found: String },
}

/// Rejected actions. These never change any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no audio track loaded")]
    MissingAudio,

    #[error("no image assets available")]
    MissingImages,

    #[error("a capture session is already in progress")]
    CaptureInProgress,

    #[error("the scheduler is already driven by {0}")]
    SchedulerBusy(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Asset(_) => true,
            // A busy pipeline frees up once the current session finishes
            Self::Precondition(PreconditionError::CaptureInProgress) => true,
            Self::Capture(CaptureError::RecorderUnavailable { .. }) => false,
            Self::Audio(AudioError::LoadFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Precondition(PreconditionError::MissingAudio) => {
                "Add a voiceover track before generating or rendering.".to_string()
            }
            Self::Precondition(PreconditionError::MissingImages) => {
                "Add at least one image before generating or rendering.".to_string()
            }
            Self::Timeline(TimelineError::GenerationFailed { .. })
            | Self::Timeline(TimelineError::Malformed { .. }) => {
                "Error generating video script. The previous timeline was kept.".to_string()
            }
            Self::Capture(CaptureError::RecorderUnavailable { reason }) => {
                format!("Video recording is not available on this system: {}", reason)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_messages_are_friendly() {
        let err: CompositorError = PreconditionError::MissingImages.into();
        assert!(err.user_message().contains("at least one image"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_capture_in_progress_is_recoverable() {
        let err: CompositorError = PreconditionError::CaptureInProgress.into();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Action not available: a capture session is already in progress");
    }

    #[test]
    fn test_asset_errors_are_recoverable() {
        let err: CompositorError = AssetError::DecodeFailed {
            id: "k3x9p2m1q".to_string(),
            reason: "truncated".to_string(),
        }.into();
        assert!(err.is_recoverable());
        assert!(err.user_message().contains("k3x9p2m1q"));

        let err: CompositorError = CaptureError::InvalidState {
            expected: "Armed".to_string(),
            found: "Idle".to_string(),
        }.into();
        assert!(!err.is_recoverable());
    }
}
