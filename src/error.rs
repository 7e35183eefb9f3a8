use thiserror::Error;

/// Main error type for the versecut engine
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Structural timeline errors: precondition violations on track mutations
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Item {id} not found on track")]
    ItemNotFound { id: String },

    #[error("Track {id} not found in project")]
    TrackNotFound { id: String },

    #[error("Clip {id} not found in project")]
    ClipNotFound { id: String },

    #[error("Cut frame {frame} outside item span {lo}..{hi}")]
    CutOutOfRange { frame: f64, lo: f64, hi: f64 },

    #[error("Item kind not accepted by {track_kind} track")]
    IncompatibleKind { track_kind: String },
}

/// Compositing/export errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Frame {index} could not be composed: {reason}")]
    FrameFailed { index: u64, reason: String },

    #[error("Frame encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Export produced no frames (empty timeline?)")]
    EmptyTimeline,

    #[error("Export cancelled after {completed} frames")]
    Cancelled { completed: usize },

    #[error("Invalid render parameters: {details}")]
    InvalidParameters { details: String },
}

/// Decode/probe/encode collaborator errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to load media file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported media format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Frame extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Muxing failed: {reason}")]
    MuxFailed { reason: String },
}

/// Project open/save errors
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Project file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse project document: {reason}")]
    ParseFailed { reason: String },

    #[error("Unknown type tag {tag:?} in project document")]
    UnknownTypeTag { tag: String },

    #[error("Failed to write project document: {reason}")]
    WriteFailed { reason: String },
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

/// Convenience type alias for Results using EditorError
pub type Result<T> = std::result::Result<T, EditorError>;

impl EditorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // Media loading might work on retry
            Self::Media(MediaError::LoadFailed { .. }) => true,
            // A cancelled export can simply be restarted
            Self::Render(RenderError::Cancelled { .. }) => true,
            // Most other errors are permanent
            _ => false,
        }
    }
}

/// Structured outcome returned across the public project open/save boundary.
///
/// Open/save failures are reported as a value rather than an error so callers
/// can surface `message` directly; `data` carries the payload on success.
#[derive(Debug, Clone)]
pub struct OpResult<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> OpResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        let cancelled: EditorError = RenderError::Cancelled { completed: 3 }.into();
        assert!(cancelled.is_recoverable());

        let missing: EditorError = TimelineError::ItemNotFound { id: "x".into() }.into();
        assert!(!missing.is_recoverable());
    }

    #[test]
    fn op_result_carries_payload() {
        let ok = OpResult::ok("opened", 42u32);
        assert!(ok.success);
        assert_eq!(ok.data, Some(42));

        let failed: OpResult<u32> = OpResult::fail("no such file");
        assert!(!failed.success);
        assert!(failed.data.is_none());
    }
}
