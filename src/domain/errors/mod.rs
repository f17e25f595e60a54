// Domain errors - Failure taxonomy of a pipeline run

use thiserror::Error;

/// Every way a compression or extraction run can fail.
///
/// A run surfaces exactly one of these, after its playback and encoding
/// resources have been released. Nothing is retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Asset cannot be opened or decoded
    #[error("Failed to load media: {message}")]
    Load { message: String },

    /// Capture surface cannot be created
    #[error("Capture surface unavailable: {message}")]
    Surface { message: String },

    /// Every codec preference was rejected
    #[error("No usable encoder (tried: {tried})")]
    EncoderInit { tried: String },

    /// Playback start refused by the environment
    #[error("Playback refused: {message}")]
    Playback { message: String },

    /// Invalid start/end parameters
    #[error("Invalid range: {message}")]
    Range { message: String },

    /// Encoder failed after it was started
    #[error("Encoding failed: {message}")]
    Encode { message: String },

    /// Run was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load { message: message.into() }
    }

    pub fn surface(message: impl Into<String>) -> Self {
        Self::Surface { message: message.into() }
    }

    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback { message: message.into() }
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::Range { message: message.into() }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode { message: message.into() }
    }

    /// Short stable name used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Surface { .. } => "surface",
            Self::EncoderInit { .. } => "encoder_init",
            Self::Playback { .. } => "playback",
            Self::Range { .. } => "range",
            Self::Encode { .. } => "encode",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
