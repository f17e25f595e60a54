//! Error handling module for reelcut

use thiserror::Error;

use crate::domain::errors::PipelineError;

/// Application-level errors: everything outside a single pipeline run
#[derive(Error, Debug)]
pub enum ReelcutError {
    /// Input file not found or inaccessible
    #[error("Input file not found: {path}")]
    InputFileNotFound { path: String },

    /// Invalid time format
    #[error("Invalid time format: {time}. Expected HH:MM:SS.ms, MM:SS.ms, or seconds")]
    InvalidTimeFormat { time: String },

    /// Configuration file, environment or override is invalid
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// FFmpeg initialization error
    #[error("Failed to initialize FFmpeg: {message}")]
    FFmpegInitError { message: String },

    /// Analysis report could not be parsed
    #[error("Invalid analysis report: {0}")]
    Report(#[from] serde_json::Error),

    /// A pipeline run failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReelcutError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for reelcut operations
pub type ReelcutResult<T> = std::result::Result<T, ReelcutError>;
