//! reelcut video re-encoding library
//!
//! Shrinks videos and cuts standalone clips by playing the source, sampling
//! its frames onto a fixed-size capture surface and live-encoding that
//! surface. Both pipelines are exposed through [`app::Pipeline`].

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::Pipeline;
pub use domain::errors::{PipelineError, PipelineResult};
pub use domain::model::{AnalysisReport, Highlight, OutputArtifact, SourceAsset, TimeSpec};
pub use error::{ReelcutError, ReelcutResult};

/// Initialize the media libraries
pub fn init() -> ReelcutResult<()> {
    ffmpeg_next::init().map_err(|e| ReelcutError::FFmpegInitError {
        message: e.to_string(),
    })?;

    Ok(())
}
