//! Pipeline entry points: compression and range extraction

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::toml_config::PipelineConfig;
use crate::domain::errors::PipelineResult;
use crate::domain::model::{MediaMetadata, OutputArtifact, SourceAsset};
use crate::domain::rules::{is_below_threshold, validate_range, SizingPolicy};
use crate::engine::coordinator::{PipelineRun, RunDeps, RunKind, RunPlan};
use crate::engine::progress::{ProgressCallback, ProgressReporter};
use crate::engine::scheduler::{DisplayRefresh, TickSource};
use crate::ports::{EncoderFactory, MediaBackend};

/// Compressor and clip extractor over a pair of media adapters.
///
/// Cheap to share: every call builds its own run context, so concurrent
/// calls do not interfere.
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn MediaBackend>,
    encoders: Arc<dyn EncoderFactory>,
    ticks: Arc<dyn TickSource>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        encoders: Arc<dyn EncoderFactory>,
        config: PipelineConfig,
    ) -> Self {
        let ticks = Arc::new(DisplayRefresh::new(config.playback.refresh_hz));
        Self {
            backend,
            encoders,
            ticks,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the display-refresh tick source
    pub fn with_tick_source(mut self, ticks: Arc<dyn TickSource>) -> Self {
        self.ticks = ticks;
        self
    }

    /// Abort in-flight and future runs when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Metadata of an asset, without creating a playback session
    pub async fn inspect(&self, asset: &SourceAsset) -> PipelineResult<MediaMetadata> {
        self.backend.probe(asset).await
    }

    /// Re-encode `asset` at reduced resolution and bitrate.
    ///
    /// Assets below the size threshold are returned unchanged with a single
    /// `100` progress report.
    pub async fn compress(
        &self,
        asset: &SourceAsset,
        on_progress: Arc<dyn ProgressCallback>,
    ) -> PipelineResult<OutputArtifact> {
        let mut progress = ProgressReporter::new(on_progress);
        let settings = &self.config.compress;

        if is_below_threshold(asset.size(), settings.size_threshold_bytes) {
            info!(
                asset = %asset.name(),
                bytes = asset.size(),
                threshold = settings.size_threshold_bytes,
                "Asset below size threshold, returning original"
            );
            let bytes = asset.read_bytes().await?;
            progress.complete();
            return Ok(passthrough(asset, bytes));
        }

        let plan = RunPlan {
            kind: RunKind::Compress,
            start: 0.0,
            end: None,
            sizing: SizingPolicy::FixedHeight(settings.target_height),
            playback_rate: settings.playback_rate,
            capture_fps: settings.capture_fps,
            bitrate: settings.bitrate,
            settle_delay: std::time::Duration::ZERO,
            preferences: self.config.encoder.preferences.clone(),
        };
        PipelineRun::new(plan, progress)
            .execute(asset, &self.deps())
            .await
    }

    /// Re-encode `[start, end)` of `asset` at real-time speed.
    ///
    /// The range is checked before anything is opened.
    pub async fn extract_range(
        &self,
        asset: &SourceAsset,
        start: f64,
        end: f64,
        on_progress: Arc<dyn ProgressCallback>,
    ) -> PipelineResult<OutputArtifact> {
        validate_range(start, end, f64::INFINITY)?;
        let metadata = self.backend.probe(asset).await?;
        validate_range(start, end, metadata.duration)?;

        let settings = &self.config.extract;
        let plan = RunPlan {
            kind: RunKind::Extract,
            start,
            end: Some(end),
            sizing: SizingPolicy::CappedHeight(settings.max_height),
            playback_rate: 1.0,
            capture_fps: settings.capture_fps,
            bitrate: settings.bitrate,
            settle_delay: settings.seek_settle(),
            preferences: self.config.encoder.preferences.clone(),
        };
        PipelineRun::new(plan, ProgressReporter::new(on_progress))
            .execute(asset, &self.deps())
            .await
    }

    fn deps(&self) -> RunDeps<'_> {
        RunDeps {
            backend: self.backend.as_ref(),
            encoders: self.encoders.as_ref(),
            ticks: self.ticks.as_ref(),
            cancel: self.cancel.clone(),
        }
    }
}

fn passthrough(asset: &SourceAsset, bytes: Vec<u8>) -> OutputArtifact {
    let extension = std::path::Path::new(asset.name())
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    OutputArtifact {
        bytes,
        mime_type: asset.mime_type().to_string(),
        codec: None,
        extension,
    }
}
