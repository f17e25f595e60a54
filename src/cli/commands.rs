//! Command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::highlights::export_highlights;
use crate::app::pipeline::Pipeline;
use crate::cli::args::{CompressArgs, ExtractArgs, HighlightsArgs, InspectArgs};
use crate::cli::{Commands, ProgressMode};
use crate::domain::model::{AnalysisReport, MediaMetadata, SourceAsset, TimeSpec};
use crate::engine::progress::{
    ConsoleProgressCallback, JsonProgressCallback, NoOpProgressCallback, ProgressCallback,
};
use crate::error::{ReelcutError, ReelcutResult};
use crate::utils::path::PathUtils;
use crate::utils::Utils;

/// Dispatch a parsed command
pub async fn run(command: Commands, pipeline: &Pipeline, progress: ProgressMode) -> Result<()> {
    match command {
        Commands::Compress(args) => compress(args, pipeline, progress).await,
        Commands::Extract(args) => extract(args, pipeline, progress).await,
        Commands::Highlights(args) => highlights(args, pipeline, progress).await,
        Commands::Inspect(args) => inspect(args, pipeline).await,
    }
}

/// Progress callback for one operation
pub fn progress_callback(mode: ProgressMode, operation: &str) -> Arc<dyn ProgressCallback> {
    match mode {
        ProgressMode::Console => Arc::new(ConsoleProgressCallback::new(operation)),
        ProgressMode::Json => Arc::new(JsonProgressCallback::new(operation)),
        ProgressMode::None => Arc::new(NoOpProgressCallback),
    }
}

/// Parse a CLI time argument
pub fn parse_time(value: &str) -> ReelcutResult<TimeSpec> {
    TimeSpec::parse(value).map_err(|_| ReelcutError::InvalidTimeFormat {
        time: value.to_string(),
    })
}

fn open_asset(path: &Path) -> ReelcutResult<SourceAsset> {
    if !path.exists() {
        return Err(ReelcutError::InputFileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(SourceAsset::from_path(path)?)
}

/// Execute the compress command
pub async fn compress(args: CompressArgs, pipeline: &Pipeline, progress: ProgressMode) -> Result<()> {
    info!("Starting compress operation");
    info!("Input: {}", args.input.display());

    let asset = open_asset(&args.input)?;
    let artifact = pipeline
        .compress(&asset, progress_callback(progress, "compress"))
        .await
        .context("Compression failed")?;

    let output = args
        .output
        .unwrap_or_else(|| PathUtils::compressed_output(&args.input, &artifact.extension));
    artifact
        .write_to(&output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if artifact.is_passthrough() {
        info!(
            "Input is below the size threshold; copied unchanged to {}",
            output.display()
        );
    } else {
        info!(
            "Compressed {} -> {} ({:+.1}%) with {}: {}",
            Utils::format_file_size(asset.size()),
            Utils::format_file_size(artifact.len() as u64),
            Utils::size_change_percent(asset.size(), artifact.len() as u64),
            artifact.codec.as_deref().unwrap_or("unknown"),
            output.display()
        );
    }
    Ok(())
}

/// Execute the extract command
pub async fn extract(args: ExtractArgs, pipeline: &Pipeline, progress: ProgressMode) -> Result<()> {
    let start = parse_time(&args.start)?;
    let end = parse_time(&args.end)?;
    info!("Starting extract operation");
    info!("Input: {}", args.input.display());
    info!("Range: {} - {}", start, end);

    let asset = open_asset(&args.input)?;
    let artifact = pipeline
        .extract_range(
            &asset,
            start.seconds,
            end.seconds,
            progress_callback(progress, "extract"),
        )
        .await
        .context("Extraction failed")?;

    let output = args
        .output
        .unwrap_or_else(|| PathUtils::clip_output(&args.input, start, end, &artifact.extension));
    artifact
        .write_to(&output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Clip written: {} ({})",
        output.display(),
        Utils::format_file_size(artifact.len() as u64)
    );
    Ok(())
}

/// Execute the highlights command
pub async fn highlights(
    args: HighlightsArgs,
    pipeline: &Pipeline,
    progress: ProgressMode,
) -> Result<()> {
    let json = tokio::fs::read_to_string(&args.report)
        .await
        .with_context(|| format!("Failed to read report {}", args.report.display()))?;
    let report = AnalysisReport::from_json(&json).map_err(ReelcutError::from)?;
    let asset = open_asset(&args.input)?;

    let out_dir = args.out_dir.unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        args.input.with_file_name(format!("{}_highlights", stem))
    });

    let outcomes = export_highlights(pipeline, &asset, &report, &out_dir, |index, highlight| {
        progress_callback(progress, &format!("highlight {} {}", index + 1, highlight.title))
    })
    .await?;

    for outcome in &outcomes {
        match (&outcome.output, &outcome.error) {
            (Some(path), _) => info!("[{}] {} -> {}", outcome.index + 1, outcome.title, path.display()),
            (None, Some(error)) => warn!("[{}] {} skipped: {}", outcome.index + 1, outcome.title, error),
            (None, None) => {}
        }
    }
    if !outcomes.is_empty() && outcomes.iter().all(|o| !o.is_exported()) {
        anyhow::bail!("No highlight could be exported");
    }
    Ok(())
}

#[derive(Serialize)]
struct InspectReport<'a> {
    name: &'a str,
    mime_type: &'a str,
    size: u64,
    #[serde(flatten)]
    metadata: &'a MediaMetadata,
}

/// Execute the inspect command
pub async fn inspect(args: InspectArgs, pipeline: &Pipeline) -> Result<()> {
    let asset = open_asset(&args.input)?;
    let metadata = pipeline
        .inspect(&asset)
        .await
        .context("Failed to inspect input file")?;

    if args.json {
        let report = InspectReport {
            name: asset.name(),
            mime_type: asset.mime_type(),
            size: asset.size(),
            metadata: &metadata,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File:       {}", asset.name());
        println!("Type:       {}", asset.mime_type());
        println!("Size:       {}", Utils::format_file_size(asset.size()));
        println!("Resolution: {}x{}", metadata.width, metadata.height);
        println!("Duration:   {}", Utils::format_seconds(metadata.duration));
        println!("Frame rate: {:.3} fps", metadata.frame_rate);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_maps_to_cli_error() {
        assert_eq!(parse_time("1:30").unwrap().seconds, 90.0);
        let err = parse_time("ninety").unwrap_err();
        assert!(matches!(err, ReelcutError::InvalidTimeFormat { .. }));
        assert!(err.to_string().contains("ninety"));
    }
}
