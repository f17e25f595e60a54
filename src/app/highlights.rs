//! Batch export of analysis highlights as standalone clips

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::app::pipeline::Pipeline;
use crate::domain::errors::PipelineError;
use crate::domain::model::{AnalysisReport, Highlight, SourceAsset};
use crate::engine::progress::ProgressCallback;
use crate::error::ReelcutResult;
use crate::utils::path::PathUtils;

/// Result of exporting one highlight
#[derive(Debug, Serialize)]
pub struct HighlightOutcome {
    pub index: usize,
    pub title: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Written file, when the export succeeded
    pub output: Option<PathBuf>,
    /// Failure message, when it did not
    pub error: Option<String>,
}

impl HighlightOutcome {
    pub fn is_exported(&self) -> bool {
        self.output.is_some()
    }
}

/// Extract every highlight of `report` into `out_dir`, one at a time.
///
/// A highlight that fails (invalid range, encoder failure) is recorded and
/// the batch moves on. Cancellation stops the batch.
pub async fn export_highlights<F>(
    pipeline: &Pipeline,
    asset: &SourceAsset,
    report: &AnalysisReport,
    out_dir: &Path,
    progress_for: F,
) -> ReelcutResult<Vec<HighlightOutcome>>
where
    F: Fn(usize, &Highlight) -> Arc<dyn ProgressCallback>,
{
    tokio::fs::create_dir_all(out_dir).await?;
    info!(
        title = %report.title,
        highlights = report.highlights.len(),
        out_dir = %out_dir.display(),
        "Exporting highlights"
    );

    let mut outcomes = Vec::with_capacity(report.highlights.len());
    for (index, highlight) in report.highlights.iter().enumerate() {
        let mut outcome = HighlightOutcome {
            index,
            title: highlight.title.clone(),
            start_time: highlight.start_time,
            end_time: highlight.end_time,
            output: None,
            error: None,
        };

        let result = pipeline
            .extract_range(
                asset,
                highlight.start_time,
                highlight.end_time,
                progress_for(index, highlight),
            )
            .await;

        match result {
            Ok(artifact) => {
                let path = out_dir.join(PathUtils::highlight_file_name(
                    index,
                    &highlight.title,
                    &artifact.extension,
                ));
                artifact.write_to(&path).await?;
                info!(index, title = %highlight.title, path = %path.display(), bytes = artifact.len(), "Highlight exported");
                outcome.output = Some(path);
            }
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled.into()),
            Err(err) => {
                warn!(index, title = %highlight.title, kind = err.kind(), error = %err, "Highlight skipped");
                outcome.error = Some(err.to_string());
            }
        }
        outcomes.push(outcome);
    }

    let exported = outcomes.iter().filter(|o| o.is_exported()).count();
    info!(exported, skipped = outcomes.len() - exported, "Highlight export finished");
    Ok(outcomes)
}
