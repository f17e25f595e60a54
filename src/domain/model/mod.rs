// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{PipelineError, PipelineResult};

#[cfg(test)]
mod tests;

/// Time position in seconds, parsed from user input
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeSpec {
    pub seconds: f64,
}

impl TimeSpec {
    pub fn from_seconds(seconds: f64) -> Self {
        Self { seconds }
    }

    /// Parse `SS.ms`, `MM:SS.ms` or `HH:MM:SS.ms`
    pub fn parse(input: &str) -> PipelineResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::range("empty time value"));
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [s] => (0, 0, parse_seconds(s, trimmed)?),
            [m, s] => (0, parse_unit(m, "minutes", trimmed)?, parse_seconds(s, trimmed)?),
            [h, m, s] => (
                parse_unit(h, "hours", trimmed)?,
                parse_unit(m, "minutes", trimmed)?,
                parse_seconds(s, trimmed)?,
            ),
            _ => {
                return Err(PipelineError::range(format!(
                    "'{}' is not a time; use seconds, MM:SS.ms or HH:MM:SS.ms",
                    trimmed
                )))
            }
        };

        if parts.len() > 1 && seconds >= 60.0 {
            return Err(PipelineError::range(format!(
                "'{}': seconds must be less than 60",
                trimmed
            )));
        }
        if parts.len() == 3 && minutes >= 60 {
            return Err(PipelineError::range(format!(
                "'{}': minutes must be less than 60",
                trimmed
            )));
        }

        Ok(Self::from_seconds(
            hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds,
        ))
    }

    /// Compact label used in generated file names, e.g. `1m02s500`
    pub fn file_label(&self) -> String {
        let total_ms = (self.seconds * 1000.0).round() as u64;
        let minutes = total_ms / 60_000;
        let seconds = (total_ms % 60_000) / 1000;
        let millis = total_ms % 1000;
        if millis == 0 {
            format!("{}m{:02}s", minutes, seconds)
        } else {
            format!("{}m{:02}s{:03}", minutes, seconds, millis)
        }
    }
}

fn parse_unit(part: &str, unit: &str, whole: &str) -> PipelineResult<u32> {
    part.parse::<u32>()
        .map_err(|_| PipelineError::range(format!("'{}': invalid {}", whole, unit)))
}

fn parse_seconds(part: &str, whole: &str) -> PipelineResult<f64> {
    let seconds = part
        .parse::<f64>()
        .map_err(|_| PipelineError::range(format!("'{}': invalid seconds", whole)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(PipelineError::range(format!(
            "'{}': time cannot be negative",
            whole
        )));
    }
    Ok(seconds)
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = (self.seconds * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let seconds = (total_ms % 60_000) / 1000;
        let millis = total_ms % 1000;
        if hours > 0 {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
        } else {
            write!(f, "{:02}:{:02}.{:03}", minutes, seconds, millis)
        }
    }
}

/// Where the bytes of a [`SourceAsset`] live
#[derive(Clone)]
pub enum AssetData {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl fmt::Debug for AssetData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetData::File(path) => f.debug_tuple("File").field(path).finish(),
            AssetData::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

/// The caller's video. Immutable; the pipeline only borrows it.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    name: String,
    mime_type: String,
    size: u64,
    data: AssetData,
}

impl SourceAsset {
    /// Reference a video file on disk
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            PipelineError::load(format!("cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(PipelineError::load(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            mime_type: mime_from_path(path).to_string(),
            name,
            size: metadata.len(),
            data: AssetData::File(path.to_path_buf()),
        })
    }

    /// Wrap video bytes already held in memory
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: Option<&str>,
    ) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        let mime_type = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_path(Path::new(&name)).to_string());
        Self {
            size: bytes.len() as u64,
            mime_type,
            name,
            data: AssetData::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn data(&self) -> &AssetData {
        &self.data
    }

    /// Full contents of the asset, unmodified
    pub async fn read_bytes(&self) -> PipelineResult<Vec<u8>> {
        match &self.data {
            AssetData::File(path) => Ok(tokio::fs::read(path).await?),
            AssetData::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Intrinsic properties of an opened video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    /// Seconds
    pub duration: f64,
    pub frame_rate: f64,
}

impl MediaMetadata {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// Fixed raster dimensions of a capture surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// One codec the encoder may try, in preference order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecPreference {
    /// Encoder name, e.g. `libvpx-vp9`
    pub codec: String,
    /// Muxer name, e.g. `webm`
    pub container: String,
    pub mime_type: String,
}

impl CodecPreference {
    pub fn new(codec: &str, container: &str, mime_type: &str) -> Self {
        Self {
            codec: codec.to_string(),
            container: container.to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    /// High-efficiency first, universally supported last
    pub fn default_preferences() -> Vec<Self> {
        vec![
            Self::new("libvpx-vp9", "webm", "video/webm;codecs=vp9"),
            Self::new("libvpx", "webm", "video/webm;codecs=vp8"),
            Self::new("libx264", "mp4", "video/mp4"),
        ]
    }

    pub fn extension(&self) -> &str {
        match self.container.as_str() {
            "matroska" => "mkv",
            "mov" => "mov",
            other => other,
        }
    }
}

/// Parameters a stream encoder is built with
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub size: SurfaceSize,
    /// Frames per wall-clock second sampled from the surface
    pub capture_fps: u32,
    /// Bits per second
    pub bitrate: u64,
    /// Media seconds per wall-clock second (the playback rate)
    pub time_scale: f64,
}

impl EncoderSettings {
    /// Presentation time of the n-th captured frame, in milliseconds of media time
    pub fn frame_pts_ms(&self, index: u64) -> i64 {
        let fps = self.capture_fps.max(1) as f64;
        (index as f64 * 1000.0 * self.time_scale / fps).round() as i64
    }

    /// Frame rate of the artifact when played back at normal speed
    pub fn nominal_fps(&self) -> f64 {
        if self.time_scale <= 0.0 {
            self.capture_fps as f64
        } else {
            self.capture_fps as f64 / self.time_scale
        }
    }
}

/// Finished video handed back to the caller
#[derive(Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// `None` when the original asset was passed through
    pub codec: Option<String>,
    pub extension: String,
}

impl OutputArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_passthrough(&self) -> bool {
        self.codec.is_none()
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        tokio::fs::write(path, &self.bytes).await?;
        Ok(())
    }
}

impl fmt::Debug for OutputArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputArtifact")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("codec", &self.codec)
            .finish()
    }
}

/// Highlight descriptor returned by the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub title: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Analysis service response: a title, a markdown summary and ordered highlights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

impl AnalysisReport {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
