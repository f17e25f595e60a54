// Domain rules - Sizing, range and progress policies

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::{MediaMetadata, SurfaceSize};

#[cfg(test)]
mod tests;

/// Highest percentage reported before the artifact is ready
pub const MAX_RECORDING_PERCENT: u8 = 99;

/// Percentage reserved for "artifact is ready"
pub const COMPLETE_PERCENT: u8 = 100;

/// How the capture surface is sized from the source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingPolicy {
    /// Downscale to this height; smaller sources keep their own height
    FixedHeight(u32),
    /// Keep source resolution unless it exceeds this height
    CappedHeight(u32),
}

/// Compute the capture surface for a source.
///
/// Width follows the source aspect ratio. Both dimensions are even, since
/// the YUV 4:2:0 encoders reject odd sizes. The surface never exceeds the
/// source resolution.
pub fn surface_size(meta: &MediaMetadata, policy: SizingPolicy) -> PipelineResult<SurfaceSize> {
    if meta.width == 0 || meta.height == 0 {
        return Err(PipelineError::surface(format!(
            "source reports invalid dimensions {}x{}",
            meta.width, meta.height
        )));
    }

    let limit = match policy {
        SizingPolicy::FixedHeight(h) | SizingPolicy::CappedHeight(h) => h,
    };
    if limit == 0 {
        return Err(PipelineError::surface("target height must be positive"));
    }

    let height = meta.height.min(limit);
    let width = if height == meta.height {
        meta.width
    } else {
        (height as f64 * meta.aspect_ratio()).round() as u32
    };

    let size = SurfaceSize {
        width: round_even(width),
        height: round_even(height),
    };
    if size.width == 0 || size.height == 0 {
        return Err(PipelineError::surface(format!(
            "source {}x{} collapses to an empty surface",
            meta.width, meta.height
        )));
    }
    Ok(size)
}

/// Rounds down; a 1px side becomes 0 and is rejected by the caller
fn round_even(value: u32) -> u32 {
    value - value % 2
}

/// Whether compression can hand back the original bytes untouched
pub fn is_below_threshold(size_bytes: u64, threshold_bytes: u64) -> bool {
    size_bytes < threshold_bytes
}

/// Check an extraction range against the media duration
pub fn validate_range(start: f64, end: f64, duration: f64) -> PipelineResult<()> {
    if !start.is_finite() || !end.is_finite() {
        return Err(PipelineError::range("start and end must be finite"));
    }
    if start < 0.0 {
        return Err(PipelineError::range(format!(
            "start ({:.3}s) cannot be negative",
            start
        )));
    }
    if start >= end {
        return Err(PipelineError::range(format!(
            "start ({:.3}s) must be before end ({:.3}s)",
            start, end
        )));
    }
    if end > duration {
        return Err(PipelineError::range(format!(
            "end ({:.3}s) is past the media duration ({:.3}s)",
            end, duration
        )));
    }
    Ok(())
}

/// Percent of `[start, end)` covered at `current`, clamped for the recording phase
pub fn recording_percent(current: f64, start: f64, end: f64) -> u8 {
    let span = end - start;
    if span.is_nan() || span <= 0.0 || !current.is_finite() {
        return 0;
    }
    let fraction = ((current - start) / span).clamp(0.0, 1.0);
    ((fraction * 100.0).floor() as u8).min(MAX_RECORDING_PERCENT)
}
