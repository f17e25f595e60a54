//! Frame sampler: paints the visible decoded frame into the capture surface

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::SurfaceSize;
use crate::domain::surface::{lock_surface, SharedSurface};
use crate::ports::{PlaybackPort, VideoFrame};

/// Outcome of one sampling call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// A newly decoded frame was painted
    Painted,
    /// The surface already shows the visible frame
    Unchanged,
    /// The driver has no frame yet
    NoFrame,
}

/// Copies the driver's visible frame onto the surface at surface size.
///
/// Safe to call faster than the decoder produces frames; a frame that is
/// already on the surface is not painted again.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameSampler {
    filter: SampleFilter,
}

/// Resampling filter used when the surface is smaller than the frame
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SampleFilter {
    Nearest,
    #[default]
    Triangle,
}

impl FrameSampler {
    pub fn new(filter: SampleFilter) -> Self {
        Self { filter }
    }

    pub fn sample(
        &self,
        driver: &dyn PlaybackPort,
        surface: &SharedSurface,
    ) -> PipelineResult<SampleOutcome> {
        let Some(frame) = driver.current_frame() else {
            return Ok(SampleOutcome::NoFrame);
        };

        let size = {
            let guard = lock_surface(surface);
            if guard.painted_sequence() == Some(frame.sequence) {
                return Ok(SampleOutcome::Unchanged);
            }
            guard.size()
        };

        // scale outside the lock so the encoder is not blocked
        if frame.width == size.width && frame.height == size.height {
            lock_surface(surface).paint(frame.sequence, &frame.rgba)?;
        } else {
            let scaled = self.scale(&frame, size)?;
            lock_surface(surface).paint(frame.sequence, &scaled)?;
        }
        Ok(SampleOutcome::Painted)
    }

    fn scale(&self, frame: &VideoFrame, size: SurfaceSize) -> PipelineResult<Vec<u8>> {
        let source = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.as_ref().clone())
            .ok_or_else(|| {
                PipelineError::surface(format!(
                    "decoded frame buffer does not match {}x{}",
                    frame.width, frame.height
                ))
            })?;
        let filter = match self.filter {
            SampleFilter::Nearest => FilterType::Nearest,
            SampleFilter::Triangle => FilterType::Triangle,
        };
        Ok(imageops::resize(&source, size.width, size.height, filter).into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::synthetic::{ResourceTracker, SyntheticBackend, SyntheticClip};
    use crate::domain::model::SourceAsset;
    use crate::domain::surface::CaptureSurface;
    use crate::ports::MediaBackend;

    fn backend(width: u32, height: u32) -> SyntheticBackend {
        SyntheticBackend::new(ResourceTracker::new()).with_clip(
            "clip.mp4",
            SyntheticClip::new(width, height, 4.0),
        )
    }

    #[tokio::test]
    async fn test_sample_same_size_copies_frame() {
        let asset = SourceAsset::from_bytes("clip.mp4", vec![0u8; 4], None);
        let mut driver = backend(4, 2).open(&asset).await.unwrap();
        driver.seek(0.0).await.unwrap();
        let surface = CaptureSurface::shared(SurfaceSize { width: 4, height: 2 }).unwrap();

        let sampler = FrameSampler::default();
        assert_eq!(sampler.sample(driver.as_ref(), &surface).unwrap(), SampleOutcome::Painted);
        assert_eq!(sampler.sample(driver.as_ref(), &surface).unwrap(), SampleOutcome::Unchanged);

        let frame = driver.current_frame().unwrap();
        assert_eq!(lock_surface(&surface).pixels(), frame.rgba.as_slice());
        driver.close().await;
    }

    #[tokio::test]
    async fn test_sample_downscales_to_surface() {
        let asset = SourceAsset::from_bytes("clip.mp4", vec![0u8; 4], None);
        let mut driver = backend(64, 36).open(&asset).await.unwrap();
        driver.seek(1.0).await.unwrap();
        let surface = CaptureSurface::shared(SurfaceSize { width: 16, height: 8 }).unwrap();

        let sampler = FrameSampler::new(SampleFilter::Nearest);
        assert_eq!(sampler.sample(driver.as_ref(), &surface).unwrap(), SampleOutcome::Painted);

        let guard = lock_surface(&surface);
        assert_eq!(guard.pixels().len(), 16 * 8 * 4);
        assert_eq!(guard.paint_count(), 1);
        drop(guard);
        driver.close().await;
    }
}
