// Capture surface - Fixed-size raster shared by sampler and encoder

use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::SurfaceSize;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// RGBA raster the encoder treats as a live video source.
///
/// Dimensions are fixed at construction. The sampler paints into it on every
/// rendering tick; the encoder snapshots it at its own capture rate.
#[derive(Debug)]
pub struct CaptureSurface {
    size: SurfaceSize,
    pixels: Vec<u8>,
    painted_sequence: Option<u64>,
    paint_count: u64,
}

/// Surface handle shared between the sampler and one encoder
pub type SharedSurface = Arc<Mutex<CaptureSurface>>;

impl CaptureSurface {
    pub fn new(size: SurfaceSize) -> PipelineResult<Self> {
        if size.width == 0 || size.height == 0 {
            return Err(PipelineError::surface(format!(
                "cannot allocate a {}x{} surface",
                size.width, size.height
            )));
        }
        let len = (size.width as usize)
            .checked_mul(size.height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| {
                PipelineError::surface(format!(
                    "{}x{} surface is too large",
                    size.width, size.height
                ))
            })?;

        Ok(Self {
            size,
            pixels: vec![0; len],
            painted_sequence: None,
            paint_count: 0,
        })
    }

    pub fn shared(size: SurfaceSize) -> PipelineResult<SharedSurface> {
        Ok(Arc::new(Mutex::new(Self::new(size)?)))
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Sequence number of the decoded frame currently on the surface
    pub fn painted_sequence(&self) -> Option<u64> {
        self.painted_sequence
    }

    pub fn paint_count(&self) -> u64 {
        self.paint_count
    }

    /// Replace the raster with `rgba`, which must match the surface size exactly
    pub fn paint(&mut self, sequence: u64, rgba: &[u8]) -> PipelineResult<()> {
        if rgba.len() != self.pixels.len() {
            return Err(PipelineError::surface(format!(
                "frame of {} bytes does not fit a {}x{} surface",
                rgba.len(),
                self.size.width,
                self.size.height
            )));
        }
        self.pixels.copy_from_slice(rgba);
        self.painted_sequence = Some(sequence);
        self.paint_count += 1;
        Ok(())
    }
}

/// Lock a shared surface; a panic in another holder does not invalidate pixels
pub fn lock_surface(surface: &SharedSurface) -> MutexGuard<'_, CaptureSurface> {
    surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_allocation() {
        let surface = CaptureSurface::new(SurfaceSize { width: 4, height: 2 }).unwrap();
        assert_eq!(surface.pixels().len(), 32);
        assert_eq!(surface.painted_sequence(), None);
    }

    #[test]
    fn test_surface_rejects_empty_size() {
        let err = CaptureSurface::new(SurfaceSize { width: 0, height: 2 }).unwrap_err();
        assert!(matches!(err, PipelineError::Surface { .. }));
    }

    #[test]
    fn test_paint_requires_exact_size() {
        let mut surface = CaptureSurface::new(SurfaceSize { width: 2, height: 2 }).unwrap();
        assert!(surface.paint(1, &[7u8; 8]).is_err());

        surface.paint(3, &[7u8; 16]).unwrap();
        assert_eq!(surface.painted_sequence(), Some(3));
        assert_eq!(surface.paint_count(), 1);
        assert!(surface.pixels().iter().all(|&b| b == 7));
    }
}
