// Unit tests for domain rules

use super::*;

fn meta(width: u32, height: u32, duration: f64) -> MediaMetadata {
    MediaMetadata { width, height, duration, frame_rate: 30.0 }
}

#[test]
fn test_fixed_height_downscales_preserving_aspect() {
    let size = surface_size(&meta(1920, 1080, 60.0), SizingPolicy::FixedHeight(360)).unwrap();
    assert_eq!(size, SurfaceSize { width: 640, height: 360 });
}

#[test]
fn test_fixed_height_never_upscales() {
    let size = surface_size(&meta(320, 240, 60.0), SizingPolicy::FixedHeight(360)).unwrap();
    assert_eq!(size, SurfaceSize { width: 320, height: 240 });
}

#[test]
fn test_capped_height_passthrough_below_cap() {
    let size = surface_size(&meta(1280, 720, 60.0), SizingPolicy::CappedHeight(1080)).unwrap();
    assert_eq!(size, SurfaceSize { width: 1280, height: 720 });
}

#[test]
fn test_capped_height_limits_large_sources() {
    let size = surface_size(&meta(3840, 2160, 60.0), SizingPolicy::CappedHeight(1080)).unwrap();
    assert_eq!(size, SurfaceSize { width: 1920, height: 1080 });
}

#[test]
fn test_surface_dimensions_are_even() {
    let size = surface_size(&meta(1001, 563, 10.0), SizingPolicy::FixedHeight(361)).unwrap();
    assert_eq!(size.height % 2, 0);
    assert_eq!(size.width % 2, 0);

    let portrait = surface_size(&meta(1080, 1920, 10.0), SizingPolicy::FixedHeight(360)).unwrap();
    assert_eq!(portrait, SurfaceSize { width: 202, height: 360 });
}

#[test]
fn test_invalid_source_dimensions() {
    let err = surface_size(&meta(0, 1080, 10.0), SizingPolicy::FixedHeight(360)).unwrap_err();
    assert!(matches!(err, PipelineError::Surface { .. }));

    let err = surface_size(&meta(640, 360, 10.0), SizingPolicy::CappedHeight(0)).unwrap_err();
    assert!(matches!(err, PipelineError::Surface { .. }));
}

#[test]
fn test_single_pixel_side_is_rejected_not_upscaled() {
    let err = surface_size(&meta(1, 2, 1.0), SizingPolicy::CappedHeight(1080)).unwrap_err();
    assert!(matches!(err, PipelineError::Surface { .. }));

    // 3px wide at 1080 scales to 1px at 360
    let err = surface_size(&meta(3, 1080, 1.0), SizingPolicy::FixedHeight(360)).unwrap_err();
    assert!(matches!(err, PipelineError::Surface { .. }));

    let size = surface_size(&meta(3, 3, 1.0), SizingPolicy::CappedHeight(1080)).unwrap();
    assert_eq!(size, SurfaceSize { width: 2, height: 2 });
}

#[test]
fn test_threshold() {
    assert!(is_below_threshold(10, 20));
    assert!(!is_below_threshold(20, 20));
    assert!(!is_below_threshold(21, 20));
}

#[test]
fn test_validate_range() {
    assert!(validate_range(0.0, 5.0, 10.0).is_ok());
    assert!(validate_range(2.0, 10.0, 10.0).is_ok());

    for (start, end) in [(5.0, 5.0), (6.0, 5.0), (-1.0, 5.0), (2.0, 10.5), (f64::NAN, 3.0)] {
        let err = validate_range(start, end, 10.0).unwrap_err();
        assert!(matches!(err, PipelineError::Range { .. }), "{start}..{end}");
    }
}

#[test]
fn test_recording_percent_clamps_below_complete() {
    assert_eq!(recording_percent(0.0, 0.0, 10.0), 0);
    assert_eq!(recording_percent(5.0, 0.0, 10.0), 50);
    assert_eq!(recording_percent(9.999, 0.0, 10.0), 99);
    assert_eq!(recording_percent(10.0, 0.0, 10.0), MAX_RECORDING_PERCENT);
    assert_eq!(recording_percent(12.0, 0.0, 10.0), MAX_RECORDING_PERCENT);
}

#[test]
fn test_recording_percent_offset_range() {
    assert_eq!(recording_percent(3.0, 4.0, 8.0), 0);
    assert_eq!(recording_percent(6.0, 4.0, 8.0), 50);
    assert_eq!(recording_percent(5.0, 5.0, 5.0), 0);
}
