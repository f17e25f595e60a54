// Unit tests for domain models

use super::*;

#[test]
fn test_time_spec_parse_seconds() {
    let time = TimeSpec::parse("123.5").unwrap();
    assert_eq!(time.seconds, 123.5);
}

#[test]
fn test_time_spec_parse_mm_ss() {
    let time = TimeSpec::parse("01:30.5").unwrap();
    assert_eq!(time.seconds, 90.5);
}

#[test]
fn test_time_spec_parse_hh_mm_ss() {
    let time = TimeSpec::parse("01:02:03.5").unwrap();
    assert_eq!(time.seconds, 3723.5);
}

#[test]
fn test_time_spec_parse_invalid() {
    assert!(TimeSpec::parse("").is_err());
    assert!(TimeSpec::parse("abc").is_err());
    assert!(TimeSpec::parse("-4").is_err());
    assert!(TimeSpec::parse("00:60").is_err());
    assert!(TimeSpec::parse("01:60:00").is_err());
    assert!(TimeSpec::parse("1:2:3:4").is_err());

    let err = TimeSpec::parse("abc").unwrap_err();
    assert_eq!(err.kind(), "range");
}

#[test]
fn test_time_spec_display() {
    assert_eq!(TimeSpec::from_seconds(3723.456).to_string(), "01:02:03.456");
    assert_eq!(TimeSpec::from_seconds(83.25).to_string(), "01:23.250");
}

#[test]
fn test_time_spec_file_label() {
    assert_eq!(TimeSpec::from_seconds(62.5).file_label(), "1m02s500");
    assert_eq!(TimeSpec::from_seconds(5.0).file_label(), "0m05s");
}

#[test]
fn test_source_asset_from_bytes() {
    let asset = SourceAsset::from_bytes("holiday.webm", vec![1u8, 2, 3], None);
    assert_eq!(asset.size(), 3);
    assert_eq!(asset.mime_type(), "video/webm");
    assert_eq!(asset.name(), "holiday.webm");

    let explicit = SourceAsset::from_bytes("blob", vec![0u8; 8], Some("video/mp4"));
    assert_eq!(explicit.mime_type(), "video/mp4");
}

#[test]
fn test_source_asset_from_missing_path() {
    let err = SourceAsset::from_path("/definitely/not/here.mp4").unwrap_err();
    assert!(matches!(err, PipelineError::Load { .. }));
}

#[test]
fn test_source_asset_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mov");
    std::fs::write(&path, b"not really a movie").unwrap();

    let asset = SourceAsset::from_path(&path).unwrap();
    assert_eq!(asset.size(), 18);
    assert_eq!(asset.mime_type(), "video/quicktime");
    assert_eq!(asset.name(), "clip.mov");
}

#[test]
fn test_metadata_aspect_ratio() {
    let meta = MediaMetadata { width: 1920, height: 1080, duration: 10.0, frame_rate: 30.0 };
    assert!((meta.aspect_ratio() - 16.0 / 9.0).abs() < 1e-9);

    let broken = MediaMetadata { width: 1920, height: 0, duration: 10.0, frame_rate: 30.0 };
    assert_eq!(broken.aspect_ratio(), 0.0);
}

#[test]
fn test_encoder_settings_pts() {
    let settings = EncoderSettings {
        size: SurfaceSize { width: 640, height: 360 },
        capture_fps: 30,
        bitrate: 500_000,
        time_scale: 2.0,
    };
    assert_eq!(settings.frame_pts_ms(0), 0);
    assert_eq!(settings.frame_pts_ms(30), 2000);
    assert_eq!(settings.nominal_fps(), 15.0);
}

#[test]
fn test_codec_preference_extension() {
    let prefs = CodecPreference::default_preferences();
    assert_eq!(prefs[0].codec, "libvpx-vp9");
    assert_eq!(prefs[0].extension(), "webm");
    assert_eq!(CodecPreference::new("libx264", "matroska", "video/x-matroska").extension(), "mkv");
}

#[test]
fn test_analysis_report_from_json() {
    let json = r#"{
        "title": "Match day",
        "summary": "**Great** game",
        "highlights": [
            {"title": "Goal", "startTime": 12.0, "endTime": 18.5,
             "description": "Header", "reasoning": "Decisive"}
        ]
    }"#;
    let report = AnalysisReport::from_json(json).unwrap();
    assert_eq!(report.title, "Match day");
    assert_eq!(report.highlights.len(), 1);
    assert_eq!(report.highlights[0].end_time, 18.5);
}
