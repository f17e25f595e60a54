// TOML config adapter - Pipeline configuration from files and environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::CodecPreference;
use crate::error::{ReelcutError, ReelcutResult};

/// Compressor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressConfig {
    /// Assets smaller than this are returned unchanged
    pub size_threshold_bytes: u64,
    pub target_height: u32,
    pub playback_rate: f64,
    pub capture_fps: u32,
    pub bitrate: u64,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: 20 * 1024 * 1024,
            target_height: 360,
            playback_rate: 2.0,
            capture_fps: 30,
            bitrate: 500_000,
        }
    }
}

/// Clip extractor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub max_height: u32,
    pub capture_fps: u32,
    pub bitrate: u64,
    /// Wait between seek completion and encoder start
    pub seek_settle_ms: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_height: 1080,
            capture_fps: 30,
            bitrate: 5_000_000,
            seek_settle_ms: 300,
        }
    }
}

impl ExtractConfig {
    pub fn seek_settle(&self) -> Duration {
        Duration::from_millis(self.seek_settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Tried in order until one can be constructed
    pub preferences: Vec<CodecPreference>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            preferences: CodecPreference::default_preferences(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Rendering ticks per second
    pub refresh_hz: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { refresh_hz: 60 }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub compress: CompressConfig,
    pub extract: ExtractConfig,
    pub encoder: EncoderConfig,
    pub playback: PlaybackConfig,
}

impl PipelineConfig {
    /// Reject values no run could succeed with
    pub fn validate(&self) -> ReelcutResult<()> {
        let rate = self.compress.playback_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ReelcutError::config(format!(
                "compress.playback_rate must be positive, got {}",
                rate
            )));
        }
        if self.compress.target_height == 0 {
            return Err(ReelcutError::config("compress.target_height must be positive"));
        }
        if self.extract.max_height == 0 {
            return Err(ReelcutError::config("extract.max_height must be positive"));
        }
        if self.compress.capture_fps == 0 || self.extract.capture_fps == 0 {
            return Err(ReelcutError::config("capture_fps must be positive"));
        }
        if self.playback.refresh_hz == 0 {
            return Err(ReelcutError::config("playback.refresh_hz must be positive"));
        }
        if self.encoder.preferences.is_empty() {
            return Err(ReelcutError::config(
                "encoder.preferences must list at least one codec",
            ));
        }
        Ok(())
    }
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Parse a TOML document; missing keys fall back to defaults
    pub fn parse(content: &str) -> ReelcutResult<PipelineConfig> {
        toml::from_str(content)
            .map_err(|e| ReelcutError::config(format!("Failed to parse TOML config: {}", e)))
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> ReelcutResult<PipelineConfig> {
        if !path.exists() {
            return Err(ReelcutError::config(format!(
                "Config file does not exist: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelcutError::config(format!("Failed to read config file: {}", e)))?;
        let config = Self::parse(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// File picked up when `--config` is not given
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("reelcut.toml")
    }

    /// Overlay `REELCUT_*` variables read through `lookup`
    pub fn apply_env<F>(config: &mut PipelineConfig, lookup: F) -> ReelcutResult<usize>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;
        let mut take = |key: &str| {
            let value = lookup(key);
            if let Some(v) = &value {
                debug!("Environment override: {} = {}", key, v);
                applied += 1;
            }
            value
        };

        if let Some(v) = take("REELCUT_SIZE_THRESHOLD_BYTES") {
            config.compress.size_threshold_bytes = parse_env("REELCUT_SIZE_THRESHOLD_BYTES", &v)?;
        }
        if let Some(v) = take("REELCUT_TARGET_HEIGHT") {
            config.compress.target_height = parse_env("REELCUT_TARGET_HEIGHT", &v)?;
        }
        if let Some(v) = take("REELCUT_PLAYBACK_RATE") {
            config.compress.playback_rate = parse_env("REELCUT_PLAYBACK_RATE", &v)?;
        }
        if let Some(v) = take("REELCUT_COMPRESS_BITRATE") {
            config.compress.bitrate = parse_env("REELCUT_COMPRESS_BITRATE", &v)?;
        }
        if let Some(v) = take("REELCUT_MAX_HEIGHT") {
            config.extract.max_height = parse_env("REELCUT_MAX_HEIGHT", &v)?;
        }
        if let Some(v) = take("REELCUT_EXTRACT_BITRATE") {
            config.extract.bitrate = parse_env("REELCUT_EXTRACT_BITRATE", &v)?;
        }
        if let Some(v) = take("REELCUT_SEEK_SETTLE_MS") {
            config.extract.seek_settle_ms = parse_env("REELCUT_SEEK_SETTLE_MS", &v)?;
        }
        if let Some(v) = take("REELCUT_CAPTURE_FPS") {
            let fps = parse_env("REELCUT_CAPTURE_FPS", &v)?;
            config.compress.capture_fps = fps;
            config.extract.capture_fps = fps;
        }
        if let Some(v) = take("REELCUT_REFRESH_HZ") {
            config.playback.refresh_hz = parse_env("REELCUT_REFRESH_HZ", &v)?;
        }
        if let Some(v) = take("REELCUT_CODECS") {
            config.encoder.preferences = parse_codec_list(&v)?;
        }

        Ok(applied)
    }

    /// Serialize config to a TOML string
    pub fn to_toml_string(config: &PipelineConfig) -> ReelcutResult<String> {
        toml::to_string_pretty(config)
            .map_err(|e| ReelcutError::config(format!("Failed to serialize config: {}", e)))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ReelcutResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ReelcutError::config(format!("{} has invalid value '{}'", key, value)))
}

/// `codec:container[:mime]` entries separated by commas
pub fn parse_codec_list(value: &str) -> ReelcutResult<Vec<CodecPreference>> {
    let mut preferences = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.splitn(3, ':').collect();
        let preference = match parts.as_slice() {
            [codec, container] => {
                let mime = default_mime(container);
                CodecPreference::new(codec, container, &mime)
            }
            [codec, container, mime] => CodecPreference::new(codec, container, mime),
            _ => {
                return Err(ReelcutError::config(format!(
                    "codec entry '{}' must be codec:container[:mime]",
                    entry
                )))
            }
        };
        preferences.push(preference);
    }
    if preferences.is_empty() {
        return Err(ReelcutError::config("codec list is empty"));
    }
    Ok(preferences)
}

fn default_mime(container: &str) -> String {
    match container {
        "matroska" | "mkv" => "video/x-matroska".to_string(),
        "mov" => "video/quicktime".to_string(),
        other => format!("video/{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TomlConfigAdapter::parse(
            r#"
            [compress]
            target_height = 240

            [playback]
            refresh_hz = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.compress.target_height, 240);
        assert_eq!(config.compress.playback_rate, 2.0);
        assert_eq!(config.playback.refresh_hz, 30);
        assert_eq!(config.encoder.preferences.len(), 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_codec_table_in_file() {
        let config = TomlConfigAdapter::parse(
            r#"
            [[encoder.preferences]]
            codec = "libx264"
            container = "mp4"
            mime_type = "video/mp4"
            "#,
        )
        .unwrap();
        assert_eq!(config.encoder.preferences, vec![CodecPreference::new("libx264", "mp4", "video/mp4")]);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REELCUT_PLAYBACK_RATE", "4"),
            ("REELCUT_CAPTURE_FPS", "24"),
            ("REELCUT_CODECS", "libvpx:webm, libx264:mp4:video/mp4"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        let applied =
            TomlConfigAdapter::apply_env(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(applied, 3);
        assert_eq!(config.compress.playback_rate, 4.0);
        assert_eq!(config.extract.capture_fps, 24);
        assert_eq!(config.encoder.preferences[0].mime_type, "video/webm");
        assert_eq!(config.encoder.preferences[1].codec, "libx264");
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = PipelineConfig::default();
        let err = TomlConfigAdapter::apply_env(&mut config, |k| {
            (k == "REELCUT_TARGET_HEIGHT").then(|| "tall".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("REELCUT_TARGET_HEIGHT"));
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig::default();
        config.compress.playback_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.encoder.preferences.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.extract.max_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = TomlConfigAdapter::to_toml_string(&PipelineConfig::default()).unwrap();
        assert!(text.contains("[compress]"));
        assert_eq!(TomlConfigAdapter::parse(&text).unwrap(), PipelineConfig::default());
    }
}
