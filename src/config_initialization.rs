//! Configuration initialization and hierarchy management

use tracing::info;

use crate::adapters::toml_config::{parse_codec_list, PipelineConfig, TomlConfigAdapter};
use crate::cli::{Cli, Commands};
use crate::error::ReelcutResult;

/// Resolve the effective configuration: CLI > Env > File > Defaults.
///
/// `env` looks up environment variables; pass `|k| std::env::var(k).ok()`
/// for the process environment.
pub fn resolve_config<F>(cli: &Cli, env: F) -> ReelcutResult<PipelineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // Step 1 and 2: defaults, then the file if there is one
    let mut config = load_config_file(cli)?;

    // Step 3: environment variables
    let env_overrides = TomlConfigAdapter::apply_env(&mut config, env)?;
    if env_overrides > 0 {
        info!("Applied {} environment variable overrides", env_overrides);
    }

    // Step 4: CLI arguments
    let cli_overrides = apply_cli_overrides(&mut config, &cli.command)?;
    if cli_overrides > 0 {
        info!("Applied {} CLI configuration overrides", cli_overrides);
    }

    config.validate()?;
    Ok(config)
}

/// An explicit `--config` must exist; the default file is optional
fn load_config_file(cli: &Cli) -> ReelcutResult<PipelineConfig> {
    if let Some(path) = &cli.config {
        return TomlConfigAdapter::load(path);
    }
    let default_path = TomlConfigAdapter::default_config_path();
    if default_path.exists() {
        TomlConfigAdapter::load(&default_path)
    } else {
        Ok(PipelineConfig::default())
    }
}

fn apply_cli_overrides(config: &mut PipelineConfig, command: &Commands) -> ReelcutResult<usize> {
    let mut overrides = 0;

    match command {
        Commands::Compress(args) => {
            if let Some(height) = args.target_height {
                config.compress.target_height = height;
            }
            overrides += usize::from(args.target_height.is_some());
            if let Some(rate) = args.playback_rate {
                config.compress.playback_rate = rate;
            }
            overrides += usize::from(args.playback_rate.is_some());
            if let Some(bitrate) = args.bitrate {
                config.compress.bitrate = bitrate;
            }
            overrides += usize::from(args.bitrate.is_some());
            if let Some(threshold) = args.threshold_bytes {
                config.compress.size_threshold_bytes = threshold;
            }
            overrides += usize::from(args.threshold_bytes.is_some());
            if let Some(codecs) = &args.codecs {
                config.encoder.preferences = parse_codec_list(codecs)?;
            }
            overrides += usize::from(args.codecs.is_some());
        }
        Commands::Extract(args) => {
            if let Some(height) = args.max_height {
                config.extract.max_height = height;
            }
            overrides += usize::from(args.max_height.is_some());
            if let Some(bitrate) = args.bitrate {
                config.extract.bitrate = bitrate;
            }
            overrides += usize::from(args.bitrate.is_some());
            if let Some(settle) = args.settle_ms {
                config.extract.seek_settle_ms = settle;
            }
            overrides += usize::from(args.settle_ms.is_some());
            if let Some(codecs) = &args.codecs {
                config.encoder.preferences = parse_codec_list(codecs)?;
            }
            overrides += usize::from(args.codecs.is_some());
        }
        Commands::Highlights(_) | Commands::Inspect(_) => {}
    }

    Ok(overrides)
}
