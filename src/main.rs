//! reelcut CLI
//!
//! Compresses videos and extracts clips by live re-encoding.
//!
//! # Usage
//!
//! ```bash
//! reelcut compress --in holiday.mov
//! reelcut extract --in match.mp4 --start 01:05 --end 01:20.5
//! reelcut highlights --in match.mp4 --report analysis.json
//! reelcut inspect --in match.mp4 --json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use reelcut::app::{AppContainer, DefaultAppContainer};
use reelcut::cli::{commands, Cli};
use reelcut::config_initialization::resolve_config;
use reelcut::utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format);

    info!("Starting reelcut {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&cli, |key| std::env::var(key).ok())
        .context("Failed to load configuration")?;
    let container = DefaultAppContainer::new(config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let pipeline = container.pipeline().with_cancellation(cancel);
    commands::run(cli.command, &pipeline, cli.progress).await?;

    info!("reelcut completed successfully");
    Ok(())
}
