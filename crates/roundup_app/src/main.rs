mod app;
mod cli;
mod persistence;
mod render;

use anyhow::Result;
use clap::Parser;
use roundup_logging::{roundup_info, LogDestination};

use crate::app::App;
use crate::cli::Cli;

const LOG_FILENAME: &str = "roundup.log";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    let destination = if cli.verbose > 0 {
        LogDestination::Both
    } else {
        LogDestination::File
    };
    roundup_logging::initialize(
        destination,
        config.log_level,
        &config.state_dir.join(LOG_FILENAME),
    );
    roundup_info!(
        "roundup {} against {}",
        env!("CARGO_PKG_VERSION"),
        config.client.base_url
    );

    App::new(config)?.execute(cli.command).await
}
