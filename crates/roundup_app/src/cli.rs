use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roundup_engine::{ClientSettings, PollSettings};
use roundup_logging::LevelFilter;

#[derive(Parser)]
#[command(name = "roundup")]
#[command(author, version, about = "Trigger and track Reading Roundup pipeline runs")]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "ROUNDUP_API_BASE", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Password used to open a session before each backend call
    #[arg(long, global = true, env = "ROUNDUP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Directory for the durable rate-limit state and the log file
    #[arg(long, global = true, env = "ROUNDUP_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Seconds between status polls
    #[arg(long, global = true, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Log debug output to the terminal as well as the log file
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Trigger a run and follow it until it finishes
    Run {
        /// Comma-separated keywords (5-25); omit to use the backend defaults
        #[arg(short, long, default_value = "")]
        keywords: String,
        /// Save the artifact into this directory once the run succeeds
        #[arg(short, long)]
        download: Option<PathBuf>,
    },
    /// Show the local rate-limit gate and the remote run status
    Status,
    /// Show where the latest artifact can be fetched
    Artifact,
    /// Download the latest artifact
    Download {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Clear a stale "running" flag without starting a cooldown
    Clear,
}

pub(crate) struct AppConfig {
    pub client: ClientSettings,
    pub poll: PollSettings,
    pub password: Option<String>,
    pub state_dir: PathBuf,
    pub log_level: LevelFilter,
}

impl Cli {
    pub(crate) fn config(&self) -> Result<AppConfig> {
        let state_dir = match &self.state_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .context("no platform data directory; pass --state-dir")?
                .join("roundup"),
        };
        let log_level = match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        Ok(AppConfig {
            client: ClientSettings {
                base_url: self.base_url.clone(),
                ..ClientSettings::default()
            },
            poll: PollSettings {
                interval: Duration::from_secs(self.poll_interval),
            },
            password: self.password.clone().filter(|p| !p.is_empty()),
            state_dir,
            log_level,
        })
    }
}
