use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::ClientConfig;
use crate::poll::PollPolicy;

#[derive(Parser)]
#[command(name = "slash-console")]
#[command(version = "0.3.0")]
#[command(about = "Terminal polling clients for the slash log service and the grid game demo")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the demo API server (overrides config and environment)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the poll cadence in milliseconds
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Run a single poll tick and exit
    #[arg(long, global = true)]
    pub once: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch the app list
    Apps,
    /// Watch the device list of one app
    Devices { app_id: String },
    /// Tail the logs of one device
    Logs { app_id: String, device_id: String },
    /// Watch the grid game
    Game,
    /// Submit a move for the given turn
    Move { turn_no: u64, position: String },
    /// Open a page-style route (e.g. logs.html?app_id=a&device_id=d)
    Open { url: String },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// The fixed-rate policy for a list loop, with the `--interval-ms` override
/// applied when present.
pub fn resolve_list_policy(config: &ClientConfig, override_ms: Option<u64>) -> PollPolicy {
    match override_ms {
        Some(ms) => PollPolicy::FixedRate {
            every: Duration::from_millis(ms),
        },
        None => config.list_policy(),
    }
}

/// The adaptive policy for a tail/game loop. `--interval-ms` overrides the
/// success re-poll delay; the failure backoff keeps its configured value.
pub fn resolve_adaptive_policy(config: &ClientConfig, override_ms: Option<u64>) -> PollPolicy {
    match (override_ms, config.adaptive_policy()) {
        (Some(ms), PollPolicy::Adaptive { failure, .. }) => PollPolicy::Adaptive {
            success: Duration::from_millis(ms),
            failure,
        },
        (_, policy) => policy,
    }
}
