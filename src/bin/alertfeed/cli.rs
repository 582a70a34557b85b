use std::path::PathBuf;

use clap::{ArgAction, Parser};
use url::Url;

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(author, version, about = "Live alert dashboard for edge monitoring", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend base URL (e.g. "http://localhost:8000").
    #[arg(long, value_name = "URL", value_parser = Url::parse)]
    pub api_base: Option<Url>,

    /// Streaming endpoint; derived from the API base when omitted.
    #[arg(long, value_name = "URL", value_parser = Url::parse)]
    pub ws_url: Option<Url>,

    /// Poll the latest sensor reading.
    #[arg(long, action = ArgAction::SetTrue)]
    pub sensor: bool,

    /// Number of alerts requested for the initial history.
    #[arg(long, value_name = "N")]
    pub history_limit: Option<u32>,

    /// Log toasts instead of showing desktop notifications.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// JSON log lines (needs `--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Explicit log filter (e.g. "alertfeed=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Print the history and reports once, without connecting the feed.
    #[arg(long, action = ArgAction::SetTrue)]
    pub once: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
