use clap::Parser;
use std::path::PathBuf;

/// Serve qpsess commands as JSON lines on stdin/stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides the config file)
    #[arg(long)]
    pub log_level: Option<tracing::Level>,

    /// Read configuration from this file instead of ~/.qpsess/config.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cap on live sessions (overrides the config file; 0 = unlimited)
    #[arg(long)]
    pub max_sessions: Option<usize>,
}
