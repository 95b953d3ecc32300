//! JSON-lines host transport for qpsess.
//!
//! `qpsess-host` reads one request per line on stdin, runs it through a
//! [`Bridge`] backed by Clarabel, and writes one reply per line on stdout.
//! Logs go to stderr so stdout stays a clean protocol channel.
//!
//! # Exit Codes
//!
//! - `0`: End of input reached
//! - `1`: Configuration error
//! - `2`: I/O error on stdin/stdout

pub mod cli;
pub mod config;
pub mod serve;

use std::io;

use anyhow::{Context, Result};
use qpsess_bridge::Bridge;
use qpsess_clarabel::ClarabelSolver;
use qpsess_common::{QpSolver, PROTOCOL_VERSION};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

pub use cli::Cli;
pub use config::HostConfig;
pub use serve::{handle_line, serve, ServeStats};

/// Process exit codes of `qpsess-host`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Input closed normally.
    Success = 0,
    /// Config file unreadable or invalid.
    Config = 1,
    /// Reading requests or writing replies failed.
    Io = 2,
}

/// Resolves the effective configuration: file first, then CLI overrides.
pub fn load_config(cli: &Cli) -> Result<HostConfig> {
    let mut config = match &cli.config {
        Some(path) => HostConfig::load_from(path)?,
        None => HostConfig::load().context("Failed to load ~/.qpsess/config.toml")?,
    };
    if let Some(level) = cli.log_level {
        config.log_level = level.to_string().to_lowercase();
    }
    if let Some(max) = cli.max_sessions {
        config.max_sessions = max;
    }
    config.level()?;
    Ok(config)
}

fn init_tracing(level: Level) {
    // Logs go to stderr; `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();
}

/// Runs the host on stdin/stdout until end of input.
pub fn run(cli: Cli) -> ExitCode {
    let config = load_config(&cli);
    let level = config
        .as_ref()
        .ok()
        .and_then(|c| c.level().ok())
        .or(cli.log_level)
        .unwrap_or(Level::INFO);
    init_tracing(level);

    info!(
        "qpsess-host v{} (protocol v{})",
        env!("CARGO_PKG_VERSION"),
        PROTOCOL_VERSION
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:?}", e);
            return ExitCode::Config;
        }
    };

    let solver = ClarabelSolver::with_options(config.solver.clone());
    let mut bridge = Bridge::with_options(solver, config.bridge_options());
    info!("Solver backend: {}", bridge.solver().name());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = serve(&mut bridge, stdin.lock(), stdout.lock());

    let live = bridge.shutdown();
    if live > 0 {
        warn!("Released {} session(s) still live at exit", live);
    }

    match result {
        Ok(stats) => {
            info!(
                requests = stats.requests,
                errors = stats.errors,
                "Input closed"
            );
            ExitCode::Success
        }
        Err(e) => {
            error!("Transport error: {:?}", e);
            ExitCode::Io
        }
    }
}
