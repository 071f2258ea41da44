//! geodic-util – entry point.
//!
//! Startup order:
//! 1. Parse the command line and layer its flags over the environment
//!    configuration.
//! 2. Initialise tracing (JSON when `GEODIC_LOG_JSON` is set).
//! 3. Run the command on a single-threaded runtime.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use geodic_repo::RepoConfig;
use tracing::debug;

use crate::cli::Cli;

fn main() -> ExitCode {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = cli.apply(RepoConfig::from_env());

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: GEODIC_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "geodic-util starting");

    // ── 3. Command ─────────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::execute(cli, cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
