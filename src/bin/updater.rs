//! Post-exit replacement helper.
//!
//! Spawned detached by `pkgswap replace` (or an embedding host) on Windows:
//!
//! ```text
//! updater <staged> <installed>
//! ```
//!
//! Waits for the installed package to be released by the exiting
//! application, then moves the staged package over it. Diagnostics are
//! appended to `updater-log.txt` next to the installed package, or to
//! `--log-file` when given; nobody is watching this process's console.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use pkgswap::config::DEFAULT_LOG_FILE;
use pkgswap::logging::init_logging;
use pkgswap::upgrade::{RetryPolicy, finish_replacement};

/// Replace an installed package with a staged one once it is unlocked.
#[derive(Parser, Debug)]
#[command(name = "updater", version, about, long_about = None)]
struct Args {
    /// Downloaded package to move into place
    staged: PathBuf,

    /// Installed package to replace
    installed: PathBuf,

    /// Attempts before giving up
    #[arg(long, default_value_t = RetryPolicy::default().attempts)]
    attempts: u32,

    /// Pause between attempts, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Log file to append to [default: updater-log.txt next to <INSTALLED>]
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .or_else(|| args.installed.parent().map(|dir| dir.join(DEFAULT_LOG_FILE)));
    init_logging(None, log_file.as_deref()).context("Failed to initialise logging")?;

    info!("Replacing {} with {}", args.installed.display(), args.staged.display());
    let policy = RetryPolicy {
        attempts: args.attempts,
        delay: Duration::from_millis(args.delay_ms),
    };

    match finish_replacement(&args.staged, &args.installed, policy).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
