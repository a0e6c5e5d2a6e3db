//! Diagnostic logging setup.
//!
//! Two sinks, both driven by `tracing`:
//! - stderr, at the level chosen on the command line (or `RUST_LOG`)
//! - the append-only log file next to the installed package, always at
//!   `info`, without ANSI colours
//!
//! The file sink is what survives after the host has exited, so it is kept
//! even when the console is quiet.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing::{Subscriber, warn};
use tracing_subscriber::filter::Filtered;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Level used for the log file.
pub const FILE_LOG_LEVEL: &str = "info";

/// Install the global subscriber.
///
/// `level` is an `EnvFilter` directive for stderr (`"debug"`, `"pkgswap=trace"`);
/// `RUST_LOG` overrides it when set, and with neither stderr stays silent.
/// A log file that cannot be opened is reported on stderr and skipped.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let stderr_filter = match std::env::var("RUST_LOG") {
        Ok(_) => Some(EnvFilter::from_default_env()),
        Err(_) => level.map(EnvFilter::new),
    };
    let console = stderr_filter.is_some();
    let stderr_layer = stderr_filter.map(|filter| {
        fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(filter)
    });

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match file_layer(path) {
        Ok(layer) => Some(layer),
        Err(e) => {
            file_error = Some(e);
            None
        }
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;

    if let Some(e) = file_error {
        if console {
            warn!("File logging disabled: {:#}", e);
        } else {
            // No console layer to carry the warning
            eprintln!("warning: file logging disabled: {e:#}");
        }
    }
    Ok(())
}

/// Subscriber that only writes to the log file at `path`.
///
/// For hosts that install or scope their own subscriber instead of
/// calling [`init_logging`].
///
/// # Errors
///
/// Returns an error if the log file cannot be opened for appending.
pub fn file_subscriber(path: &Path) -> Result<impl Subscriber + Send + Sync + 'static + use<>> {
    Ok(tracing_subscriber::registry().with(file_layer(path)?))
}

type FileLayer<S> =
    Filtered<fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, Mutex<File>>, EnvFilter, S>;

fn file_layer<S>(path: &Path) -> Result<FileLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = open_log_file(path)?;
    Ok(fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new(FILE_LOG_LEVEL)))
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
