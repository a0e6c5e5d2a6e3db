//! Command-line interface for pkgswap.
//!
//! The CLI drives the update pipeline for an installed application from a
//! shell, a launcher script or an installer:
//!
//! - `check` - ask the endpoint whether a newer package exists
//! - `upgrade` - check, download and apply in one go
//! - `replace` - finish a replacement after the application has exited
//!
//! # Typical Launcher Flow
//!
//! ```bash
//! # While the application runs
//! pkgswap upgrade --current-version 1.0.0
//!
//! # After it exits, if upgrade said a replace is pending
//! pkgswap replace
//! ```
//!
//! # Global Options
//!
//! - `--verbose` - debug output on stderr
//! - `--quiet` - errors only
//! - `--config` - configuration file instead of the default location
//!
//! "Up to date" is a successful outcome and exits with status 0; every other
//! failure is printed with a suggestion and exits with status 1.

mod check;
mod replace;
mod upgrade;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{UpdaterConfig, read_package_version};

/// Runtime configuration for CLI execution.
///
/// Built from the global flags by [`Cli::build_config`], or by hand in tests
/// to run a command without touching the process environment.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Stderr log directive, `None` for quiet.
    pub log_level: Option<String>,
    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Configuration with no logging and the default config location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stderr log directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Use the configuration file at `path`.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}

/// Self-update orchestrator for locally installed application packages.
#[derive(Parser, Debug)]
#[command(name = "pkgswap", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (equivalent to `RUST_LOG=debug`).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file.
    ///
    /// Defaults to `PKGSWAP_CONFIG_PATH`, then `~/.pkgswap/config.toml`
    /// (`%LOCALAPPDATA%\pkgswap\config.toml` on Windows).
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a newer package is available.
    Check(check::CheckCommand),

    /// Download and install the newest package.
    Upgrade(upgrade::UpgradeCommand),

    /// Finish a pending replacement after the application has exited.
    Replace(replace::ReplaceCommand),
}

impl Cli {
    /// Run the parsed command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the
    /// command fails.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    ///
    /// `--verbose` logs at `debug`, `--quiet` disables console logging,
    /// and the default is `info`.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the command with an explicit [`CliConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the
    /// command fails.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let updater_config = UpdaterConfig::load_with_optional(config.config_path.clone()).await?;

        // An embedding process may already own the global subscriber
        if let Err(e) =
            crate::logging::init_logging(config.log_level.as_deref(), updater_config.log_path().as_deref())
        {
            debug!("{e}");
        }

        let quiet = self.quiet;
        match self.command {
            Commands::Check(cmd) => cmd.execute(updater_config, quiet).await,
            Commands::Upgrade(cmd) => cmd.execute(updater_config, quiet).await,
            Commands::Replace(cmd) => cmd.execute(updater_config, quiet).await,
        }
    }
}

/// The current version: `--current-version` if given, else the config's `version_file`.
///
/// A relative `version_file` is resolved against `install_dir`. `Ok(None)`
/// means no version is known; the check then fails with
/// `VersionNotSpecified` without contacting the endpoint.
pub(crate) async fn resolve_current_version(
    explicit: Option<String>,
    config: &UpdaterConfig,
) -> Result<Option<String>> {
    if let Some(version) = explicit {
        return Ok(Some(version));
    }

    let Some(version_file) = &config.version_file else {
        return Ok(None);
    };

    let path = resolve_in(&config.install_dir, version_file);
    debug!("Reading current version from {}", path.display());
    read_package_version(&path).await
}

fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
