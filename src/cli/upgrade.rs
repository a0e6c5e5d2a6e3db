use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

use crate::config::UpdaterConfig;
use crate::upgrade::Updater;

use super::resolve_current_version;

/// Arguments for `pkgswap upgrade`.
///
/// Checks the endpoint and, when an update is offered, downloads it and
/// swaps it into place. If the installed package is locked (the application
/// is still running on Windows) the swap is finished by `pkgswap replace`
/// once the application has exited.
///
/// # Examples
///
/// ```bash
/// pkgswap upgrade --current-version 1.0.0
/// pkgswap --verbose upgrade
/// ```
#[derive(Args, Debug)]
pub struct UpgradeCommand {
    /// Version of the installed package.
    ///
    /// Defaults to the `version` field of the configured `version_file`.
    #[arg(long, value_name = "VERSION")]
    current_version: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

impl UpgradeCommand {
    pub async fn execute(self, config: UpdaterConfig, quiet: bool) -> Result<()> {
        let current = resolve_current_version(self.current_version, &config).await?;
        let updater = Updater::initialize(config)?;
        let show = !quiet && !self.json;

        if show {
            println!("{}", "Checking for updates...".cyan());
        }

        let attempt = match updater.check(current.as_deref()).await {
            Ok(attempt) => attempt,
            Err(e) if e.is_up_to_date() => {
                if self.json {
                    println!("{}", serde_json::json!({ "up_to_date": true, "message": e.to_string() }));
                } else if !quiet {
                    println!("{} ({})", "Already up to date".green(), e);
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if show {
            println!(
                "Downloading {} from {}",
                attempt.manifest().latest_version().unwrap_or("?").cyan(),
                attempt.manifest().source_url().unwrap_or("?")
            );
        }

        let applied = attempt.download().await?;
        debug!("Evict {}, promote {}", applied.report.evict, applied.report.promote);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&applied)?);
        } else if applied.report.needs_platform_replace() {
            if !quiet {
                println!("{}", "Update downloaded; the installed package is in use.".yellow());
                println!("Run `pkgswap replace` after the application exits to finish the upgrade");
            }
        } else if !quiet {
            println!(
                "{} {}",
                "Upgraded to".green().bold(),
                applied.manifest.latest_version().unwrap_or("?").green()
            );
        }

        Ok(())
    }
}
