use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::config::UpdaterConfig;
use crate::upgrade::Updater;

use super::resolve_current_version;

/// Arguments for `pkgswap check`.
///
/// # Examples
///
/// ```bash
/// pkgswap check --current-version 1.0.0
/// pkgswap check --json          # version read from version_file
/// ```
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Version of the installed package.
    ///
    /// Defaults to the `version` field of the configured `version_file`.
    #[arg(long, value_name = "VERSION")]
    current_version: Option<String>,

    /// Print the offered update as JSON.
    #[arg(long)]
    json: bool,
}

impl CheckCommand {
    pub async fn execute(self, config: UpdaterConfig, quiet: bool) -> Result<()> {
        let current = resolve_current_version(self.current_version, &config).await?;
        let updater = Updater::initialize(config)?;

        if !quiet && !self.json {
            println!("{}", "Checking for updates...".cyan());
        }

        match updater.check(current.as_deref()).await {
            Ok(attempt) => {
                let manifest = attempt.manifest();
                if self.json {
                    println!("{}", serde_json::to_string_pretty(manifest)?);
                } else if !quiet {
                    println!(
                        "{} {} -> {}",
                        "Update available:".green().bold(),
                        current.as_deref().unwrap_or("?"),
                        manifest.latest_version().unwrap_or("?").green()
                    );
                    println!("Run `pkgswap upgrade` to install it");
                }
                Ok(())
            }
            Err(e) if e.is_up_to_date() => {
                if self.json {
                    println!("{}", serde_json::json!({ "up_to_date": true, "message": e.to_string() }));
                } else if !quiet {
                    println!("{} ({})", "Already up to date".green(), e);
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
