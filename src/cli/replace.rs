use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use crate::config::UpdaterConfig;
use crate::upgrade::{ReplaceOutcome, SystemSpawner, Updater};

/// Arguments for `pkgswap replace`.
///
/// Must run only after the application that owns the installed package has
/// exited. Does nothing when no update is staged.
///
/// # Examples
///
/// ```bash
/// pkgswap replace
/// ```
#[derive(Args, Debug)]
pub struct ReplaceCommand {}

impl ReplaceCommand {
    pub async fn execute(self, config: UpdaterConfig, quiet: bool) -> Result<()> {
        let updater = Updater::initialize(config)?;
        let outcome = updater.apply_platform_replace(&SystemSpawner);

        match &outcome {
            ReplaceOutcome::NothingStaged => {
                if !quiet {
                    println!("{}", "Nothing to replace".green());
                }
            }
            ReplaceOutcome::Spawned {
                ..
            }
            | ReplaceOutcome::Moved => {
                if !quiet {
                    println!("{}", outcome.to_string().green());
                }
            }
            ReplaceOutcome::SpawnFailed {
                ..
            }
            | ReplaceOutcome::MoveFailed {
                ..
            } => bail!("Platform replace failed: {outcome}"),
        }
        Ok(())
    }
}
