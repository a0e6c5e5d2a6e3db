use std::fmt;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::core::UpdateError;
use crate::upgrade::layout::InstallLayout;
use crate::upgrade::manifest::UpdateManifest;

/// Result of one filesystem step once it actually ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The operation succeeded.
    Completed,
    /// The operation ran and the OS refused it.
    Failed {
        /// OS error description
        reason: String,
    },
}

impl StepOutcome {
    /// Whether the step succeeded.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    fn from_io(result: std::io::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed {
                reason,
            } => write!(f, "failed ({reason})"),
        }
    }
}

/// Completion status of Evict and Promote.
///
/// Failures here are not errors: a locked package is expected on some
/// platforms and is finished later by the platform replace step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Removing the installed package
    pub evict: StepOutcome,
    /// Renaming the staged package over the installed one
    pub promote: StepOutcome,
}

impl ApplyReport {
    /// Whether the staged package is still waiting to be moved into place.
    ///
    /// When `true` the host must run the platform replace after it exits.
    #[must_use]
    pub const fn needs_platform_replace(&self) -> bool {
        !self.promote.is_completed()
    }
}

/// Swaps the staged package into the installed location.
///
/// Two steps run in order, each awaited to completion:
///
/// 1. **Evict**: delete `app.<ext>`
/// 2. **Promote**: rename `update.<ext>` to `app.<ext>`
///
/// A failing Evict never stops Promote. Problems that prevent either step
/// from being attempted at all surface as [`UpdateError::FailedToApplyUpdate`].
pub struct PackageInstaller<'a> {
    layout: &'a InstallLayout,
}

impl<'a> PackageInstaller<'a> {
    /// Create an installer for `layout`.
    pub const fn new(layout: &'a InstallLayout) -> Self {
        Self {
            layout,
        }
    }

    /// Run Evict then Promote for the package recorded in `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::FailedToApplyUpdate`] without touching the
    /// filesystem when no download is recorded, when the staged and installed
    /// paths coincide, or when the install directory does not exist.
    pub async fn apply(&self, manifest: &UpdateManifest) -> Result<ApplyReport, UpdateError> {
        let staged = manifest.local_file_path().ok_or_else(|| UpdateError::FailedToApplyUpdate {
            reason: "no downloaded package recorded".to_string(),
        })?;
        let installed = self.layout.installed_package();

        if staged == installed {
            return Err(UpdateError::FailedToApplyUpdate {
                reason: format!("staged package is the installed package ({})", installed.display()),
            });
        }

        if !fs::metadata(self.layout.install_dir()).await.is_ok_and(|m| m.is_dir()) {
            return Err(UpdateError::FailedToApplyUpdate {
                reason: format!(
                    "install directory {} does not exist",
                    self.layout.install_dir().display()
                ),
            });
        }

        debug!("Evicting {}", installed.display());
        let evict = StepOutcome::from_io(fs::remove_file(&installed).await);
        match &evict {
            StepOutcome::Completed => info!("Removed {}", installed.display()),
            StepOutcome::Failed {
                reason,
            } => warn!("Could not remove {}: {}", installed.display(), reason),
        }

        debug!("Promoting {} -> {}", staged.display(), installed.display());
        let promote = StepOutcome::from_io(fs::rename(staged, &installed).await);
        match &promote {
            StepOutcome::Completed => info!("Installed update at {}", installed.display()),
            StepOutcome::Failed {
                reason,
            } => warn!(
                "Could not move {} to {}: {}; it will be replaced after exit",
                staged.display(),
                installed.display(),
                reason
            ),
        }

        Ok(ApplyReport {
            evict,
            promote,
        })
    }
}
