use std::path::{Path, PathBuf};

use crate::config::UpdaterConfig;

/// Base name of the installed package file.
pub const INSTALLED_STEM: &str = "app";

/// Base name of the staged (downloaded) package file.
pub const STAGED_STEM: &str = "update";

/// Base name of the helper executable spawned for post-exit replacement.
pub const HELPER_STEM: &str = "updater";

/// Fixed on-disk locations used by an update.
///
/// Everything lives next to the installed package so that staging never
/// touches the package being replaced:
///
/// ```text
/// <root>/updater[.exe]            helper (default location)
/// <root>/resources/app.asar       installed package
/// <root>/resources/update.asar    staged download
/// <root>/resources/updater-log.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    install_dir: PathBuf,
    extension: String,
    helper: PathBuf,
}

impl InstallLayout {
    /// Layout rooted at `install_dir` with the given package extension.
    pub fn new(install_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let install_dir = install_dir.into();
        let helper = default_helper_path(&install_dir);
        Self {
            install_dir,
            extension: extension.into(),
            helper,
        }
    }

    /// Layout described by a configuration.
    #[must_use]
    pub fn from_config(config: &UpdaterConfig) -> Self {
        let layout = Self::new(&config.install_dir, &config.package_extension);
        match &config.helper_path {
            Some(helper) => layout.with_helper(helper),
            None => layout,
        }
    }

    /// Override the helper executable location.
    #[must_use]
    pub fn with_helper(mut self, helper: impl Into<PathBuf>) -> Self {
        self.helper = helper.into();
        self
    }

    /// Directory holding the installed and staged packages.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// `<install_dir>/app.<ext>`
    #[must_use]
    pub fn installed_package(&self) -> PathBuf {
        self.install_dir.join(format!("{INSTALLED_STEM}.{}", self.extension))
    }

    /// `<install_dir>/update.<ext>`
    #[must_use]
    pub fn staged_package(&self) -> PathBuf {
        self.install_dir.join(format!("{STAGED_STEM}.{}", self.extension))
    }

    /// The helper executable.
    #[must_use]
    pub fn helper(&self) -> &Path {
        &self.helper
    }
}

fn default_helper_path(install_dir: &Path) -> PathBuf {
    let root = install_dir.parent().unwrap_or(install_dir);
    root.join(format!("{HELPER_STEM}{}", std::env::consts::EXE_SUFFIX))
}
