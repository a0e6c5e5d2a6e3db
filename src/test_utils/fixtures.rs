//! Install directory fixture

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::config::UpdaterConfig;
use crate::upgrade::InstallLayout;

/// A temporary application install.
///
/// ```text
/// <temp>/<name>/updater[.exe]
/// <temp>/<name>/resources/
/// ```
///
/// The helper is created up front; packages are written on demand.
pub struct InstallFixture {
    _temp: TempDir,
    layout: InstallLayout,
}

impl InstallFixture {
    /// Fixture rooted at `<temp>/app`.
    pub fn new() -> Result<Self> {
        Self::named("app")
    }

    /// Fixture rooted at `<temp>/<name>`; `name` may contain spaces.
    pub fn named(name: &str) -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        let resources = temp.path().join(name).join("resources");
        fs::create_dir_all(&resources)
            .with_context(|| format!("Failed to create {}", resources.display()))?;

        let layout = InstallLayout::new(&resources, "asar");
        fs::write(layout.helper(), b"#!helper").context("Failed to write helper")?;

        Ok(Self {
            _temp: temp,
            layout,
        })
    }

    /// File locations of this install.
    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// The `resources` directory.
    pub fn install_dir(&self) -> &Path {
        self.layout.install_dir()
    }

    /// Configuration pointing at this install and `endpoint`.
    pub fn config(&self, endpoint: &str) -> UpdaterConfig {
        UpdaterConfig::new(endpoint, self.install_dir())
    }

    /// Write the installed package.
    pub fn write_installed(&self, bytes: &[u8]) -> Result<()> {
        fs::write(self.layout.installed_package(), bytes).context("Failed to write installed package")
    }

    /// Write a staged package, as if a download had finished.
    pub fn write_staged(&self, bytes: &[u8]) -> Result<()> {
        fs::write(self.layout.staged_package(), bytes).context("Failed to write staged package")
    }

    /// Contents of the installed package, if present.
    pub fn installed(&self) -> Option<Vec<u8>> {
        fs::read(self.layout.installed_package()).ok()
    }

    /// Whether a staged package exists.
    pub fn has_staged(&self) -> bool {
        self.layout.staged_package().exists()
    }
}
