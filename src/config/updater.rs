//! The updater configuration file.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable that overrides the default configuration path.
pub const CONFIG_PATH_ENV: &str = "PKGSWAP_CONFIG_PATH";

/// Default extension of the installed and staged package files.
pub const DEFAULT_PACKAGE_EXTENSION: &str = "asar";

/// Default name of the append-only diagnostic log, relative to the install directory.
pub const DEFAULT_LOG_FILE: &str = "updater-log.txt";

/// Form field carrying the current version in the version-check request.
const CURRENT_VERSION_FIELD: &str = "current";

/// Transport-level options passed through to every network call.
///
/// The update pipeline treats these as opaque with one exception: the
/// version check adds the `current` form field. Everything else the caller
/// put in [`data`](Self::data) is sent untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Extra HTTP headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Whole-request timeout in seconds. `None` keeps the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Form fields sent with the version-check request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl RequestOptions {
    /// Copy of these options with `current` set to `version`.
    ///
    /// Only the `current` field is written; caller-supplied fields survive.
    #[must_use]
    pub fn with_current_version(&self, version: &str) -> Self {
        let mut options = self.clone();
        options.data.insert(CURRENT_VERSION_FIELD.to_string(), version.to_string());
        options
    }

    /// The version previously set by [`with_current_version`](Self::with_current_version).
    #[must_use]
    pub fn current_version(&self) -> Option<&str> {
        self.data.get(CURRENT_VERSION_FIELD).map(String::as_str)
    }
}

/// Configuration for an [`Updater`](crate::upgrade::Updater).
///
/// Set once at initialization and immutable afterwards. Only `endpoint` and
/// `install_dir` are required; everything else has a default.
///
/// # Examples
///
/// ```rust,no_run
/// use pkgswap::config::UpdaterConfig;
///
/// let config = UpdaterConfig::new("https://updates.example.com/check", "/opt/app/resources");
/// assert_eq!(config.package_extension, "asar");
/// assert!(config.log_path().unwrap().ends_with("updater-log.txt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// URL of the version-check service.
    pub endpoint: String,

    /// Directory holding the installed package (`app.<ext>`).
    ///
    /// The staged download (`update.<ext>`) and the log file live here too.
    pub install_dir: PathBuf,

    /// Extension shared by the installed and staged package files.
    #[serde(default = "default_package_extension")]
    pub package_extension: String,

    /// Log file name relative to `install_dir`. An empty string disables it.
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Options passed through to the transport.
    #[serde(default)]
    pub request_options: RequestOptions,

    /// Helper executable used for post-exit replacement on Windows.
    ///
    /// Defaults to `updater[.exe]` in the parent of `install_dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_path: Option<PathBuf>,

    /// A `package.json`-style file whose `version` field is the current version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_file: Option<PathBuf>,
}

fn default_package_extension() -> String {
    DEFAULT_PACKAGE_EXTENSION.to_string()
}

fn default_log_file() -> String {
    DEFAULT_LOG_FILE.to_string()
}

impl UpdaterConfig {
    /// Create a configuration with defaults for everything but the two required fields.
    pub fn new(endpoint: impl Into<String>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            install_dir: install_dir.into(),
            package_extension: default_package_extension(),
            log_file: default_log_file(),
            request_options: RequestOptions::default(),
            helper_path: None,
            version_file: None,
        }
    }

    /// Load the configuration from an explicit path, or the default location.
    ///
    /// Unlike optional user settings, there is no usable default
    /// configuration, so a missing file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the default path cannot be determined, the file
    /// cannot be read, contains invalid TOML, or fails [`validate`](Self::validate).
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        Self::load_from(&path).await
    }

    /// Load and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails [`validate`](Self::validate).
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Default configuration file path.
    ///
    /// `PKGSWAP_CONFIG_PATH` wins when set; otherwise
    /// `%LOCALAPPDATA%\pkgswap\config.toml` on Windows and
    /// `~/.pkgswap/config.toml` elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("pkgswap")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".pkgswap")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Check the values that cannot be enforced by the type system.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is empty, or when the package extension is
    /// empty or would escape the install directory.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            bail!("Updater config must set a non-empty `endpoint`");
        }

        let ext = &self.package_extension;
        if ext.is_empty() || ext.contains(['/', '\\']) || ext.contains("..") {
            bail!("Invalid `package_extension` {ext:?}: expected a bare file extension such as \"asar\"");
        }

        Ok(())
    }

    /// Absolute path of the diagnostic log, or `None` when logging to file is disabled.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        (!self.log_file.trim().is_empty()).then(|| self.install_dir.join(&self.log_file))
    }
}

/// Read the `version` field of a `package.json`-style file.
///
/// Returns `Ok(None)` when the field is missing or empty, so the caller can
/// report [`UpdateError::VersionNotSpecified`](crate::core::UpdateError::VersionNotSpecified)
/// without a network round trip.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub async fn read_package_version(path: &Path) -> Result<Option<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read version file {}", path.display()))?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse version file {}", path.display()))?;

    Ok(value
        .get("version")
        .and_then(serde_json::Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string))
}
