//! Configuration management for pkgswap
//!
//! pkgswap is configured once, at initialization, from a TOML file. The
//! configuration names the version-check endpoint, the directory holding the
//! installed package, and the transport options passed through to every
//! network call.
//!
//! # Configuration File Location
//!
//! - `--config <path>` on the command line, else
//! - the `PKGSWAP_CONFIG_PATH` environment variable, else
//! - Unix/macOS: `~/.pkgswap/config.toml`
//! - Windows: `%LOCALAPPDATA%\pkgswap\config.toml`
//!
//! # File Format
//!
//! ```toml
//! endpoint = "https://updates.example.com/check"
//! install_dir = "/opt/example/resources"
//! package_extension = "asar"        # app.asar / update.asar
//! log_file = "updater-log.txt"      # relative to install_dir, "" disables
//! version_file = "/opt/example/resources/app/package.json"
//!
//! [request_options]
//! timeout_secs = 30
//!
//! [request_options.headers]
//! Authorization = "Bearer abc123"
//!
//! [request_options.data]
//! channel = "stable"
//! ```

mod updater;

pub use updater::{
    CONFIG_PATH_ENV, DEFAULT_LOG_FILE, DEFAULT_PACKAGE_EXTENSION, RequestOptions, UpdaterConfig,
    read_package_version,
};
