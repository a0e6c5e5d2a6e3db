//! Test utilities for pkgswap
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] for tracing output in tests
//! - [`InstallFixture`], a throwaway install directory with helper and packages
//! - [`ScriptedTransport`], a [`Transport`](crate::upgrade::Transport) with canned answers
//! - [`RecordingSpawner`], a [`ProcessSpawner`](crate::upgrade::ProcessSpawner) that
//!   records launches instead of performing them
//!
//! # Example
//!
//! ```rust,no_run
//! use pkgswap::test_utils::{InstallFixture, ScriptedTransport};
//! use pkgswap::upgrade::Updater;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fixture = InstallFixture::new()?;
//! fixture.write_installed(b"v1")?;
//!
//! let transport = ScriptedTransport::new()
//!     .respond_with(r#"{"latestVersion":"1.2.0","sourceURL":"https://host/pkg"}"#)
//!     .serve_package(b"v2".to_vec());
//! let updater = Updater::with_transport(fixture.config("https://host/check"), transport)?;
//! # Ok(())
//! # }
//! ```

mod doubles;
mod fixtures;

pub use doubles::{RecordingSpawner, ScriptedTransport};
pub use fixtures::InstallFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, tests run silently.
///
/// ```bash
/// RUST_LOG=pkgswap=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_ansi(true)
            .try_init();
    });
}
