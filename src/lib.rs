//! pkgswap - self-update orchestrator for installed application packages
//!
//! pkgswap keeps a locally installed application package (for example an
//! Electron `app.asar`) up to date. It asks a version-check endpoint whether
//! a newer package exists, downloads it next to the installed one, and swaps
//! it into place, including a post-exit fallback for platforms where the
//! running application keeps its own package locked.
//!
//! # Architecture Overview
//!
//! ```text
//! check ──> download ──> apply (Evict, Promote) ──> [host exits] ──> platform replace
//! ```
//!
//! - Each stage is triggered explicitly by the host; nothing is scheduled.
//! - Each stage reports completion exactly once, through its return value
//!   and the host's completion callback.
//! - Per-attempt state lives in an [`upgrade::UpdateAttempt`]; only one
//!   attempt can be alive at a time.
//!
//! # Core Modules
//!
//! - [`upgrade`] - the update pipeline and the [`upgrade::Updater`] entry point
//! - [`core`] - [`core::UpdateError`], error kinds and user-facing error context
//! - [`config`] - [`config::UpdaterConfig`] and its TOML file
//! - [`logging`] - stderr and append-only file diagnostics
//! - [`cli`] - the `pkgswap` command-line interface
//!
//! # Embedding
//!
//! ```rust,no_run
//! use pkgswap::config::UpdaterConfig;
//! use pkgswap::upgrade::{SystemSpawner, Updater};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::new("https://updates.example.com/check", "/opt/example/resources");
//! let updater = Updater::initialize(config)?;
//! updater.init_log_sink()?;
//!
//! let mut replace_after_exit = false;
//! match updater.check(Some("1.0.0")).await {
//!     Ok(attempt) => {
//!         let applied = attempt.download().await?;
//!         replace_after_exit = applied.report.needs_platform_replace();
//!     }
//!     Err(e) if e.is_up_to_date() => {}
//!     Err(e) => eprintln!("update failed: {e}"),
//! }
//!
//! // ... application shuts down ...
//! if replace_after_exit {
//!     updater.apply_platform_replace(&SystemSpawner);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Files
//!
//! All files live in the configured install directory:
//!
//! | File | Role |
//! |------|------|
//! | `app.<ext>` | installed package |
//! | `update.<ext>` | staged download |
//! | `updater-log.txt` | append-only diagnostics |
//!
//! The `updater` helper executable sits one directory up by default.

pub mod cli;
pub mod config;
pub mod core;
pub mod logging;
pub mod upgrade;

// test_utils is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
