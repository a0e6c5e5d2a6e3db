//! Package update pipeline.
//!
//! An update replaces one file, the installed application package, with a
//! newer one published behind a version-check endpoint. The pipeline runs
//! in four stages, each triggered explicitly by the host:
//!
//! ```text
//! 1. Check      POST {current, ...data} to the endpoint
//!               └── {latestVersion, sourceURL} -> UpdateManifest
//!
//! 2. Download   GET sourceURL -> <install_dir>/update.<ext>
//!
//! 3. Apply      Evict:   delete  <install_dir>/app.<ext>
//!               Promote: rename  update.<ext> -> app.<ext>
//!
//! 4. Replace    (after the host exits) finish Promote if it could not run:
//!               ├── Windows: spawn the detached `updater` helper
//!               └── elsewhere: move the staged file in-process
//! ```
//!
//! Stages 2 and 3 are chained: [`UpdateAttempt::download`] applies the
//! package as soon as it is staged.
//!
//! # Attempts
//!
//! [`Updater::check`] returns an [`UpdateAttempt`] that owns the manifest for
//! that attempt. While it is alive a second `check` is rejected with
//! [`UpdateError::AttemptInProgress`](crate::core::UpdateError::AttemptInProgress).
//!
//! # Locked packages
//!
//! Evict and Promote failures are not errors. On Windows the running host
//! holds its own package open, so both steps can fail until it exits; the
//! [`ApplyReport`] says whether the post-exit replace still has work to do.
//!
//! # Module Structure
//!
//! - [`self_updater`]: the [`Updater`] entry point and attempt lifecycle
//! - [`version_check`]: talking to the version-check endpoint
//! - [`downloader`]: staging the package
//! - [`installer`]: Evict and Promote
//! - [`replacer`]: post-exit replace and the helper's retry loop
//! - [`transport`]: the HTTP seam
//! - [`layout`], [`manifest`]: file locations and per-attempt state

/// Staging the offered package next to the installed one.
pub mod downloader;
/// Evict and Promote.
pub mod installer;
pub mod layout;
pub mod manifest;
/// Post-exit replacement and the helper executable's logic.
pub mod replacer;
/// The [`Updater`] entry point.
pub mod self_updater;
pub mod transport;
/// Version-check endpoint client.
pub mod version_check;


pub use downloader::PackageDownloader;
pub use installer::{ApplyReport, PackageInstaller, StepOutcome};
pub use layout::InstallLayout;
pub use manifest::UpdateManifest;
pub use replacer::{
    PlatformFamily, PlatformReplacer, ProcessSpawner, ReplaceOutcome, RetryPolicy, SpawnAudit,
    SpawnEvent, SpawnRequest, SystemSpawner, finish_replacement,
};
pub use self_updater::{AppliedUpdate, CompletionCallback, UpdateAttempt, Updater};
pub use transport::{HttpTransport, Transport, TransportError};
pub use version_check::VersionChecker;
