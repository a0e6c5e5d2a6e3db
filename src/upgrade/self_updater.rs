use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{Subscriber, debug, info};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use crate::logging;
use crate::upgrade::downloader::PackageDownloader;
use crate::upgrade::installer::{ApplyReport, PackageInstaller};
use crate::upgrade::layout::InstallLayout;
use crate::upgrade::manifest::UpdateManifest;
use crate::upgrade::replacer::{
    PlatformFamily, PlatformReplacer, ProcessSpawner, ReplaceOutcome, SpawnAudit, SpawnEvent,
};
use crate::upgrade::transport::{HttpTransport, Transport};
use crate::upgrade::version_check::VersionChecker;

/// Host callback told about the end of every stage.
///
/// Receives `None` and the manifest on success, or the error and the
/// manifest as it stood when the stage failed.
pub type CompletionCallback = Arc<dyn Fn(Option<&UpdateError>, &UpdateManifest) + Send + Sync>;

/// Entry point for hosts embedding the updater.
///
/// `Updater` owns the configuration, the transport and the host hooks.
/// Each update runs as an [`UpdateAttempt`]: [`check`](Self::check) starts
/// one, [`UpdateAttempt::download`] finishes it, and at most one attempt
/// is alive at a time.
///
/// # Examples
///
/// ```rust,no_run
/// use pkgswap::config::UpdaterConfig;
/// use pkgswap::upgrade::Updater;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = UpdaterConfig::new("https://updates.example.com/check", "/opt/app/resources");
/// let updater = Updater::initialize(config)?;
/// updater.init_log_sink()?;
///
/// updater.set_completion_callback(|error, manifest| match error {
///     None => println!("stage done: {:?}", manifest.latest_version()),
///     Some(e) => eprintln!("stage failed: {}", e.code()),
/// });
///
/// match updater.check(Some("1.0.0")).await {
///     Ok(attempt) => {
///         let applied = attempt.download().await?;
///         if applied.report.needs_platform_replace() {
///             println!("run the platform replace after exit");
///         }
///     }
///     Err(e) if e.is_up_to_date() => println!("Up to date"),
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Updater<T: Transport = HttpTransport> {
    config: UpdaterConfig,
    layout: InstallLayout,
    transport: T,
    family: PlatformFamily,
    callback: Mutex<Option<CompletionCallback>>,
    spawn_audit: Option<SpawnAudit>,
    attempt_active: AtomicBool,
}

impl Updater<HttpTransport> {
    /// Validate `config` and build an updater that talks HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn initialize(config: UpdaterConfig) -> Result<Self> {
        let transport = HttpTransport::new().context("Failed to initialise HTTP transport")?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Updater<T> {
    /// Validate `config` and build an updater using `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(config: UpdaterConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let layout = InstallLayout::from_config(&config);
        debug!(
            "Updater initialised for {} (installed package {})",
            config.endpoint,
            layout.installed_package().display()
        );

        Ok(Self {
            config,
            layout,
            transport,
            family: PlatformFamily::current(),
            callback: Mutex::new(None),
            spawn_audit: None,
            attempt_active: AtomicBool::new(false),
        })
    }

    /// Install an audit hook for helper launches.
    #[must_use]
    pub fn with_spawn_audit(mut self, audit: impl Fn(&SpawnEvent) + Send + Sync + 'static) -> Self {
        self.spawn_audit = Some(Box::new(audit));
        self
    }

    /// Override the platform family used by the post-exit replace.
    #[must_use]
    pub fn with_platform_family(mut self, family: PlatformFamily) -> Self {
        self.family = family;
        self
    }

    /// Replace the completion callback used by the next stages.
    pub fn set_completion_callback(
        &self,
        callback: impl Fn(Option<&UpdateError>, &UpdateManifest) + Send + Sync + 'static,
    ) {
        let mut slot = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    /// Remove the completion callback.
    pub fn clear_completion_callback(&self) {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Send diagnostics to the configured log file.
    ///
    /// Installs a global subscriber writing to [`UpdaterConfig::log_path`];
    /// does nothing when the log file is disabled. Hosts that already have
    /// a subscriber should compose [`log_sink`](Self::log_sink) instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened or a global
    /// subscriber is already installed.
    pub fn init_log_sink(&self) -> Result<()> {
        if let Some(subscriber) = self.log_sink()? {
            subscriber.try_init().map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;
        }
        Ok(())
    }

    /// Subscriber writing to the configured log file, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened.
    pub fn log_sink(&self) -> Result<Option<impl Subscriber + Send + Sync + 'static>> {
        self.config.log_path().map(|path| logging::file_subscriber(&path)).transpose()
    }

    /// The configuration this updater was initialised with.
    #[must_use]
    pub const fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Where packages are staged and installed.
    #[must_use]
    pub const fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// The transport used for every request.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether an attempt is currently alive.
    #[must_use]
    pub fn attempt_in_progress(&self) -> bool {
        self.attempt_active.load(Ordering::Acquire)
    }

    /// Ask the endpoint whether a newer package exists.
    ///
    /// On success the returned attempt holds the manifest and keeps any
    /// other `check` out until it is dropped or downloaded.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::AttemptInProgress`] if another attempt is alive; the
    ///   callback is not invoked
    /// - any check-stage error, after the callback has been invoked with an
    ///   empty manifest
    pub async fn check(&self, current_version: Option<&str>) -> Result<UpdateAttempt<'_, T>, UpdateError> {
        let guard = AttemptGuard::acquire(&self.attempt_active)?;

        let checker = VersionChecker::new(&self.config.endpoint, &self.config.request_options, &self.transport);
        match checker.check(current_version).await {
            Ok(manifest) => {
                self.notify(None, &manifest);
                Ok(UpdateAttempt {
                    updater: self,
                    manifest,
                    _guard: guard,
                })
            }
            Err(e) => {
                self.notify(Some(&e), &UpdateManifest::default());
                Err(e)
            }
        }
    }

    /// Finish a replacement Promote could not complete.
    ///
    /// Call only after the process holding the installed package has
    /// exited. Never fails; see [`ReplaceOutcome`].
    pub fn apply_platform_replace(&self, spawner: &dyn ProcessSpawner) -> ReplaceOutcome {
        let log_file = self.config.log_path();
        let outcome = PlatformReplacer::new(&self.layout)
            .with_family(self.family)
            .with_audit(self.spawn_audit.as_deref())
            .with_log_file(log_file.as_deref())
            .replace(spawner);
        info!("Platform replace: {}", outcome);
        outcome
    }

    fn notify(&self, error: Option<&UpdateError>, manifest: &UpdateManifest) {
        // Cloned out so the callback may replace itself
        let callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(error, manifest);
        }
    }
}

/// The outcome of a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedUpdate {
    /// Manifest with all three fields set
    pub manifest: UpdateManifest,
    /// How Evict and Promote went
    pub report: ApplyReport,
}

/// An update that was offered and has not been downloaded yet.
///
/// Dropping it abandons the attempt.
pub struct UpdateAttempt<'a, T: Transport> {
    updater: &'a Updater<T>,
    manifest: UpdateManifest,
    _guard: AttemptGuard<'a>,
}

impl<T: Transport> UpdateAttempt<'_, T> {
    /// What the endpoint offered.
    #[must_use]
    pub const fn manifest(&self) -> &UpdateManifest {
        &self.manifest
    }

    /// Download the package and apply it.
    ///
    /// Download and apply form one stage: the completion callback fires once,
    /// after Evict and Promote have both finished or the stage failed.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::UpdateFileNotFound`] / [`UpdateError::FailedToDownloadUpdate`]
    ///   when fetching fails; nothing is applied
    /// - [`UpdateError::FailedToApplyUpdate`] when the package cannot be
    ///   staged or the install cannot be attempted
    pub async fn download(mut self) -> Result<AppliedUpdate, UpdateError> {
        let updater = self.updater;
        let downloader =
            PackageDownloader::new(&updater.layout, &updater.config.request_options, &updater.transport);

        if let Err(e) = downloader.download(&mut self.manifest).await {
            updater.notify(Some(&e), &self.manifest);
            return Err(e);
        }

        match PackageInstaller::new(&updater.layout).apply(&self.manifest).await {
            Ok(report) => {
                updater.notify(None, &self.manifest);
                Ok(AppliedUpdate {
                    manifest: self.manifest,
                    report,
                })
            }
            Err(e) => {
                updater.notify(Some(&e), &self.manifest);
                Err(e)
            }
        }
    }
}

struct AttemptGuard<'a> {
    active: &'a AtomicBool,
}

impl<'a> AttemptGuard<'a> {
    fn acquire(active: &'a AtomicBool) -> Result<Self, UpdateError> {
        active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| UpdateError::AttemptInProgress)?;
        Ok(Self {
            active,
        })
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
