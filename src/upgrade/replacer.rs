//! Post-exit replacement of the installed package.
//!
//! On Windows a running application keeps its package file locked, so
//! Evict/Promote can fail while the host is alive. Once the host has exited,
//! [`PlatformReplacer`] finishes the job: it hands the swap to a detached
//! helper process ([`finish_replacement`] is that helper's logic), or on
//! platforms without mandatory locks it simply moves the staged file itself.
//!
//! Nothing in this module returns an error to the host. The host has
//! already finished its lifecycle, so every outcome is logged and reported
//! as a [`ReplaceOutcome`] value.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_LOG_FILE;
use crate::upgrade::layout::InstallLayout;

/// How the operating system treats a package file that is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// Open files cannot be removed or replaced (Windows).
    LockProne,
    /// Open files can be unlinked and renamed over (Linux, macOS).
    Permissive,
}

impl PlatformFamily {
    /// Family of the platform this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::LockProne
        } else {
            Self::Permissive
        }
    }
}

/// A fully prepared detached process launch.
///
/// `args` are already quoted for the shell; when `verbatim` is set they
/// must be passed through without any further escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Executable to launch
    pub program: String,
    /// Arguments, pre-quoted
    pub args: Vec<String>,
    /// Working directory of the child
    pub working_dir: PathBuf,
    /// Whether `args` must bypass the platform's argument escaping
    pub verbatim: bool,
    /// Helper executable the shell will run
    pub helper: PathBuf,
    /// Staged package handed to the helper
    pub staged: PathBuf,
    /// Installed package handed to the helper
    pub installed: PathBuf,
}

impl SpawnRequest {
    /// Build the `cmd /s /c ""<helper>" "<staged>" "<installed>""` launch.
    ///
    /// # Errors
    ///
    /// Returns a description of the offending path when one of the three
    /// cannot be safely double-quoted.
    pub fn helper_via_shell(
        helper: &Path,
        staged: &Path,
        installed: &Path,
        working_dir: &Path,
    ) -> Result<Self, String> {
        let command_line =
            format!("\"{} {} {}\"", quote_path(helper)?, quote_path(staged)?, quote_path(installed)?);

        Ok(Self {
            program: "cmd".to_string(),
            args: vec!["/s".to_string(), "/c".to_string(), command_line],
            working_dir: working_dir.to_path_buf(),
            verbatim: true,
            helper: helper.to_path_buf(),
            staged: staged.to_path_buf(),
            installed: installed.to_path_buf(),
        })
    }

    /// Append `--log-file "<log_file>"` to a [`helper_via_shell`](Self::helper_via_shell) command line.
    ///
    /// # Errors
    ///
    /// Returns a description of `log_file` when it cannot be double-quoted.
    pub fn with_helper_log_file(mut self, log_file: &Path) -> Result<Self, String> {
        let quoted = quote_path(log_file)?;
        if let Some(line) = self.args.last_mut() {
            // Re-close the outer quotes after the new argument
            line.pop();
            line.push_str(&format!(" --log-file {quoted}\""));
        }
        Ok(self)
    }
}

/// Wrap `path` in double quotes for a verbatim shell command line.
pub(crate) fn quote_path(path: &Path) -> Result<String, String> {
    let Some(text) = path.to_str() else {
        return Err(format!("{} is not valid Unicode", path.display()));
    };
    if text.contains('"') {
        return Err(format!("{text} contains a double quote"));
    }
    Ok(format!("\"{text}\""))
}

/// Launches processes that outlive the caller.
pub trait ProcessSpawner: Send + Sync {
    /// Start `request` detached and return the child's process id.
    ///
    /// Implementations must not wait for the child.
    fn spawn_detached(&self, request: &SpawnRequest) -> io::Result<u32>;
}

/// [`ProcessSpawner`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn_detached(&self, request: &SpawnRequest) -> io::Result<u32> {
        let mut command = Command::new(&request.program);
        command
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;

            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
            for arg in &request.args {
                if request.verbatim {
                    command.raw_arg(arg);
                } else {
                    command.arg(arg);
                }
            }
        }

        #[cfg(not(windows))]
        {
            command.args(&request.args);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        // The child handle is dropped without waiting
        let child = command.spawn()?;
        Ok(child.id())
    }
}

/// Notification of a helper launch, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnEvent {
    /// Helper executable
    pub helper: PathBuf,
    /// Staged package
    pub staged: PathBuf,
    /// Installed package
    pub installed: PathBuf,
    /// Child pid, or why the launch failed
    pub result: std::result::Result<u32, String>,
}

/// Host hook receiving every [`SpawnEvent`].
pub type SpawnAudit = Box<AuditFn>;

/// Signature of a [`SpawnAudit`] hook.
pub type AuditFn = dyn Fn(&SpawnEvent) + Send + Sync;

/// What the post-exit replace did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// No staged package; Promote already finished.
    NothingStaged,
    /// The helper was launched.
    Spawned {
        /// Process id of the detached child
        pid: u32,
    },
    /// The staged package was moved into place in-process.
    Moved,
    /// The helper could not be launched.
    SpawnFailed {
        /// Why
        reason: String,
    },
    /// The in-process move failed.
    MoveFailed {
        /// OS error description
        reason: String,
    },
}

impl fmt::Display for ReplaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingStaged => f.write_str("nothing staged"),
            Self::Spawned {
                pid,
            } => write!(f, "helper started (pid {pid})"),
            Self::Moved => f.write_str("staged package moved into place"),
            Self::SpawnFailed {
                reason,
            } => write!(f, "helper could not be started: {reason}"),
            Self::MoveFailed {
                reason,
            } => write!(f, "staged package could not be moved: {reason}"),
        }
    }
}

/// Finishes a replacement Promote could not complete.
///
/// Must only be run after the process owning the installed package has
/// exited. Safe to call repeatedly: with nothing staged it does nothing.
pub struct PlatformReplacer<'a> {
    layout: &'a InstallLayout,
    family: PlatformFamily,
    audit: Option<&'a AuditFn>,
    log_file: Option<&'a Path>,
}

impl<'a> PlatformReplacer<'a> {
    /// Replacer for `layout` on the current platform.
    pub const fn new(layout: &'a InstallLayout) -> Self {
        Self {
            layout,
            family: PlatformFamily::current(),
            audit: None,
            log_file: None,
        }
    }

    /// Pretend to run on another platform family.
    #[must_use]
    pub const fn with_family(mut self, family: PlatformFamily) -> Self {
        self.family = family;
        self
    }

    /// Report spawn attempts to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Option<&'a AuditFn>) -> Self {
        self.audit = audit;
        self
    }

    /// Log file the helper should append to.
    ///
    /// Only passed on the helper's command line when it differs from the
    /// helper's own default next to the installed package.
    #[must_use]
    pub const fn with_log_file(mut self, log_file: Option<&'a Path>) -> Self {
        self.log_file = log_file;
        self
    }

    fn custom_log_file(&self) -> Option<&'a Path> {
        let default = self.layout.install_dir().join(DEFAULT_LOG_FILE);
        self.log_file.filter(|path| *path != default)
    }

    /// Finish the replacement, spawning through `spawner` when needed.
    pub fn replace(&self, spawner: &dyn ProcessSpawner) -> ReplaceOutcome {
        let staged = self.layout.staged_package();
        let installed = self.layout.installed_package();

        if !staged.exists() {
            info!("No staged update at {}; nothing to replace", staged.display());
            return ReplaceOutcome::NothingStaged;
        }

        match self.family {
            PlatformFamily::LockProne => self.spawn_helper(spawner, &staged, &installed),
            PlatformFamily::Permissive => move_into_place(&staged, &installed),
        }
    }

    fn spawn_helper(
        &self,
        spawner: &dyn ProcessSpawner,
        staged: &Path,
        installed: &Path,
    ) -> ReplaceOutcome {
        let helper = self.layout.helper();

        let result = if helper.is_file() {
            SpawnRequest::helper_via_shell(helper, staged, installed, self.layout.install_dir())
                .and_then(|request| match self.custom_log_file() {
                    Some(log_file) => request.with_helper_log_file(log_file),
                    None => Ok(request),
                })
                .and_then(|request| {
                    debug!("Spawning {} {}", request.program, request.args.join(" "));
                    spawner.spawn_detached(&request).map_err(|e| e.to_string())
                })
        } else {
            Err(format!("helper {} not found", helper.display()))
        };

        if let Some(audit) = self.audit {
            audit(&SpawnEvent {
                helper: helper.to_path_buf(),
                staged: staged.to_path_buf(),
                installed: installed.to_path_buf(),
                result: result.clone(),
            });
        }

        match result {
            Ok(pid) => {
                info!("Started update helper {} (pid {})", helper.display(), pid);
                ReplaceOutcome::Spawned {
                    pid,
                }
            }
            Err(reason) => {
                warn!("Could not start update helper: {}", reason);
                ReplaceOutcome::SpawnFailed {
                    reason,
                }
            }
        }
    }
}

fn move_into_place(staged: &Path, installed: &Path) -> ReplaceOutcome {
    match std::fs::rename(staged, installed) {
        Ok(()) => {
            info!("Moved {} to {}", staged.display(), installed.display());
            ReplaceOutcome::Moved
        }
        Err(e) => {
            warn!("Could not move {} to {}: {}", staged.display(), installed.display(), e);
            ReplaceOutcome::MoveFailed {
                reason: e.to_string(),
            }
        }
    }
}

/// How long the helper keeps trying while the package is still locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(500),
        }
    }
}

/// Replace `installed` with `staged`, retrying while the file is locked.
///
/// This is what the helper executable runs. The host process may still be
/// shutting down when it starts, so each attempt that fails is retried after
/// `policy.delay`.
///
/// # Errors
///
/// Returns the last failure once `policy.attempts` attempts have failed.
pub async fn finish_replacement(staged: &Path, installed: &Path, policy: RetryPolicy) -> Result<()> {
    if fs::metadata(staged).await.is_err() {
        info!("No staged update at {}; nothing to do", staged.display());
        return Ok(());
    }

    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        match attempt_replacement(staged, installed).await {
            Ok(()) => {
                info!("Replaced {} with {}", installed.display(), staged.display());
                return Ok(());
            }
            Err(e) if attempt + 1 < attempts => {
                warn!("Replace attempt {} failed: {:#}. Retrying...", attempt + 1, e);
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).context(format!("Failed to replace package after {attempts} attempts"));
            }
        }
    }
}

async fn attempt_replacement(staged: &Path, installed: &Path) -> Result<()> {
    match fs::remove_file(installed).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove {}", installed.display()));
        }
    }

    fs::rename(staged, installed)
        .await
        .with_context(|| format!("Failed to move {} to {}", staged.display(), installed.display()))?;

    if fs::metadata(installed).await.is_err() {
        bail!("{} missing after move", installed.display());
    }
    Ok(())
}
