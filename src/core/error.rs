//! Error handling for pkgswap
//!
//! The update pipeline reports every terminal condition through a single
//! strongly-typed error, [`UpdateError`]. Each terminal variant maps onto one
//! of seven [`ErrorKind`]s, which carry the stable snake_case codes hosts use
//! to tell the outcomes apart (`no_update_available`, `failed_to_apply_update`, ...).
//!
//! # Error Categories
//!
//! - **Check stage**: [`UpdateError::VersionNotSpecified`], [`UpdateError::CannotConnectToApi`],
//!   [`UpdateError::NoUpdateAvailable`], [`UpdateError::ApiResponseNotValid`]
//! - **Download stage**: [`UpdateError::UpdateFileNotFound`], [`UpdateError::FailedToDownloadUpdate`]
//! - **Apply stage**: [`UpdateError::FailedToApplyUpdate`]
//! - **Contract**: [`UpdateError::AttemptInProgress`] (not a terminal kind)
//!
//! `NoUpdateAvailable` shares the error slot for uniformity but is the normal
//! "up to date" answer; use [`UpdateError::is_up_to_date`] to branch on it.
//!
//! For the CLI, [`user_friendly_error`] turns any [`anyhow::Error`] into an
//! [`ErrorContext`] with details and an actionable suggestion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pkgswap::core::{ErrorKind, UpdateError};
//!
//! let error = UpdateError::NoUpdateAvailable {
//!     latest_version: "1.2.0".to_string(),
//! };
//! assert!(error.is_up_to_date());
//! assert_eq!(error.kind(), Some(ErrorKind::NoUpdateAvailable));
//! assert_eq!(ErrorKind::NoUpdateAvailable.code(), "no_update_available");
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The seven terminal outcomes an update stage can end in.
///
/// Kinds are mutually exclusive per attempt. The [`code`](Self::code) strings
/// are stable and suitable for logs or for passing across a process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The host did not supply a current version.
    VersionNotSpecified,
    /// The version-check endpoint could not be reached.
    CannotConnectToApi,
    /// The endpoint answered but has nothing newer to offer.
    NoUpdateAvailable,
    /// The endpoint answered with an empty or malformed payload.
    ApiResponseNotValid,
    /// The package URL did not point at a file.
    UpdateFileNotFound,
    /// Fetching the package bytes failed.
    FailedToDownloadUpdate,
    /// The package could not be staged or installed.
    FailedToApplyUpdate,
}

impl ErrorKind {
    /// All kinds, in their canonical order.
    pub const ALL: [Self; 7] = [
        Self::VersionNotSpecified,
        Self::CannotConnectToApi,
        Self::NoUpdateAvailable,
        Self::ApiResponseNotValid,
        Self::UpdateFileNotFound,
        Self::FailedToDownloadUpdate,
        Self::FailedToApplyUpdate,
    ];

    /// Stable snake_case identifier for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::VersionNotSpecified => "version_not_specified",
            Self::CannotConnectToApi => "cannot_connect_to_api",
            Self::NoUpdateAvailable => "no_update_available",
            Self::ApiResponseNotValid => "api_response_not_valid",
            Self::UpdateFileNotFound => "update_file_not_found",
            Self::FailedToDownloadUpdate => "failed_to_download_update",
            Self::FailedToApplyUpdate => "failed_to_apply_update",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The error type for every stage of an update attempt.
///
/// Terminal variants carry enough context to explain the failure on their
/// own; [`kind`](Self::kind) collapses them onto the fixed [`ErrorKind`] set.
///
/// # Examples
///
/// ```rust,no_run
/// use pkgswap::core::{ErrorKind, UpdateError};
///
/// fn describe(error: &UpdateError) -> &'static str {
///     match error.kind() {
///         Some(ErrorKind::NoUpdateAvailable) => "already up to date",
///         Some(ErrorKind::CannotConnectToApi) => "offline?",
///         Some(_) => "update failed",
///         None => "busy",
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// No current version was supplied, so the endpoint was never contacted.
    #[error("The current application version was not specified")]
    VersionNotSpecified,

    /// Transport-level failure talking to the version-check endpoint.
    #[error("Cannot connect to update API at {endpoint}: {reason}")]
    CannotConnectToApi {
        /// Endpoint that was contacted
        endpoint: String,
        /// Transport failure description
        reason: String,
    },

    /// The endpoint knows a latest version but offers no package for it.
    #[error("No update available (latest version is {latest_version})")]
    NoUpdateAvailable {
        /// Latest version reported by the endpoint
        latest_version: String,
    },

    /// The endpoint's payload was empty, unparseable or missing `latestVersion`.
    #[error("Update API response is not valid: {reason}")]
    ApiResponseNotValid {
        /// What was wrong with the payload
        reason: String,
    },

    /// The package URL answered but there was no file behind it.
    #[error("Update file not found at {url}")]
    UpdateFileNotFound {
        /// Package URL that was requested
        url: String,
    },

    /// Fetching the package failed.
    #[error("Failed to download update from {url}: {reason}")]
    FailedToDownloadUpdate {
        /// Package URL that was requested
        url: String,
        /// Transport failure description
        reason: String,
    },

    /// Staging or installing the package could not even be started.
    #[error("Failed to apply update: {reason}")]
    FailedToApplyUpdate {
        /// Why the operation could not be performed
        reason: String,
    },

    /// A second attempt was started while another one was still alive.
    #[error("An update attempt is already in progress")]
    AttemptInProgress,
}

impl UpdateError {
    /// The terminal kind of this error, or `None` for contract errors.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::VersionNotSpecified => Some(ErrorKind::VersionNotSpecified),
            Self::CannotConnectToApi { .. } => Some(ErrorKind::CannotConnectToApi),
            Self::NoUpdateAvailable { .. } => Some(ErrorKind::NoUpdateAvailable),
            Self::ApiResponseNotValid { .. } => Some(ErrorKind::ApiResponseNotValid),
            Self::UpdateFileNotFound { .. } => Some(ErrorKind::UpdateFileNotFound),
            Self::FailedToDownloadUpdate { .. } => Some(ErrorKind::FailedToDownloadUpdate),
            Self::FailedToApplyUpdate { .. } => Some(ErrorKind::FailedToApplyUpdate),
            Self::AttemptInProgress => None,
        }
    }

    /// Whether this is the expected "already on the latest version" answer.
    #[must_use]
    pub const fn is_up_to_date(&self) -> bool {
        matches!(self, Self::NoUpdateAvailable { .. })
    }

    /// Stable code for logs: the kind's code, or `attempt_in_progress`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind().map_or("attempt_in_progress", ErrorKind::code)
    }
}

/// Error wrapper that adds user-facing details and a suggestion.
///
/// This is what the CLI prints when a command fails. Details are shown in
/// yellow, suggestions in green.
///
/// # Examples
///
/// ```rust,no_run
/// use pkgswap::core::{ErrorContext, UpdateError};
///
/// let context = ErrorContext::new(UpdateError::VersionNotSpecified)
///     .with_suggestion("Pass --current-version or set version_file in the config")
///     .with_details("The update endpoint needs the installed version to answer");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The headline error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            message: error.to_string(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colours.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Recognises [`UpdateError`], [`std::io::Error`] and [`toml::de::Error`]
/// anywhere in the error chain; anything else is shown with its full chain
/// of causes as details.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error);
    }

    for cause in error.chain() {
        if let Some(update_error) = cause.downcast_ref::<UpdateError>() {
            return create_error_context(update_error);
        }

        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            let context = ErrorContext::new(&error);
            match io_error.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    return context
                        .with_suggestion("Check that the install directory is writable by the current user")
                        .with_details("pkgswap needs write access to the install directory to stage and replace the package");
                }
                std::io::ErrorKind::NotFound => {
                    return context
                        .with_suggestion("Check that install_dir in the configuration points at an existing directory");
                }
                _ => {}
            }
        }

        if let Some(toml_error) = cause.downcast_ref::<toml::de::Error>() {
            return ErrorContext::new(&error)
                .with_details(toml_error.to_string())
                .with_suggestion("Check the TOML syntax of the pkgswap configuration file");
        }
    }

    let mut context = ErrorContext::new(&error);
    let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !causes.is_empty() {
        context = context.with_details(causes.join(": "));
    }
    context
}

fn create_error_context(error: &UpdateError) -> ErrorContext {
    let context = ErrorContext::new(error);
    match error {
        UpdateError::VersionNotSpecified => context
            .with_suggestion("Pass --current-version or set version_file in the configuration")
            .with_details("The update endpoint needs the installed version to decide what to offer"),
        UpdateError::CannotConnectToApi { .. } => context
            .with_suggestion("Check your network connection and the endpoint URL in the configuration"),
        UpdateError::ApiResponseNotValid { .. } => context.with_details(
            "The endpoint must answer with a JSON object containing at least `latestVersion`",
        ),
        UpdateError::UpdateFileNotFound { .. } => context
            .with_details("The endpoint advertised a package URL that does not exist")
            .with_suggestion("Report the broken release to the update server operator"),
        UpdateError::FailedToDownloadUpdate { .. } => context.with_suggestion("Retry the upgrade; nothing has been changed on disk"),
        UpdateError::FailedToApplyUpdate { .. } => context
            .with_suggestion("Check that the install directory exists and is writable, then retry"),
        UpdateError::AttemptInProgress => {
            context.with_suggestion("Wait for the running update attempt to finish")
        }
        UpdateError::NoUpdateAvailable { .. } => context,
    }
}
