//! Core types for pkgswap
//!
//! Holds the error model shared by the update pipeline and the CLI:
//! - [`UpdateError`] - the single error type every update stage returns
//! - [`ErrorKind`] - the seven terminal outcomes, with stable codes
//! - [`ErrorContext`] / [`user_friendly_error`] - CLI presentation with suggestions

pub mod error;

pub use error::{ErrorContext, ErrorKind, UpdateError, user_friendly_error};
