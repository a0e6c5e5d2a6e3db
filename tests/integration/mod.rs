//! Integration test suite for pkgswap
//!
//! End-to-end tests that drive the update pipeline against a local mock
//! HTTP server and run the compiled binaries.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update_flow**: library pipeline over real HTTP (check, download, apply, replace)
//! - **cli**: the `pkgswap` and `updater` binaries

mod cli;
mod update_flow;
