//! End-to-end tests for the sitegen CLI.
//!
//! These tests exercise the full `sitegen` binary via subprocess. They catch
//! startup failures, argument-parsing regressions, config-store bugs, and
//! error-reporting regressions that unit tests miss.
//!
//! # Running
//!
//! ```sh
//! cargo test --test e2e
//! ```
//!
//! Every test runs against an isolated config directory and an API URL that
//! points at an unroutable address, so no network access is needed.

mod harness;

mod cli;
mod errors;
