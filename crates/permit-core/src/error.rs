//! Shared error type for configuration and wire-format problems.
//!
//! Per-component errors (store failures, admission-gate failures, pacer
//! failures) live in their own crates next to the code that raises them,
//! following this workspace's convention of one `thiserror` enum per crate.
//! This crate only owns the error shape that is genuinely shared: malformed
//! configuration and malformed wire payloads (§7, "Invalid payload").

use thiserror::Error;

/// Errors raised while building or validating an [`crate::config::Limits`]
/// or a wire type before it reaches a component-specific handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric configuration value was zero or negative where a positive
    /// value is required (e.g. `GLOBAL_RPS`, `ROUTE_RPS`).
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: i64 },

    /// A required field on a wire payload was missing or empty.
    #[error("{field} is required")]
    MissingField { field: &'static str },
}
