//! Errors raised by the Shared Counter Store implementations.

use thiserror::Error;

/// Errors a [`crate::Store`] implementation can raise (SPEC §4.1/§7).
///
/// Every variant is surfaced to the arbiter as "Shared Counter Store
/// Outage", which is handled per `ArbiterConfig::fail_open` rather than by
/// matching on the variant — callers generally only need `Display`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying Redis connection failed, timed out, or returned an
    /// error response.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A script returned a value that didn't match the expected shape.
    #[error("unexpected script reply: {0}")]
    UnexpectedReply(String),

    /// An observed bucket-state payload failed to deserialize.
    #[error("malformed bucket state: {0}")]
    MalformedState(#[from] serde_json::Error),
}
