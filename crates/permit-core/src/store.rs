//! The Shared Counter Store contract (SPEC §4.1).
//!
//! This crate only pins the contract the permit arbitration algorithm
//! depends on: millisecond-precision per-key TTL, atomic server-side script
//! execution, and the two atomic operations the algorithm is built from.
//! The concrete backend (Redis, by default) lives in the `permit-store`
//! crate so this crate stays free of any network dependency.

use crate::types::{DenyReason, ObservationReport, PermitRequest};
use async_trait::async_trait;

/// The outcome of one atomic permit decision (SPEC §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitDecision {
    pub granted: bool,
    pub retry_after_ms: u64,
    pub reason: DenyReason,
}

/// The outcome of ingesting one observation report (SPEC §4.3). All fields
/// are purely informational — ingestion never fails the caller's request,
/// per the "observations are advisory" error-handling rule (SPEC §7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationOutcome {
    /// Whether the invalid-request counter for the report's group crossed
    /// `INVALID_THRESHOLD` on this write, tripping the guardrail.
    pub guardrail_tripped: bool,
}

/// The Shared Counter Store contract (SPEC §4.1/§4.2/§4.3).
///
/// Implementations must execute [`Store::decide_permit`] and
/// [`Store::ingest_observation`] each as a single indivisible transition:
/// no interleaving between a counter's read and its increment may be
/// observable to any other caller (SPEC §3, "Invariants"). A Redis
/// implementation satisfies this with `EVAL`/`EVALSHA`; any other backend
/// must provide equivalent exclusive-execution semantics (SPEC §9).
#[async_trait]
pub trait Store: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the Atomic Permit Script (SPEC §4.2) for `request` at the given
    /// wall-clock time (milliseconds since epoch).
    async fn decide_permit(
        &self,
        request: &PermitRequest,
        now_unix_ms: u64,
    ) -> Result<PermitDecision, Self::Error>;

    /// Runs the Observation Ingester (SPEC §4.3) for `report`.
    async fn ingest_observation(
        &self,
        report: &ObservationReport,
    ) -> Result<ObservationOutcome, Self::Error>;

    /// Returns `Ok(())` only if the store is reachable within a short
    /// deadline (backs the arbiter's `/healthz`, SPEC §4.4).
    async fn ping(&self) -> Result<(), Self::Error>;
}
