//! Events emitted by the Client Admission Gate.

use permit_core::{ArbiterEvent, Priority};
use std::time::Instant;

/// Events emitted by an [`crate::AdmissionGate`], grounded on the
/// `Retry`/`Success`/`Error`-shaped event enum this workspace's retry
/// middleware used, generalized from Tower-service retries to permit
/// denial/fallback outcomes (SPEC §4.5).
///
/// Every variant carries the originating request's `priority`: the
/// admission algorithm itself never looks at it, but operators can use it
/// to see whether `high`-priority calls are being starved (SPEC_FULL §3).
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// The arbiter granted a permit on this attempt.
    PermitGranted {
        gate_name: String,
        timestamp: Instant,
        attempt: usize,
        priority: Priority,
    },
    /// The arbiter denied a permit; the gate will sleep and retry.
    PermitDenied {
        gate_name: String,
        timestamp: Instant,
        attempt: usize,
        retry_after_ms: u64,
        priority: Priority,
    },
    /// The arbiter was unreachable or returned an invalid response; the
    /// gate fell back to the Local Pacer.
    FallbackEngaged {
        gate_name: String,
        timestamp: Instant,
        reason: String,
        priority: Priority,
    },
    /// Deny retries were exhausted without a grant (SPEC §4.5 step 2).
    RetryExhausted {
        gate_name: String,
        timestamp: Instant,
        attempts: usize,
        priority: Priority,
    },
    /// The best-effort `report_result` call itself failed; dropped, since
    /// observations are advisory (SPEC §7).
    ReportFailed {
        gate_name: String,
        timestamp: Instant,
        priority: Priority,
    },
}

impl ArbiterEvent for GateEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GateEvent::PermitGranted { .. } => "permit_granted",
            GateEvent::PermitDenied { .. } => "permit_denied",
            GateEvent::FallbackEngaged { .. } => "fallback_engaged",
            GateEvent::RetryExhausted { .. } => "retry_exhausted",
            GateEvent::ReportFailed { .. } => "report_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            GateEvent::PermitGranted { timestamp, .. }
            | GateEvent::PermitDenied { timestamp, .. }
            | GateEvent::FallbackEngaged { timestamp, .. }
            | GateEvent::RetryExhausted { timestamp, .. }
            | GateEvent::ReportFailed { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            GateEvent::PermitGranted { gate_name, .. }
            | GateEvent::PermitDenied { gate_name, .. }
            | GateEvent::FallbackEngaged { gate_name, .. }
            | GateEvent::RetryExhausted { gate_name, .. }
            | GateEvent::ReportFailed { gate_name, .. } => gate_name,
        }
    }
}
