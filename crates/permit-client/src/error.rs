//! Error types for the Client Admission Gate and its arbiter transport.

use thiserror::Error;

/// Errors raised while talking to the Arbiter Service over HTTP.
///
/// Every variant here is treated by [`crate::gate::AdmissionGate`] as a
/// fallback signal (SPEC §4.5 step 1: "Network/timeout/non-success status
/// ⇒ fallback"), never surfaced to the caller directly.
#[derive(Debug, Error)]
pub enum ArbiterClientError {
    #[error("arbiter request timed out")]
    Timeout,

    #[error("arbiter unreachable: {0}")]
    Network(String),

    #[error("arbiter returned HTTP {0}")]
    HttpStatus(u16),

    #[error("arbiter response was not valid JSON: {0}")]
    Decode(String),
}

impl ArbiterClientError {
    /// The fallback reason code carried on the observation report
    /// (SPEC §4.5 step 1: `orchestrator_down` or `orchestrator_http_<code>`).
    pub fn fallback_reason(&self) -> String {
        match self {
            ArbiterClientError::Timeout | ArbiterClientError::Network(_) => {
                "orchestrator_down".to_string()
            }
            ArbiterClientError::HttpStatus(code) => format!("orchestrator_http_{code}"),
            ArbiterClientError::Decode(_) => "orchestrator_down".to_string(),
        }
    }
}

/// Terminal errors an [`crate::gate::AdmissionGate`] call can surface to
/// its caller (SPEC §7).
#[derive(Debug, Error)]
pub enum GateError<E: std::error::Error> {
    /// Deny retries were exhausted without ever being granted (SPEC §4.5
    /// step 2).
    #[error("permit denied after {attempts} attempts; retries exhausted")]
    RetryExhausted { attempts: usize },

    /// The executor itself failed; propagated after the observation report
    /// was emitted (SPEC §4.5 step 5, SPEC §7).
    #[error("executor failed: {0}")]
    Executor(#[source] E),
}
