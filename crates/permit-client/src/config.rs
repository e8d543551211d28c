//! Client Admission Gate configuration (SPEC §4.5/§5/§6).

use std::time::Duration;

/// Configuration for an [`crate::AdmissionGate`].
///
/// Builder style kept from this workspace's other config structs
/// (`permit_core::LimitsBuilder`, `permit_pacer::PacerConfigBuilder`).
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub(crate) arbiter_base_url: String,
    /// Per-`request_token` call timeout the gate configures on its own
    /// transport, before the `max_wait_ms + 500ms` floor from SPEC §5 is
    /// applied.
    pub(crate) configured_timeout: Duration,
    /// Sent to the arbiter as `PermitRequest::max_wait_ms`: how long the
    /// arbiter itself may hold a call open before returning a denial.
    pub(crate) max_wait_ms: u64,
    /// Cap on deny-retry attempts before the gate surfaces a
    /// retry-exhausted error (SPEC §4.5, default 100).
    pub(crate) max_retries: usize,
    /// Floor under which the gate never sleeps less than, between deny
    /// retries (SPEC §6, `MIN_RETRY_MS`, default 50ms).
    pub(crate) min_retry: Duration,
}

impl GateConfig {
    pub fn builder(arbiter_base_url: impl Into<String>) -> GateConfigBuilder {
        GateConfigBuilder::new(arbiter_base_url)
    }

    /// The bounded timeout CAG waits for the arbiter on each `request_token`
    /// call (SPEC §5): `max(configuredTimeout, max_wait_ms + 500ms)`.
    pub fn request_timeout(&self) -> Duration {
        self.configured_timeout
            .max(Duration::from_millis(self.max_wait_ms) + Duration::from_millis(500))
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Clone)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    pub fn new(arbiter_base_url: impl Into<String>) -> Self {
        Self {
            config: GateConfig {
                arbiter_base_url: arbiter_base_url.into(),
                configured_timeout: Duration::from_secs(2),
                max_wait_ms: 0,
                max_retries: 100,
                min_retry: Duration::from_millis(50),
            },
        }
    }

    pub fn configured_timeout(mut self, timeout: Duration) -> Self {
        self.config.configured_timeout = timeout;
        self
    }

    pub fn max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.config.max_wait_ms = max_wait_ms;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn min_retry(mut self, min_retry: Duration) -> Self {
        self.config.min_retry = min_retry;
        self
    }

    pub fn build(self) -> GateConfig {
        self.config
    }
}
