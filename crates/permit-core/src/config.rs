//! The enumerated configuration knobs from SPEC §6, shared by the arbiter
//! service and the local pacer so both honor the same defaults.

use crate::error::ConfigError;
use std::time::Duration;

/// The limits a permit decision is checked against (SPEC §4.2/§6).
///
/// Built with [`LimitsBuilder`], mirroring the builder shape used
/// throughout this workspace's rate limiting code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Maximum grants per identity per second (arbiter default: 50).
    pub global_rps: u32,
    /// Maximum grants per `(identity, method, route_pattern, major_parameter)`
    /// per second (default: 5).
    pub route_rps: u32,
    /// Floor under which `retry_after_ms` is never reported, to prevent hot
    /// retry loops (default: 50ms).
    pub min_retry: Duration,
    /// Invalid-request count (401/403, or non-shared 429) within the 600s
    /// window that trips the guardrail (default: 8000, below the
    /// documented 10,000-per-10-minutes external ceiling).
    pub invalid_threshold: u32,
    /// How long a tripped guardrail denies permits for its group (default:
    /// 30s).
    pub guardrail_cooldown: Duration,
}

impl Default for Limits {
    /// Arbiter-side defaults from SPEC §6. [`LimitsBuilder::local_pacer_defaults`]
    /// produces the slightly more conservative Local Pacer defaults instead.
    fn default() -> Self {
        Self {
            global_rps: 50,
            route_rps: 5,
            min_retry: Duration::from_millis(50),
            invalid_threshold: 8000,
            guardrail_cooldown: Duration::from_millis(30_000),
        }
    }
}

/// Builder for [`Limits`].
#[derive(Debug, Clone, Copy)]
pub struct LimitsBuilder {
    limits: Limits,
}

impl Default for LimitsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LimitsBuilder {
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    /// Starts from the Local Pacer's slightly lower defaults (45 rps global,
    /// to leave headroom under the arbiter's 50 rps — SPEC §6).
    pub fn local_pacer_defaults() -> Self {
        Self {
            limits: Limits {
                global_rps: 45,
                ..Limits::default()
            },
        }
    }

    pub fn global_rps(mut self, rps: u32) -> Self {
        self.limits.global_rps = rps;
        self
    }

    pub fn route_rps(mut self, rps: u32) -> Self {
        self.limits.route_rps = rps;
        self
    }

    pub fn min_retry(mut self, d: Duration) -> Self {
        self.limits.min_retry = d;
        self
    }

    pub fn invalid_threshold(mut self, n: u32) -> Self {
        self.limits.invalid_threshold = n;
        self
    }

    pub fn guardrail_cooldown(mut self, d: Duration) -> Self {
        self.limits.guardrail_cooldown = d;
        self
    }

    /// Validates and builds the [`Limits`], rejecting zero caps that would
    /// make every permit request deny (SPEC invariant: `G`/`R` are positive
    /// RPS caps).
    pub fn build(self) -> Result<Limits, ConfigError> {
        if self.limits.global_rps == 0 {
            return Err(ConfigError::NotPositive {
                field: "GLOBAL_RPS",
                value: 0,
            });
        }
        if self.limits.route_rps == 0 {
            return Err(ConfigError::NotPositive {
                field: "ROUTE_RPS",
                value: 0,
            });
        }
        Ok(self.limits)
    }
}
