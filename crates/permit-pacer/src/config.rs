//! Local Pacer configuration (SPEC §4.6/§6).

use permit_core::{Limits, LimitsBuilder};
use std::time::Duration;

/// Configuration for a [`crate::LocalPacer`].
#[derive(Debug, Clone, Copy)]
pub struct PacerConfig {
    pub(crate) limits: Limits,
    pub(crate) cleanup_interval: Duration,
    pub(crate) stale_after: Duration,
}

impl Default for PacerConfig {
    /// The Local Pacer's own defaults (45 rps global, to leave headroom
    /// under the arbiter's 50 rps cap), per SPEC §6.
    fn default() -> Self {
        Self {
            limits: LimitsBuilder::local_pacer_defaults()
                .build()
                .expect("local pacer defaults are always valid"),
            cleanup_interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(60),
        }
    }
}

/// Builder for [`PacerConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PacerConfigBuilder {
    config: PacerConfig,
}

impl PacerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_rps(mut self, rps: u32) -> Self {
        self.config.limits.global_rps = rps;
        self
    }

    pub fn route_rps(mut self, rps: u32) -> Self {
        self.config.limits.route_rps = rps;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn stale_after(mut self, duration: Duration) -> Self {
        self.config.stale_after = duration;
        self
    }

    pub fn build(self) -> PacerConfig {
        self.config
    }
}
