//! Arbiter Service configuration (SPEC §6).
//!
//! Unlike [`permit_core::Limits`] (shared between the arbiter and the Local
//! Pacer), the fields here — bind address, store URL, fail-open disposition
//! — only make sense for a server process, so they live in this crate
//! rather than `permit-core`.

use clap::Parser;
use permit_core::Limits;
use std::net::SocketAddr;
use std::time::Duration;

/// Arbiter Service configuration, loadable from the environment or the
/// command line via [`clap`]'s `env` feature — the same convention the
/// Redis-backed rate limiters in this corpus use for their own daemons.
#[derive(Debug, Clone, Parser)]
#[command(name = "permit-arbiterd", about = "Permit arbitration service")]
pub struct ArbiterConfig {
    /// Address the HTTP server binds to.
    #[arg(long, env = "PERMIT_BIND_ADDR", default_value = "0.0.0.0:8088")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL backing the Shared Counter Store.
    #[arg(
        long,
        env = "PERMIT_STORE_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    pub store_url: String,

    /// Maximum grants per identity per second (SPEC §6, `GLOBAL_RPS`).
    #[arg(long, env = "PERMIT_GLOBAL_RPS", default_value_t = 50)]
    pub global_rps: u32,

    /// Maximum grants per route key per second (SPEC §6, `ROUTE_RPS`).
    #[arg(long, env = "PERMIT_ROUTE_RPS", default_value_t = 5)]
    pub route_rps: u32,

    /// Floor under which `retry_after_ms` is never reported (SPEC §6,
    /// `MIN_RETRY_MS`).
    #[arg(long, env = "PERMIT_MIN_RETRY_MS", default_value_t = 50)]
    pub min_retry_ms: u64,

    /// Invalid-request count that trips the guardrail (SPEC §6,
    /// `INVALID_THRESHOLD`).
    #[arg(long, env = "PERMIT_INVALID_THRESHOLD", default_value_t = 8000)]
    pub invalid_threshold: u32,

    /// How long a tripped guardrail denies permits for its group (SPEC §6,
    /// `GUARDRAIL_COOLDOWN_MS`).
    #[arg(long, env = "PERMIT_GUARDRAIL_COOLDOWN_MS", default_value_t = 30_000)]
    pub guardrail_cooldown_ms: u64,

    /// Whether `request_token` grants (via the in-process fallback limiter)
    /// instead of denying when the Shared Counter Store is unreachable
    /// (SPEC §4.4/§7, Open Question 1). Defaults to `true`: fail-open with
    /// a conservative in-process limiter is the documented default
    /// disposition.
    #[arg(
        long,
        env = "PERMIT_FAIL_OPEN",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub fail_open: bool,

    /// Upper bound on how long `/healthz` waits for the store's `PING`
    /// before declaring it unreachable.
    #[arg(long, env = "PERMIT_HEALTHZ_TIMEOUT_MS", default_value_t = 200)]
    pub healthz_timeout_ms: u64,
}

impl ArbiterConfig {
    /// The permit decision limits derived from this configuration.
    pub fn limits(&self) -> Limits {
        permit_core::LimitsBuilder::new()
            .global_rps(self.global_rps)
            .route_rps(self.route_rps)
            .min_retry(Duration::from_millis(self.min_retry_ms))
            .invalid_threshold(self.invalid_threshold)
            .guardrail_cooldown(Duration::from_millis(self.guardrail_cooldown_ms))
            .build()
            .expect("clap default_value_t values are always positive")
    }

    pub fn healthz_timeout(&self) -> Duration {
        Duration::from_millis(self.healthz_timeout_ms)
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8088".parse().unwrap(),
            store_url: "redis://127.0.0.1:6379".to_string(),
            global_rps: 50,
            route_rps: 5,
            min_retry_ms: 50,
            invalid_threshold: 8000,
            guardrail_cooldown_ms: 30_000,
            fail_open: true,
            healthz_timeout_ms: 200,
        }
    }
}
