//! Shared application state for the Arbiter Service, following the
//! `SharedState`/`AppState` convention this axum handler layout is
//! grounded on.

use crate::config::ArbiterConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use permit_core::Store;
use permit_pacer::{LocalPacer, PacerConfig, PacerConfigBuilder};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Application state shared across every handler, behind an `Arc` so axum
/// can clone it cheaply per request.
///
/// Unlike `psenger-throttler`'s `Arc<RwLock<AppState>>`, nothing here is
/// mutated in place after construction — the store handle, config and
/// fallback pacer are all individually interior-mutable or immutable — so
/// a bare `Arc` is enough; no outer `RwLock` is needed.
pub struct ArbiterState<S: Store> {
    pub store: Arc<S>,
    pub config: ArbiterConfig,
    /// The in-process limiter used when configured fail-open and the store
    /// is unreachable (SPEC §4.4/§7): `permit-pacer`'s `LocalPacer`, reused
    /// here rather than reimplemented.
    pub fallback: Arc<LocalPacer>,
    pub metrics_handle: Option<PrometheusHandle>,
    /// Count of `report_result` calls whose ingestion failed and was
    /// dropped (SPEC §4.4: "failures are recorded as internal counters so
    /// callers do not retry").
    pub report_failures: AtomicU64,
}

pub type SharedState<S> = Arc<ArbiterState<S>>;

impl<S: Store> ArbiterState<S> {
    pub fn new(store: S, config: ArbiterConfig, metrics_handle: Option<PrometheusHandle>) -> Self {
        let fallback_config: PacerConfig = PacerConfigBuilder::new()
            .global_rps(config.limits().global_rps)
            .route_rps(config.limits().route_rps)
            .build();
        Self {
            store: Arc::new(store),
            config,
            fallback: Arc::new(LocalPacer::with_name("arbiter-fallback", fallback_config)),
            metrics_handle,
            report_failures: AtomicU64::new(0),
        }
    }

    /// Starts the fallback pacer's background cleanup task. Call once after
    /// construction, before serving traffic.
    pub async fn start(&self) {
        self.fallback.start().await;
    }
}
