//! The Client Admission Gate (SPEC §4.5): the per-call wrapper a bot uses
//! before talking to the external API.

use crate::config::GateConfig;
use crate::error::GateError;
use crate::events::GateEvent;
use crate::executor::ExecutorResponse;
use crate::transport::{ArbiterClient, HttpArbiterClient};
use permit_core::{
    now_unix_ms, EventListener, EventListeners, ObservationReport, PermitRequest, RateLimitScope,
};
use permit_pacer::LocalPacer;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The classified outcome of one `request_token` call (SPEC §4.5 step 1).
enum Outcome {
    Grant { lease_id: Option<String> },
    Deny { retry_after_ms: u64 },
    Fallback { reason: String },
}

/// Per-process statistics an [`AdmissionGate`] keeps, mirrored to
/// `metrics` when the `metrics` feature is enabled.
#[derive(Debug, Default)]
struct GateStats {
    denials: AtomicU64,
    fallbacks: AtomicU64,
    report_failures: AtomicU64,
}

/// Wraps one external call with permit arbitration (SPEC §4.5).
///
/// Constructed once per process (or per downstream API) and reused across
/// calls; cheap to clone if `C` and the Local Pacer are already behind
/// `Arc`s, since that's how both are held internally.
pub struct AdmissionGate<C: ArbiterClient> {
    name: String,
    client: C,
    pacer: Arc<LocalPacer>,
    config: GateConfig,
    event_listeners: EventListeners<GateEvent>,
    stats: GateStats,
}

impl AdmissionGate<HttpArbiterClient> {
    /// Builds a gate talking to a `permit-server` instance over HTTP, with
    /// its own dedicated Local Pacer for the fallback path.
    pub fn connect(config: GateConfig, pacer: Arc<LocalPacer>) -> Self {
        let client = HttpArbiterClient::new(config.arbiter_base_url.clone());
        Self::new("admission-gate", client, pacer, config)
    }
}

impl<C: ArbiterClient> AdmissionGate<C> {
    pub fn new(name: impl Into<String>, client: C, pacer: Arc<LocalPacer>, config: GateConfig) -> Self {
        Self {
            name: name.into(),
            client,
            pacer,
            config,
            event_listeners: EventListeners::new(),
            stats: GateStats::default(),
        }
    }

    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: EventListener<GateEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    fn emit(&self, event: GateEvent) {
        self.event_listeners.emit(&event);
    }

    async fn classify(&self, request: &PermitRequest) -> Outcome {
        match self
            .client
            .request_token(request, self.config.request_timeout())
            .await
        {
            Ok(response) if response.granted => Outcome::Grant {
                lease_id: response.lease_id,
            },
            Ok(response) => Outcome::Deny {
                retry_after_ms: response
                    .retry_after_ms
                    .unwrap_or(self.config.min_retry.as_millis() as u64),
            },
            Err(err) => Outcome::Fallback {
                reason: err.fallback_reason(),
            },
        }
    }

    /// Runs `executor` under permit arbitration (SPEC §4.5).
    ///
    /// 1. Calls `request_token`, classifying the result.
    /// 2. On deny, sleeps `max(retry_after_ms, MIN_RETRY_MS)` and retries,
    ///    up to `max_retries` attempts.
    /// 3. On fallback, acquires from the Local Pacer instead.
    /// 4. On grant, or once a pacer slot is held, invokes `executor` and
    ///    reports the observed result best-effort, re-raising any executor
    ///    error after the report is sent.
    pub async fn with_permit<F, Fut, E>(
        &self,
        request: PermitRequest,
        executor: F,
    ) -> Result<ExecutorResponse, GateError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ExecutorResponse, E>>,
        E: std::error::Error,
    {
        let request = request.with_generated_request_id();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.classify(&request).await {
                Outcome::Grant { lease_id } => {
                    self.emit(GateEvent::PermitGranted {
                        gate_name: self.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        priority: request.priority,
                    });
                    return self.execute_and_report(&request, lease_id, None, &executor).await;
                }
                Outcome::Deny { retry_after_ms } => {
                    self.stats.denials.fetch_add(1, Ordering::Relaxed);
                    self.emit(GateEvent::PermitDenied {
                        gate_name: self.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        retry_after_ms,
                        priority: request.priority,
                    });

                    if attempt >= self.config.max_retries {
                        self.emit(GateEvent::RetryExhausted {
                            gate_name: self.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                            priority: request.priority,
                        });
                        return Err(GateError::RetryExhausted { attempts: attempt });
                    }

                    let sleep_ms = retry_after_ms.max(self.config.min_retry.as_millis() as u64);
                    tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                }
                Outcome::Fallback { reason } => {
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    self.emit(GateEvent::FallbackEngaged {
                        gate_name: self.name.clone(),
                        timestamp: Instant::now(),
                        reason: reason.clone(),
                        priority: request.priority,
                    });

                    self.pacer
                        .acquire(&request.discord_identity, &request.route_key(), request.priority)
                        .await;
                    return self
                        .execute_and_report(&request, None, Some(reason), &executor)
                        .await;
                }
            }
        }
    }

    async fn execute_and_report<F, Fut, E>(
        &self,
        request: &PermitRequest,
        lease_id: Option<String>,
        fallback_reason: Option<String>,
        executor: &F,
    ) -> Result<ExecutorResponse, GateError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ExecutorResponse, E>>,
        E: std::error::Error,
    {
        let result = executor().await;
        let observed_at_unix_ms = now_unix_ms();

        let synthetic;
        let observed_response = match &result {
            Ok(resp) => resp,
            Err(_) => {
                synthetic = ExecutorResponse::synthetic_error();
                &synthetic
            }
        };

        let report = build_observation_report(
            request,
            observed_response,
            lease_id,
            fallback_reason,
            observed_at_unix_ms,
        );

        if self.client.report_result(&report).await.is_err() {
            self.stats.report_failures.fetch_add(1, Ordering::Relaxed);
            self.emit(GateEvent::ReportFailed {
                gate_name: self.name.clone(),
                timestamp: Instant::now(),
                priority: request.priority,
            });
        }

        result.map_err(GateError::Executor)
    }
}

fn build_observation_report(
    request: &PermitRequest,
    response: &ExecutorResponse,
    lease_id: Option<String>,
    fallback_reason: Option<String>,
    observed_at_unix_ms: u64,
) -> ObservationReport {
    ObservationReport {
        client_id: request.client_id.clone(),
        group_id: request.group_id.clone(),
        discord_identity: request.discord_identity.clone(),
        method: request.method.clone(),
        route: request.route.clone(),
        major_parameter: request.major_parameter.clone(),
        request_id: request.request_id.clone(),
        lease_id,
        status_code: response.status_code,
        x_ratelimit_bucket: response.rate_limit_bucket(),
        x_ratelimit_limit: response.rate_limit_limit(),
        x_ratelimit_remaining: response.rate_limit_remaining(),
        x_ratelimit_reset_after_s: response.rate_limit_reset_after_s(),
        x_ratelimit_scope: response
            .rate_limit_scope()
            .and_then(|s| RateLimitScope::parse(&s)),
        retry_after_ms: response.retry_after_ms(),
        fallback_reason,
        observed_at_unix_ms,
    }
}
