//! HTTP handlers for the Arbiter Service (SPEC §4.4/§6).
//!
//! Shaped directly on `psenger-throttler`'s handler module: thin `async fn`s
//! taking `State<SharedState<S>>` plus `Json<...>` extractors, returning
//! `Result<impl IntoResponse, ServerError>` (or a bare `impl IntoResponse`
//! for the endpoints that never fail).

use crate::error::ServerError;
use crate::state::{ArbiterState, SharedState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use permit_core::{now_unix_ms, DenyReason, ObservationReport, PermitRequest, PermitResponse, Store};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Builds the Arbiter Service's axum [`Router`] over a given [`Store`]
/// implementation, generic so tests can swap in `permit_store::FakeStore`.
pub fn router<S: Store + 'static>(state: SharedState<S>) -> Router {
    Router::new()
        .route("/request_token", post(request_token::<S>))
        .route("/report_result", post(report_result::<S>))
        .route("/healthz", get(healthz::<S>))
        .route("/metrics", get(metrics_endpoint::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /request_token` (SPEC §4.4).
///
/// Invokes the Atomic Permit Script via the store; if `max_wait_ms > 0` and
/// the first decision denies with `retry_after_ms <= max_wait_ms`, sleeps
/// up to that bound and re-invokes once before returning.
pub async fn request_token<S: Store>(
    State(state): State<SharedState<S>>,
    Json(payload): Json<PermitRequest>,
) -> Result<Json<PermitResponse>, ServerError> {
    if payload.discord_identity.is_empty() {
        return Err(ServerError::InvalidPayload(
            "discord_identity is required".into(),
        ));
    }
    if payload.method.is_empty() || payload.route.is_empty() {
        return Err(ServerError::InvalidPayload(
            "method and route are required".into(),
        ));
    }

    let request = payload.with_generated_request_id();
    let now = now_unix_ms();
    let mut response = decide(&state, &request, now).await;

    if request.max_wait_ms > 0 {
        if let Some(retry_after_ms) = response.retry_after_ms {
            if retry_after_ms <= request.max_wait_ms {
                tokio::time::sleep(Duration::from_millis(retry_after_ms)).await;
                let now = now_unix_ms();
                response = decide(&state, &request, now).await;
            }
        }
    }

    Ok(Json(response))
}

/// Runs one Atomic Permit Script invocation and applies the arbiter's
/// failure disposition (SPEC §4.4/§7) when the store itself errors.
async fn decide<S: Store>(
    state: &ArbiterState<S>,
    request: &PermitRequest,
    now_ms: u64,
) -> PermitResponse {
    match state.store.decide_permit(request, now_ms).await {
        Ok(decision) => {
            metrics::counter!(
                "permit_requests_total",
                "granted" => decision.granted.to_string(),
                "reason" => decision.reason.to_string(),
            )
            .increment(1);

            if decision.granted {
                PermitResponse::granted(now_ms, Uuid::new_v4().to_string())
            } else {
                let retry_after_ms = decision
                    .retry_after_ms
                    .max(state.config.limits().min_retry.as_millis() as u64);
                PermitResponse::denied(now_ms, retry_after_ms, decision.reason)
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "shared counter store error inside permit decision");
            metrics::counter!("permit_store_errors_total", "path" => "decide").increment(1);

            if state.config.fail_open {
                state
                    .fallback
                    .acquire(&request.discord_identity, &request.route_key(), request.priority)
                    .await;
                PermitResponse {
                    granted: true,
                    not_before_unix_ms: now_ms,
                    retry_after_ms: None,
                    lease_id: Some(Uuid::new_v4().to_string()),
                    reason: DenyReason::ScsUnavailable,
                }
            } else {
                let retry_after_ms = state.config.limits().min_retry.as_millis() as u64;
                PermitResponse::denied(now_ms, retry_after_ms, DenyReason::ScsUnavailable)
            }
        }
    }
}

/// `POST /report_result` (SPEC §4.4). Always returns success: ingestion
/// failures are recorded as an internal counter rather than surfaced,
/// since observations are advisory (SPEC §7).
pub async fn report_result<S: Store>(
    State(state): State<SharedState<S>>,
    Json(report): Json<ObservationReport>,
) -> impl IntoResponse {
    match state.store.ingest_observation(&report).await {
        Ok(outcome) => {
            if outcome.guardrail_tripped {
                tracing::warn!(group_id = %report.group_id, "invalid-request guardrail tripped");
                metrics::counter!("permit_guardrail_trips_total").increment(1);
            }
        }
        Err(err) => {
            state.report_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, "observation ingestion failed; dropped");
            metrics::counter!("permit_store_errors_total", "path" => "observe").increment(1);
        }
    }

    Json(json!({ "ok": true }))
}

/// `GET /healthz` (SPEC §4.4): succeeds only when the store answers a
/// `PING` within [`ArbiterConfig::healthz_timeout`].
pub async fn healthz<S: Store>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    match tokio::time::timeout(state.config.healthz_timeout(), state.store.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "healthz: store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "error": err.to_string() })),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "error": "store ping timed out" })),
        ),
    }
}

/// `GET /metrics`: renders the process's Prometheus text exposition, or an
/// explanatory placeholder if no recorder was installed.
pub async fn metrics_endpoint<S: Store>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    if let Some(handle) = &state.metrics_handle {
        (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response()
    } else {
        (StatusCode::OK, "# no metrics recorder installed\n").into_response()
    }
}
