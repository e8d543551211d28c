//! End-to-end scenarios from SPEC_FULL §8, run against the real HTTP
//! surface: a `permit-server` router (backed by `permit_store::FakeStore`)
//! bound to a loopback socket, hit through `permit_client`'s production
//! `HttpArbiterClient` and `AdmissionGate`.
//!
//! Per-crate unit tests already exercise the algorithm in isolation
//! (`permit-store::fake_store`, `permit-server::routes`,
//! `permit-client::gate`); this file is the only place the whole stack is
//! wired together the way a real bot would use it.

use permit_client::{AdmissionGate, ArbiterClient, ExecutorResponse, GateConfig, HttpArbiterClient};
use permit_core::{DenyReason, Priority, RateLimitScope};
use permit_core::{ObservationReport, PermitRequest};
use permit_pacer::{LocalPacer, PacerConfigBuilder};
use permit_server::{ArbiterConfig, ArbiterState};
use permit_store::FakeStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running arbiter backed by a `FakeStore`, plus the base URL to reach it.
struct TestArbiter {
    base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestArbiter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn spawn_arbiter(config: ArbiterConfig) -> TestArbiter {
    let store = FakeStore::new(config.limits());
    let state = Arc::new(ArbiterState::new(store, config, None));
    state.start().await;
    let app = permit_server::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestArbiter {
        base_url: format!("http://{addr}"),
        handle,
    }
}

/// Binds a socket, then immediately drops the listener: the port is free
/// but nothing accepts connections on it, so a client dialing it sees a
/// fast, deterministic connection refusal (used for the arbiter-outage
/// scenario without relying on an unused-port guess).
async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn permit_request(identity: &str, major: &str) -> PermitRequest {
    PermitRequest {
        client_id: "bot-1".into(),
        group_id: "203.0.113.1".into(),
        discord_identity: identity.into(),
        method: "POST".into(),
        route: "/channels/{channel_id}/messages".into(),
        major_parameter: major.into(),
        priority: Priority::Normal,
        max_wait_ms: 0,
        request_id: String::new(),
    }
}

fn observation(group: &str, status_code: u16, scope: Option<RateLimitScope>) -> ObservationReport {
    ObservationReport {
        client_id: "bot-1".into(),
        group_id: group.into(),
        discord_identity: "identity-a".into(),
        method: "POST".into(),
        route: "/channels/{channel_id}/messages".into(),
        major_parameter: "123".into(),
        request_id: "obs-1".into(),
        lease_id: None,
        status_code,
        x_ratelimit_bucket: None,
        x_ratelimit_limit: None,
        x_ratelimit_remaining: None,
        x_ratelimit_reset_after_s: None,
        x_ratelimit_scope: scope,
        retry_after_ms: None,
        fallback_reason: None,
        observed_at_unix_ms: permit_core::now_unix_ms(),
    }
}

/// *Global cap* (SPEC §8): `GLOBAL_RPS=10`, 20 concurrent permit requests
/// for one identity inside the same second. Expect exactly 10 grants and
/// 10 denials, all denials reasoned `global_bucket_exhausted`.
#[tokio::test]
async fn global_cap_admits_exactly_the_configured_rps() {
    let config = ArbiterConfig {
        global_rps: 10,
        route_rps: 1000,
        ..ArbiterConfig::default()
    };
    let arbiter = spawn_arbiter(config).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let request = permit_request("identity-x", &i.to_string());
        let client = HttpArbiterClient::new(arbiter.base_url.clone());
        handles.push(tokio::spawn(async move {
            client
                .request_token(&request, Duration::from_secs(2))
                .await
                .unwrap()
        }));
    }

    let mut granted = 0;
    let mut denied_reasons = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        if response.granted {
            granted += 1;
        } else {
            denied_reasons.push(response.reason);
        }
    }

    assert_eq!(granted, 10, "exactly GLOBAL_RPS grants expected");
    assert_eq!(denied_reasons.len(), 10);
    assert!(denied_reasons
        .iter()
        .all(|r| *r == DenyReason::GlobalBucketExhausted));
}

/// *Route cap* (SPEC §8): `ROUTE_RPS=5`, same route/major but distinct
/// identities — each identity's route accounting is independent.
#[tokio::test]
async fn route_cap_is_isolated_per_identity() {
    let config = ArbiterConfig {
        global_rps: 1000,
        route_rps: 5,
        ..ArbiterConfig::default()
    };
    let arbiter = spawn_arbiter(config).await;
    let client = HttpArbiterClient::new(arbiter.base_url.clone());

    for identity in ["identity-a", "identity-b"] {
        let mut grants = 0;
        for i in 0..5 {
            let request = permit_request(identity, &i.to_string());
            // Same route/major regardless of loop index; major_parameter
            // only varies the request body, not the route key, since the
            // route key is fixed in `permit_request`'s route/method.
            let request = PermitRequest {
                major_parameter: "123".into(),
                ..request
            };
            let response = client
                .request_token(&request, Duration::from_secs(2))
                .await
                .unwrap();
            if response.granted {
                grants += 1;
            }
        }
        assert_eq!(grants, 5, "identity {identity} should get its own 5-rps budget");
    }

    // A 6th call for identity-a, same second, is denied.
    let sixth = client
        .request_token(
            &PermitRequest {
                major_parameter: "123".into(),
                ..permit_request("identity-a", "6")
            },
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    assert!(!sixth.granted);
    assert_eq!(sixth.reason, DenyReason::RouteBucketExhausted);
}

/// *Guardrail* (SPEC §8): `INVALID_THRESHOLD=3`, three `429/user` reports
/// for a group trip the guardrail; the next permit for that group is
/// denied with `invalid_guardrail_active`.
#[tokio::test]
async fn guardrail_trips_after_invalid_threshold_reports() {
    let config = ArbiterConfig {
        invalid_threshold: 3,
        ..ArbiterConfig::default()
    };
    let arbiter = spawn_arbiter(config).await;
    let client = HttpArbiterClient::new(arbiter.base_url.clone());

    for _ in 0..3 {
        client
            .report_result(&observation("198.51.100.7", 429, Some(RateLimitScope::User)))
            .await
            .unwrap();
    }

    let request = PermitRequest {
        group_id: "198.51.100.7".into(),
        ..permit_request("identity-a", "1")
    };
    let response = client
        .request_token(&request, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(!response.granted);
    assert_eq!(response.reason, DenyReason::InvalidGuardrailActive);
}

/// *Shared 429 ignored* (SPEC §8): a `429/shared` observation never
/// increments the invalid counter, so it alone can't trip the guardrail.
#[tokio::test]
async fn shared_scope_429_does_not_trip_the_guardrail() {
    let config = ArbiterConfig {
        invalid_threshold: 1,
        ..ArbiterConfig::default()
    };
    let arbiter = spawn_arbiter(config).await;
    let client = HttpArbiterClient::new(arbiter.base_url.clone());

    client
        .report_result(&observation(
            "198.51.100.8",
            429,
            Some(RateLimitScope::Shared),
        ))
        .await
        .unwrap();

    let request = PermitRequest {
        group_id: "198.51.100.8".into(),
        ..permit_request("identity-a", "1")
    };
    let response = client
        .request_token(&request, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(response.granted);
}

/// *Round-trip law* (SPEC §8): an observation carrying rate-limit headers
/// leaves a bucket mapping the next permit decision actually consults —
/// exhausting the observed bucket denies the very next permit for that
/// `(identity, bucket, major)` with `bucket_exhausted`.
#[tokio::test]
async fn observed_bucket_state_is_consulted_by_the_next_permit_decision() {
    let arbiter = spawn_arbiter(ArbiterConfig::default()).await;
    let client = HttpArbiterClient::new(arbiter.base_url.clone());

    let mut report = observation("203.0.113.9", 200, Some(RateLimitScope::User));
    report.x_ratelimit_bucket = Some("bucket-xyz".into());
    report.x_ratelimit_limit = Some(5);
    report.x_ratelimit_remaining = Some(0);
    report.x_ratelimit_reset_after_s = Some(5.0);
    client.report_result(&report).await.unwrap();

    let request = permit_request("identity-a", "123");
    let response = client
        .request_token(&request, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(!response.granted);
    assert_eq!(response.reason, DenyReason::BucketExhausted);
}

/// *Arbiter outage fallback* (SPEC §8): with the arbiter unreachable, the
/// gate falls back to the Local Pacer, still executes the call, and a
/// best-effort report attempt doesn't blow up the call.
#[tokio::test]
async fn arbiter_outage_falls_back_to_local_pacer_and_still_executes() {
    let base_url = unreachable_base_url().await;
    let pacer = Arc::new(LocalPacer::new(PacerConfigBuilder::new().build()));
    let gate = AdmissionGate::connect(
        GateConfig::builder(base_url)
            .configured_timeout(Duration::from_millis(300))
            .build(),
        pacer,
    );

    let executed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let executed_clone = Arc::clone(&executed);
    let result = gate
        .with_permit(permit_request("identity-a", "1"), move || {
            let executed = Arc::clone(&executed_clone);
            async move {
                executed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, std::convert::Infallible>(ExecutorResponse::new(200, HashMap::new()))
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(executed.load(std::sync::atomic::Ordering::SeqCst), 1);
}

// Retry exhaustion against an always-denying arbiter (SPEC §8's literal
// `maxRetries=3` scenario) is covered in `permit-client`'s own test suite
// (`crates/permit-client/src/gate.rs`), where a scripted `ArbiterClient`
// can deny without the real guardrail's cooldown dictating the test's
// wall-clock time.

/// `healthz` reports healthy against a reachable `FakeStore`-backed arbiter.
#[tokio::test]
async fn healthz_is_healthy_against_a_reachable_store() {
    let arbiter = spawn_arbiter(ArbiterConfig::default()).await;
    let resp = reqwest::get(format!("{}/healthz", arbiter.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}
