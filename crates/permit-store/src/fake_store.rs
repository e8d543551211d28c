//! An in-memory [`Store`] that reproduces the Atomic Permit Script and
//! Observation Ingester in plain Rust, for tests that shouldn't need a live
//! Redis (SPEC §8's scenarios are written against this implementation).
//!
//! Every method here mirrors a section of `lua/permit.lua` /
//! `lua/observe.lua` one-to-one; keep the two in step if either changes.

use permit_core::{
    DenyReason, Limits, ObservationOutcome, ObservationReport, PermitDecision, PermitRequest,
    RateLimitScope, RouteKey, Store,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct BucketState {
    remaining: i64,
    reset_at_unix_ms: u64,
    observed_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SecondKey<K> {
    key: K,
    second: u64,
}

#[derive(Default)]
struct Inner {
    guard_until: HashMap<String, u64>,
    bucket_map: HashMap<RouteKey, String>,
    bucket_state: HashMap<(String, String, String), BucketState>,
    global_counters: HashMap<SecondKey<String>, u32>,
    route_counters: HashMap<SecondKey<(String, RouteKey)>, u32>,
    invalid_counts: HashMap<String, (u32, u64)>,
}

/// An in-memory [`Store`] for tests and local development.
///
/// Behind a [`Mutex`] rather than sharded per-key locks: test workloads are
/// small and correctness-focused, not throughput-focused, so the simplest
/// implementation that can't race is the right one here.
pub struct FakeStore {
    limits: Limits,
    inner: Mutex<Inner>,
}

impl FakeStore {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn retry_after(min_retry_ms: u64, now_ms: u64, target_ms: u64) -> u64 {
        target_ms.saturating_sub(now_ms).max(min_retry_ms)
    }
}

#[async_trait::async_trait]
impl Store for FakeStore {
    type Error = Infallible;

    async fn decide_permit(
        &self,
        request: &PermitRequest,
        now_unix_ms: u64,
    ) -> Result<PermitDecision, Self::Error> {
        let min_retry_ms = self.limits.min_retry.as_millis() as u64;
        let second = now_unix_ms / 1000;
        let next_second_ms = (second + 1) * 1000;
        let route_key = request.route_key();

        let mut inner = self.inner.lock().unwrap();

        if let Some(&until) = inner.guard_until.get(&request.group_id) {
            if until > now_unix_ms {
                return Ok(PermitDecision {
                    granted: false,
                    retry_after_ms: Self::retry_after(min_retry_ms, now_unix_ms, until),
                    reason: DenyReason::InvalidGuardrailActive,
                });
            }
        }

        let bucket_id = inner.bucket_map.get(&route_key).cloned();
        let bucket_state_key = bucket_id.as_ref().map(|id| {
            (
                request.discord_identity.clone(),
                id.clone(),
                request.major_parameter.clone(),
            )
        });

        if let Some(key) = &bucket_state_key {
            if let Some(state) = inner.bucket_state.get(key) {
                if state.remaining <= 0 && state.reset_at_unix_ms > now_unix_ms {
                    let retry_after_ms =
                        Self::retry_after(min_retry_ms, now_unix_ms, state.reset_at_unix_ms);
                    return Ok(PermitDecision {
                        granted: false,
                        retry_after_ms,
                        reason: DenyReason::BucketExhausted,
                    });
                }
            }
        }

        let global_entry = inner
            .global_counters
            .entry(SecondKey {
                key: request.discord_identity.clone(),
                second,
            })
            .or_insert(0);
        *global_entry += 1;
        if *global_entry > self.limits.global_rps {
            return Ok(PermitDecision {
                granted: false,
                retry_after_ms: Self::retry_after(min_retry_ms, now_unix_ms, next_second_ms),
                reason: DenyReason::GlobalBucketExhausted,
            });
        }

        let route_entry = inner
            .route_counters
            .entry(SecondKey {
                key: (request.discord_identity.clone(), route_key),
                second,
            })
            .or_insert(0);
        *route_entry += 1;
        if *route_entry > self.limits.route_rps {
            return Ok(PermitDecision {
                granted: false,
                retry_after_ms: Self::retry_after(min_retry_ms, now_unix_ms, next_second_ms),
                reason: DenyReason::RouteBucketExhausted,
            });
        }

        if let Some(key) = &bucket_state_key {
            if let Some(state) = inner.bucket_state.get_mut(key) {
                if state.remaining > 0 {
                    state.remaining -= 1;
                }
            }
        }

        Ok(PermitDecision {
            granted: true,
            retry_after_ms: min_retry_ms,
            reason: DenyReason::Ok,
        })
    }

    async fn ingest_observation(
        &self,
        report: &ObservationReport,
    ) -> Result<ObservationOutcome, Self::Error> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(bucket) = &report.x_ratelimit_bucket {
            inner.bucket_map.insert(report.route_key(), bucket.clone());

            if let (Some(limit), Some(remaining), Some(reset_after_s)) = (
                report.x_ratelimit_limit,
                report.x_ratelimit_remaining,
                report.x_ratelimit_reset_after_s,
            ) {
                let _ = limit;
                let key = (
                    report.discord_identity.clone(),
                    bucket.clone(),
                    report.major_parameter.clone(),
                );
                let should_write = match inner.bucket_state.get(&key) {
                    Some(existing) => existing.observed_at_unix_ms <= report.observed_at_unix_ms,
                    None => true,
                };
                if should_write {
                    let reset_at_unix_ms =
                        report.observed_at_unix_ms + (reset_after_s * 1000.0) as u64;
                    inner.bucket_state.insert(
                        key,
                        BucketState {
                            remaining: remaining as i64,
                            reset_at_unix_ms,
                            observed_at_unix_ms: report.observed_at_unix_ms,
                        },
                    );
                }
            }
        }

        if !report.counts_as_invalid() {
            return Ok(ObservationOutcome::default());
        }

        let (count, window_start) = inner
            .invalid_counts
            .entry(report.group_id.clone())
            .or_insert((0, report.observed_at_unix_ms));
        if report.observed_at_unix_ms.saturating_sub(*window_start) > 600_000 {
            *count = 0;
            *window_start = report.observed_at_unix_ms;
        }
        *count += 1;

        if *count < self.limits.invalid_threshold {
            return Ok(ObservationOutcome::default());
        }

        inner.guard_until.insert(
            report.group_id.clone(),
            report.observed_at_unix_ms + self.limits.guardrail_cooldown.as_millis() as u64,
        );
        Ok(ObservationOutcome {
            guardrail_tripped: true,
        })
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_core::{now_unix_ms, Priority};

    fn request(identity: &str, major: &str) -> PermitRequest {
        PermitRequest {
            client_id: "bot-1".into(),
            group_id: "1.2.3.4".into(),
            discord_identity: identity.into(),
            method: "POST".into(),
            route: "/channels/{channel_id}/messages".into(),
            major_parameter: major.into(),
            priority: Priority::Normal,
            max_wait_ms: 0,
            request_id: "r1".into(),
        }
    }

    #[tokio::test]
    async fn global_cap_denies_after_limit() {
        let limits = Limits {
            global_rps: 2,
            ..Limits::default()
        };
        let store = FakeStore::new(limits);
        let now = now_unix_ms();

        let a = store.decide_permit(&request("id-1", "1"), now).await.unwrap();
        let b = store.decide_permit(&request("id-1", "2"), now).await.unwrap();
        let c = store.decide_permit(&request("id-1", "3"), now).await.unwrap();

        assert!(a.granted);
        assert!(b.granted);
        assert!(!c.granted);
        assert_eq!(c.reason, DenyReason::GlobalBucketExhausted);
    }

    #[tokio::test]
    async fn route_cap_is_independent_per_identity() {
        let limits = Limits {
            global_rps: 100,
            route_rps: 1,
            ..Limits::default()
        };
        let store = FakeStore::new(limits);
        let now = now_unix_ms();

        let a = store.decide_permit(&request("id-1", "1"), now).await.unwrap();
        let b = store.decide_permit(&request("id-2", "1"), now).await.unwrap();
        let c = store.decide_permit(&request("id-1", "1"), now).await.unwrap();

        assert!(a.granted);
        assert!(b.granted, "a different identity's route cap is independent");
        assert!(!c.granted);
        assert_eq!(c.reason, DenyReason::RouteBucketExhausted);
    }

    #[tokio::test]
    async fn guardrail_trips_after_invalid_threshold_and_blocks_permits() {
        let limits = Limits {
            invalid_threshold: 3,
            ..Limits::default()
        };
        let store = FakeStore::new(limits);
        let now = now_unix_ms();

        for _ in 0..3 {
            let report = ObservationReport {
                client_id: "bot-1".into(),
                group_id: "1.2.3.4".into(),
                discord_identity: "id-1".into(),
                method: "POST".into(),
                route: "/x".into(),
                major_parameter: "1".into(),
                request_id: "r".into(),
                lease_id: None,
                status_code: 401,
                x_ratelimit_bucket: None,
                x_ratelimit_limit: None,
                x_ratelimit_remaining: None,
                x_ratelimit_reset_after_s: None,
                x_ratelimit_scope: None,
                retry_after_ms: None,
                fallback_reason: None,
                observed_at_unix_ms: now,
            };
            store.ingest_observation(&report).await.unwrap();
        }

        let decision = store.decide_permit(&request("id-1", "1"), now).await.unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.reason, DenyReason::InvalidGuardrailActive);
    }

    #[tokio::test]
    async fn guardrail_retry_after_is_floored_near_expiry() {
        let limits = Limits {
            invalid_threshold: 1,
            guardrail_cooldown: std::time::Duration::from_millis(3),
            min_retry: std::time::Duration::from_millis(50),
            ..Limits::default()
        };
        let store = FakeStore::new(limits);
        let now = now_unix_ms();

        let report = ObservationReport {
            client_id: "bot-1".into(),
            group_id: "1.2.3.4".into(),
            discord_identity: "id-1".into(),
            method: "POST".into(),
            route: "/x".into(),
            major_parameter: "1".into(),
            request_id: "r".into(),
            lease_id: None,
            status_code: 401,
            x_ratelimit_bucket: None,
            x_ratelimit_limit: None,
            x_ratelimit_remaining: None,
            x_ratelimit_reset_after_s: None,
            x_ratelimit_scope: None,
            retry_after_ms: None,
            fallback_reason: None,
            observed_at_unix_ms: now,
        };
        store.ingest_observation(&report).await.unwrap();

        // The guardrail's own TTL (3ms) is well under MIN_RETRY_MS (50ms);
        // the decision must still floor retry_after_ms, not return the raw
        // remaining TTL.
        let decision = store.decide_permit(&request("id-1", "1"), now).await.unwrap();
        assert!(!decision.granted);
        assert!(decision.retry_after_ms >= 50);
    }

    #[tokio::test]
    async fn shared_scope_429_does_not_trip_guardrail() {
        let limits = Limits {
            invalid_threshold: 1,
            ..Limits::default()
        };
        let store = FakeStore::new(limits);
        let now = now_unix_ms();

        let report = ObservationReport {
            client_id: "bot-1".into(),
            group_id: "1.2.3.4".into(),
            discord_identity: "id-1".into(),
            method: "POST".into(),
            route: "/x".into(),
            major_parameter: "1".into(),
            request_id: "r".into(),
            lease_id: None,
            status_code: 429,
            x_ratelimit_bucket: None,
            x_ratelimit_limit: None,
            x_ratelimit_remaining: None,
            x_ratelimit_reset_after_s: None,
            x_ratelimit_scope: Some(RateLimitScope::Shared),
            retry_after_ms: None,
            fallback_reason: None,
            observed_at_unix_ms: now,
        };
        let outcome = store.ingest_observation(&report).await.unwrap();
        assert!(!outcome.guardrail_tripped);

        let decision = store.decide_permit(&request("id-1", "1"), now).await.unwrap();
        assert!(decision.granted);
    }

    #[tokio::test]
    async fn observed_bucket_exhaustion_denies_before_the_scs_would_even_be_hit() {
        let store = FakeStore::new(Limits::default());
        let now = now_unix_ms();

        let report = ObservationReport {
            client_id: "bot-1".into(),
            group_id: "1.2.3.4".into(),
            discord_identity: "id-1".into(),
            method: "POST".into(),
            route: "/channels/{channel_id}/messages".into(),
            major_parameter: "1".into(),
            request_id: "r".into(),
            lease_id: None,
            status_code: 200,
            x_ratelimit_bucket: Some("bucket-a".into()),
            x_ratelimit_limit: Some(5),
            x_ratelimit_remaining: Some(0),
            x_ratelimit_reset_after_s: Some(5.0),
            x_ratelimit_scope: Some(RateLimitScope::User),
            retry_after_ms: None,
            fallback_reason: None,
            observed_at_unix_ms: now,
        };
        store.ingest_observation(&report).await.unwrap();

        let decision = store.decide_permit(&request("id-1", "1"), now).await.unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.reason, DenyReason::BucketExhausted);
    }
}
