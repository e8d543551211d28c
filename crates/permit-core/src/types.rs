//! Wire types shared by the arbiter service and its clients.
//!
//! Field names here are an interoperability requirement (SPEC §6): any
//! component speaking this protocol, in any language, must use these exact
//! JSON keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stable opaque label for a caller principal toward the external API
/// (typically a hash of credentials). Keys the *global* limit scope.
pub type Identity = String;

/// A coarse label representing a shared blast-radius unit (commonly a
/// public egress address). Keys the *invalid-request guardrail*.
pub type Group = String;

/// Relative importance of a permit request.
///
/// The admission algorithm itself is priority-blind (SPEC §4.2): `priority`
/// never changes whether a permit is granted. It is still carried end to
/// end so operators can tell, from telemetry, whether high-priority calls
/// are being starved by callers that don't deserve the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// The reason a permit was denied, or `Ok` when granted.
///
/// Serializes to the exact lowercase reason codes listed in SPEC §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Ok,
    GlobalBucketExhausted,
    RouteBucketExhausted,
    BucketExhausted,
    InvalidGuardrailActive,
    ScsUnavailable,
}

impl DenyReason {
    /// Whether this reason represents a grant rather than a denial.
    pub fn is_ok(&self) -> bool {
        matches!(self, DenyReason::Ok)
    }

    /// Parses the snake_case reason code produced by [`Self::Display`]
    /// (and by the Atomic Permit Script / Observation Ingester replies).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ok" => DenyReason::Ok,
            "global_bucket_exhausted" => DenyReason::GlobalBucketExhausted,
            "route_bucket_exhausted" => DenyReason::RouteBucketExhausted,
            "bucket_exhausted" => DenyReason::BucketExhausted,
            "invalid_guardrail_active" => DenyReason::InvalidGuardrailActive,
            "scs_unavailable" => DenyReason::ScsUnavailable,
            _ => return None,
        })
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenyReason::Ok => "ok",
            DenyReason::GlobalBucketExhausted => "global_bucket_exhausted",
            DenyReason::RouteBucketExhausted => "route_bucket_exhausted",
            DenyReason::BucketExhausted => "bucket_exhausted",
            DenyReason::InvalidGuardrailActive => "invalid_guardrail_active",
            DenyReason::ScsUnavailable => "scs_unavailable",
        };
        f.write_str(s)
    }
}

/// A logical endpoint partition whose limits are correlated (SPEC §3).
///
/// `route_pattern` is already-templated (path parameters replaced by
/// placeholders); `major_parameter` is the value of the top-level
/// identifier the external API treats as affecting per-route accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: String,
    pub route_pattern: String,
    pub major_parameter: String,
}

impl RouteKey {
    pub fn new(
        method: impl Into<String>,
        route_pattern: impl Into<String>,
        major_parameter: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            route_pattern: route_pattern.into(),
            major_parameter: major_parameter.into(),
        }
    }
}

/// A request for permission to attempt one external call (SPEC §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitRequest {
    pub client_id: String,
    pub group_id: Group,
    pub discord_identity: Identity,
    pub method: String,
    pub route: String,
    pub major_parameter: String,
    #[serde(default)]
    pub priority: Priority,
    pub max_wait_ms: u64,
    pub request_id: String,
}

impl PermitRequest {
    /// Returns a [`RouteKey`] built from this request's method/route/major.
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(
            self.method.clone(),
            self.route.clone(),
            self.major_parameter.clone(),
        )
    }

    /// Fills in `request_id` with a fresh UUIDv4 if the caller left it
    /// empty, matching CAG's "fresh request_id if absent" behavior (§4.5).
    pub fn with_generated_request_id(mut self) -> Self {
        if self.request_id.is_empty() {
            self.request_id = Uuid::new_v4().to_string();
        }
        self
    }
}

/// The arbiter's answer to a [`PermitRequest`] (SPEC §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitResponse {
    pub granted: bool,
    pub not_before_unix_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    pub reason: DenyReason,
}

impl PermitResponse {
    pub fn granted(not_before_unix_ms: u64, lease_id: String) -> Self {
        Self {
            granted: true,
            not_before_unix_ms,
            retry_after_ms: None,
            lease_id: Some(lease_id),
            reason: DenyReason::Ok,
        }
    }

    pub fn denied(not_before_unix_ms: u64, retry_after_ms: u64, reason: DenyReason) -> Self {
        Self {
            granted: false,
            not_before_unix_ms,
            retry_after_ms: Some(retry_after_ms),
            lease_id: None,
            reason,
        }
    }
}

/// The scope the external API attaches to a rate-limit bucket, carried on
/// observation reports (SPEC §4.3: `shared`-scope 429s don't count toward
/// the invalid-request guardrail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    User,
    Global,
    Shared,
}

impl RateLimitScope {
    /// The lowercase wire form, matching this enum's `serde` representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::User => "user",
            RateLimitScope::Global => "global",
            RateLimitScope::Shared => "shared",
        }
    }

    /// Parses the lowercase `X-RateLimit-Scope` header value CAG reads off
    /// the executor's response (SPEC §6).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "user" => RateLimitScope::User,
            "global" => RateLimitScope::Global,
            "shared" => RateLimitScope::Shared,
            _ => return None,
        })
    }
}

/// What CAG observed after executing one external call (SPEC §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationReport {
    pub client_id: String,
    pub group_id: Group,
    pub discord_identity: Identity,
    pub method: String,
    pub route: String,
    pub major_parameter: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,

    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_ratelimit_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_ratelimit_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_ratelimit_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_ratelimit_reset_after_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_ratelimit_scope: Option<RateLimitScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub observed_at_unix_ms: u64,
}

impl ObservationReport {
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(
            self.method.clone(),
            self.route.clone(),
            self.major_parameter.clone(),
        )
    }

    /// Whether this report's status should count toward the invalid-request
    /// guardrail (SPEC §4.3): 401/403 always do, 429 does unless its scope
    /// is `shared`.
    pub fn counts_as_invalid(&self) -> bool {
        match self.status_code {
            401 | 403 => true,
            429 => !matches!(self.x_ratelimit_scope, Some(RateLimitScope::Shared)),
            _ => false,
        }
    }
}

/// Returns the current wall-clock time as unsigned milliseconds since the
/// epoch, the clock basis used throughout this system (SPEC §9).
pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_reason_round_trips_through_json() {
        let json = serde_json::to_string(&DenyReason::GlobalBucketExhausted).unwrap();
        assert_eq!(json, "\"global_bucket_exhausted\"");
        let back: DenyReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DenyReason::GlobalBucketExhausted);
    }

    #[test]
    fn permit_request_generates_id_only_when_absent() {
        let req = PermitRequest {
            client_id: "bot-1".into(),
            group_id: "1.2.3.4".into(),
            discord_identity: "identity-a".into(),
            method: "POST".into(),
            route: "/channels/{channel_id}/messages".into(),
            major_parameter: "123".into(),
            priority: Priority::Normal,
            max_wait_ms: 0,
            request_id: String::new(),
        };
        let filled = req.with_generated_request_id();
        assert!(!filled.request_id.is_empty());

        let req2 = PermitRequest {
            request_id: "keep-me".into(),
            ..filled.clone()
        };
        let unchanged = req2.with_generated_request_id();
        assert_eq!(unchanged.request_id, "keep-me");
    }

    #[test]
    fn shared_scope_429_does_not_count_as_invalid() {
        let report = ObservationReport {
            client_id: "bot-1".into(),
            group_id: "1.2.3.4".into(),
            discord_identity: "identity-a".into(),
            method: "POST".into(),
            route: "/x".into(),
            major_parameter: "1".into(),
            request_id: "r1".into(),
            lease_id: None,
            status_code: 429,
            x_ratelimit_bucket: None,
            x_ratelimit_limit: None,
            x_ratelimit_remaining: None,
            x_ratelimit_reset_after_s: None,
            x_ratelimit_scope: Some(RateLimitScope::Shared),
            retry_after_ms: None,
            fallback_reason: None,
            observed_at_unix_ms: now_unix_ms(),
        };
        assert!(!report.counts_as_invalid());
    }

    #[test]
    fn deny_reason_parse_round_trips_display() {
        for reason in [
            DenyReason::Ok,
            DenyReason::GlobalBucketExhausted,
            DenyReason::RouteBucketExhausted,
            DenyReason::BucketExhausted,
            DenyReason::InvalidGuardrailActive,
            DenyReason::ScsUnavailable,
        ] {
            assert_eq!(DenyReason::parse(&reason.to_string()), Some(reason));
        }
        assert_eq!(DenyReason::parse("nonsense"), None);
    }

    #[test]
    fn user_scope_429_counts_as_invalid() {
        let mut report_json = serde_json::json!({
            "client_id": "bot-1",
            "group_id": "1.2.3.4",
            "discord_identity": "identity-a",
            "method": "POST",
            "route": "/x",
            "major_parameter": "1",
            "request_id": "r1",
            "status_code": 429,
            "x_ratelimit_scope": "user",
            "observed_at_unix_ms": 0,
        });
        report_json["observed_at_unix_ms"] = serde_json::json!(now_unix_ms());
        let report: ObservationReport = serde_json::from_value(report_json).unwrap();
        assert!(report.counts_as_invalid());
    }
}
