//! Redis-backed [`Store`].
//!
//! The two scripts below are loaded once and invoked by SHA; `redis::Script`
//! handles the `EVALSHA` → `NOSCRIPT` → `SCRIPT LOAD` → `EVALSHA` fallback
//! internally, so this module never has to retry by hand.

use crate::error::StoreError;
use async_trait::async_trait;
use permit_core::{
    DenyReason, Limits, ObservationOutcome, ObservationReport, PermitDecision, PermitRequest, Store,
};
use redis::aio::ConnectionManager;
use redis::Script;

const PERMIT_SCRIPT: &str = include_str!("lua/permit.lua");
const OBSERVE_SCRIPT: &str = include_str!("lua/observe.lua");

/// A [`Store`] backed by a single Redis deployment (SPEC §4.1).
///
/// Clone is cheap: [`ConnectionManager`] is itself a handle around a
/// reconnecting multiplexed connection, and the two [`Script`] values are
/// immutable script bodies, not open connections.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    permit_script: Script,
    observe_script: Script,
    limits: Limits,
}

impl RedisStore {
    /// Connects to `redis_url` and prepares both scripts.
    pub async fn connect(redis_url: &str, limits: Limits) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self::from_connection_manager(manager, limits))
    }

    /// Builds a store around an already-established [`ConnectionManager`].
    pub fn from_connection_manager(manager: ConnectionManager, limits: Limits) -> Self {
        Self {
            manager,
            permit_script: Script::new(PERMIT_SCRIPT),
            observe_script: Script::new(OBSERVE_SCRIPT),
            limits,
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    type Error = StoreError;

    async fn decide_permit(
        &self,
        request: &PermitRequest,
        now_unix_ms: u64,
    ) -> Result<PermitDecision, Self::Error> {
        let mut conn = self.manager.clone();
        let (granted, retry_after_ms, reason): (i64, i64, String) = self
            .permit_script
            .arg(&request.group_id)
            .arg(&request.discord_identity)
            .arg(&request.method)
            .arg(&request.route)
            .arg(&request.major_parameter)
            .arg(now_unix_ms)
            .arg(self.limits.global_rps)
            .arg(self.limits.route_rps)
            .arg(self.limits.min_retry.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;

        let reason = DenyReason::parse(&reason)
            .ok_or_else(|| StoreError::UnexpectedReply(format!("unknown reason {reason:?}")))?;

        Ok(PermitDecision {
            granted: granted != 0,
            retry_after_ms: retry_after_ms.max(0) as u64,
            reason,
        })
    }

    async fn ingest_observation(
        &self,
        report: &ObservationReport,
    ) -> Result<ObservationOutcome, Self::Error> {
        let mut conn = self.manager.clone();

        let bucket = report.x_ratelimit_bucket.clone().unwrap_or_default();
        let limit = report.x_ratelimit_limit.map(|v| v as i64).unwrap_or(-1);
        let remaining = report.x_ratelimit_remaining.map(|v| v as i64).unwrap_or(-1);
        let reset_after_s = report.x_ratelimit_reset_after_s.unwrap_or(-1.0);
        let scope = report
            .x_ratelimit_scope
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();

        let tripped: i64 = self
            .observe_script
            .arg(&report.group_id)
            .arg(&report.discord_identity)
            .arg(&report.method)
            .arg(&report.route)
            .arg(&report.major_parameter)
            .arg(report.status_code)
            .arg(bucket)
            .arg(limit)
            .arg(remaining)
            .arg(reset_after_s)
            .arg(scope)
            .arg(report.observed_at_unix_ms)
            .arg(self.limits.invalid_threshold)
            .arg(self.limits.guardrail_cooldown.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;

        Ok(ObservationOutcome {
            guardrail_tripped: tripped != 0,
        })
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
