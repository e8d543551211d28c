//! The gate's connection to the Arbiter Service (SPEC §4.4/§4.5).
//!
//! Kept as a trait, not a concrete `reqwest::Client` field, so tests can
//! swap in an in-process fake that talks directly to `permit_server`'s
//! router without binding a socket.

use crate::error::ArbiterClientError;
use async_trait::async_trait;
use permit_core::{ObservationReport, PermitRequest, PermitResponse};
use std::time::Duration;

/// What [`crate::gate::AdmissionGate`] needs from an arbiter connection.
#[async_trait]
pub trait ArbiterClient: Send + Sync {
    async fn request_token(
        &self,
        request: &PermitRequest,
        timeout: Duration,
    ) -> Result<PermitResponse, ArbiterClientError>;

    /// Best-effort; the gate never treats this call's failure as fatal
    /// (SPEC §4.4: "Always returns success; failures are recorded as
    /// internal counters").
    async fn report_result(
        &self,
        report: &ObservationReport,
    ) -> Result<(), ArbiterClientError>;
}

/// The production [`ArbiterClient`], talking to a `permit-server` instance
/// over HTTP via `reqwest`.
pub struct HttpArbiterClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpArbiterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ArbiterClient for HttpArbiterClient {
    async fn request_token(
        &self,
        request: &PermitRequest,
        timeout: Duration,
    ) -> Result<PermitResponse, ArbiterClientError> {
        let url = format!("{}/request_token", self.base_url);
        let response = self
            .http
            .post(url)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(ArbiterClientError::HttpStatus(response.status().as_u16()));
        }

        response
            .json::<PermitResponse>()
            .await
            .map_err(|e| ArbiterClientError::Decode(e.to_string()))
    }

    async fn report_result(
        &self,
        report: &ObservationReport,
    ) -> Result<(), ArbiterClientError> {
        let url = format!("{}/report_result", self.base_url);
        let response = self
            .http
            .post(url)
            .json(report)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(ArbiterClientError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ArbiterClientError {
    if err.is_timeout() {
        ArbiterClientError::Timeout
    } else {
        ArbiterClientError::Network(err.to_string())
    }
}
