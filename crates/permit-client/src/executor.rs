//! The executor contract CAG invokes after a permit is granted or the gate
//! falls back to the Local Pacer (SPEC §4.5).

use std::collections::HashMap;

/// What an executor closure returns on success: an HTTP status code and
/// response headers. CAG normalizes header keys to lower case before
/// reading them, so callers may hand in headers in whatever case the
/// underlying HTTP client produced.
#[derive(Debug, Clone)]
pub struct ExecutorResponse {
    pub status_code: u16,
    headers: HashMap<String, String>,
    body_retry_after_ms: Option<u64>,
}

impl ExecutorResponse {
    pub fn new(status_code: u16, headers: HashMap<String, String>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status_code,
            headers,
            body_retry_after_ms: None,
        }
    }

    /// Attaches a `retry_after_ms` parsed out of the response body, when
    /// the executor's caller has already decoded one (SPEC §9 Open
    /// Question 2). Read back by [`Self::retry_after_ms`].
    pub fn with_body_retry_after_ms(mut self, body_retry_after_ms: u64) -> Self {
        self.body_retry_after_ms = Some(body_retry_after_ms);
        self
    }

    /// Looks up a header by its lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn header_f64(&self, name: &str) -> Option<f64> {
        self.header(name).and_then(|v| v.parse().ok())
    }

    fn header_u64(&self, name: &str) -> Option<u64> {
        self.header(name).and_then(|v| v.parse().ok())
    }

    /// The `X-RateLimit-Bucket` header, if present.
    pub fn rate_limit_bucket(&self) -> Option<String> {
        self.header("x-ratelimit-bucket").map(str::to_string)
    }

    pub fn rate_limit_limit(&self) -> Option<u64> {
        self.header_u64("x-ratelimit-limit")
    }

    pub fn rate_limit_remaining(&self) -> Option<u64> {
        self.header_u64("x-ratelimit-remaining")
    }

    pub fn rate_limit_reset_after_s(&self) -> Option<f64> {
        self.header_f64("x-ratelimit-reset-after")
    }

    pub fn rate_limit_scope(&self) -> Option<String> {
        self.header("x-ratelimit-scope").map(str::to_string)
    }

    /// Resolves `Retry-After` for this response in milliseconds, per the
    /// SPEC §9 Open Question decision: when both an HTTP header (seconds)
    /// and a JSON body field (milliseconds, attached via
    /// [`Self::with_body_retry_after_ms`]) disagree, report the larger of
    /// the two so CAG never under-waits.
    pub fn retry_after_ms(&self) -> Option<u64> {
        let header_ms = self
            .header_f64("retry-after")
            .map(|seconds| (seconds * 1000.0).round() as u64);
        match (header_ms, self.body_retry_after_ms) {
            (Some(h), Some(b)) => Some(h.max(b)),
            (Some(h), None) => Some(h),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// A synthetic response used when the executor itself threw, so an
    /// observation report can still be built (SPEC §4.5 step 5: "status
    /// defaulting to 500 on executor exception").
    pub(crate) fn synthetic_error() -> Self {
        Self::new(500, HashMap::new())
    }
}
