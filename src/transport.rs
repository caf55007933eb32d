use std::future::Future;
use std::time::Duration;

use reqwest::header;
use serde_json::Value;

use crate::{AttemptError, Method};

/// A single physical request against one fully-joined URL.
#[derive(Clone, Copy, Debug)]
pub struct AttemptRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub payload: Option<&'a Value>,
    pub timeout: Duration,
}

/// Status and raw body of a response that arrived, whatever its status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Performs one physical attempt.
///
/// Implementations must not retry on their own and must map a response of
/// any status to `Ok`; only missing responses are errors.
pub trait Transport {
    fn send(
        &self,
        request: AttemptRequest<'_>,
    ) -> impl Future<Output = Result<RawResponse, AttemptError>>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses a preconfigured client (proxy, default headers, pool settings).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: AttemptRequest<'_>) -> Result<RawResponse, AttemptError> {
        let timeout_ms = u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX);

        // On WASM, reqwest uses AbortController for timeout; the `.timeout()`
        // method is available on both targets.
        let mut builder = self
            .http
            .request(request.method.into(), request.url)
            .header(header::ACCEPT, "application/json")
            .timeout(request.timeout);
        if let Some(payload) = request.payload {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| classify_transport_error(&err, timeout_ms))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| classify_transport_error(&err, timeout_ms))?;

        Ok(RawResponse { status, body })
    }
}

fn classify_transport_error(err: &reqwest::Error, timeout_ms: u64) -> AttemptError {
    if err.is_timeout() {
        return AttemptError::Timeout { timeout_ms };
    }
    AttemptError::Network {
        message: err.to_string(),
        connect: is_connect_error(err),
    }
}

// is_connect() is not available on wasm32 targets (no TCP)
fn is_connect_error(err: &reqwest::Error) -> bool {
    #[cfg(not(target_arch = "wasm32"))]
    {
        err.is_connect()
    }
    #[cfg(target_arch = "wasm32")]
    {
        let _ = err;
        false
    }
}
