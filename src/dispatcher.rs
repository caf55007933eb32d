use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    clock::{self, Stopwatch},
    retry::{backoff_delay_ms, Disposition},
    AttemptError, AttemptOutcome, AttemptRecord, AttemptRequest, CatalogError, ClientOptions,
    DispatchOptions, Dispatched, Endpoint, HttpTransport, MetricsSink, NoopMetrics, RawResponse,
    ResponseBody, Result, Transport,
};

/// Joins a base URL and an endpoint path with exactly one `/` between them.
///
/// Example: `("http://localhost:5000/api/", "/movies")` →
/// `"http://localhost:5000/api/movies"`
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Sends logical requests against two base URL candidates with bounded,
/// linearly backed-off retries.
#[derive(Clone)]
pub struct Dispatcher<T = HttpTransport> {
    transport: T,
    options: ClientOptions,
    metrics: Arc<dyn MetricsSink>,
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Dispatcher<HttpTransport> {
    pub fn new(options: ClientOptions) -> Self {
        Self::with_transport(HttpTransport::new(), options)
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn with_transport(transport: T, options: ClientOptions) -> Self {
        Self {
            transport,
            options,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Reports every attempt to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `endpoint` and returns the first successful body.
    ///
    /// Fails with [`CatalogError::RequestFailure`] once every candidate base
    /// URL and retry is exhausted.
    pub async fn dispatch(
        &self,
        endpoint: &Endpoint,
        options: &DispatchOptions,
    ) -> Result<ResponseBody> {
        self.dispatch_recorded(endpoint, options)
            .await
            .map(|dispatched| dispatched.body)
    }

    /// Like [`Dispatcher::dispatch`], also returning every attempt made.
    pub async fn dispatch_recorded(
        &self,
        endpoint: &Endpoint,
        options: &DispatchOptions,
    ) -> Result<Dispatched> {
        let prefer_secondary = options
            .prefer_secondary_first
            .unwrap_or(self.options.prefer_secondary_first);
        let cancel = options.cancel.as_ref();
        let max_attempts = self.options.max_retries.saturating_add(1);
        let timeout = Duration::from_millis(self.options.timeout_ms);

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<AttemptError> = None;

        'candidates: for base_url in self.options.candidates(prefer_secondary) {
            let url = join_url(base_url, &endpoint.path);

            for attempt in 1..=max_attempts {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    return Err(CatalogError::Cancelled { attempts });
                }

                tracing::debug!(
                    method = endpoint.method.as_str(),
                    %url,
                    attempt,
                    "sending request"
                );
                let request = AttemptRequest {
                    method: endpoint.method,
                    url: &url,
                    payload: endpoint.payload.as_ref(),
                    timeout,
                };
                let stopwatch = Stopwatch::start();
                let Some(result) = until_cancelled(cancel, self.transport.send(request)).await
                else {
                    return Err(CatalogError::Cancelled { attempts });
                };
                let elapsed = stopwatch.elapsed();

                let error = match classify_response(result) {
                    Ok((status, body)) => {
                        self.metrics.record_api_call(
                            endpoint.metrics_label(),
                            &status.to_string(),
                            elapsed,
                        );
                        attempts.push(AttemptRecord {
                            base_url: base_url.to_owned(),
                            attempt,
                            outcome: AttemptOutcome::Success { status },
                            elapsed,
                            backoff: None,
                        });
                        tracing::debug!(%url, status, attempt, "request succeeded");
                        return Ok(Dispatched { body, attempts });
                    }
                    Err(error) => error,
                };

                self.metrics.record_api_call(
                    endpoint.metrics_label(),
                    &error.status_label(),
                    elapsed,
                );
                tracing::warn!(
                    method = endpoint.method.as_str(),
                    %url,
                    attempt,
                    error = %error,
                    "request attempt failed"
                );

                let disposition = self.options.retry_policy.classify(endpoint.method, &error);
                let will_retry = disposition == Disposition::Retry && attempt < max_attempts;
                let backoff = will_retry.then(|| {
                    Duration::from_millis(backoff_delay_ms(self.options.retry_backoff_ms, attempt))
                });

                attempts.push(AttemptRecord {
                    base_url: base_url.to_owned(),
                    attempt,
                    outcome: AttemptOutcome::Failure(error.clone()),
                    elapsed,
                    backoff,
                });
                last_error = Some(error);

                match disposition {
                    Disposition::Stop => break 'candidates,
                    Disposition::NextCandidate => continue 'candidates,
                    Disposition::Retry => {}
                }

                if let Some(delay) = backoff {
                    if !self.wait_before_retry(delay, cancel).await {
                        return Err(CatalogError::Cancelled { attempts });
                    }
                }
            }
        }

        let last = last_error.unwrap_or_else(|| AttemptError::Network {
            message: "no attempt was made".to_owned(),
            connect: true,
        });
        self.metrics.record_error("api", endpoint.metrics_label());
        tracing::error!(
            method = endpoint.method.as_str(),
            path = %endpoint.path,
            attempts = attempts.len(),
            error = %last,
            "request failed on every base URL"
        );
        Err(CatalogError::RequestFailure { last, attempts })
    }

    /// Waits before the next retry attempt. Returns `false` when cancelled.
    ///
    /// Native targets sleep on the tokio timer, wasm32 on a browser
    /// `setTimeout` promise.
    async fn wait_before_retry(&self, delay: Duration, cancel: Option<&CancellationToken>) -> bool {
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying request after backoff"
        );
        until_cancelled(cancel, clock::sleep(delay)).await.is_some()
    }
}

/// Runs `future` to completion unless `cancel` fires first.
async fn until_cancelled<F: Future>(
    cancel: Option<&CancellationToken>,
    future: F,
) -> Option<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            output = future => Some(output),
        },
        None => Some(future.await),
    }
}

/// Maps a settled attempt to a body (2xx, 304) or a retryable error.
fn classify_response(
    result: std::result::Result<RawResponse, AttemptError>,
) -> std::result::Result<(u16, ResponseBody), AttemptError> {
    let RawResponse { status, body } = result?;
    match status {
        304 => Ok((status, ResponseBody::NotModified)),
        200..=299 => Ok((status, ResponseBody::Fresh(parse_body(body)))),
        _ => Err(AttemptError::Http { status, body }),
    }
}

fn parse_body(body: String) -> serde_json::Value {
    if body.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body))
}
