use crate::AttemptRecord;

/// Failure of a single physical attempt against one base URL.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// No response was received.
    #[error("network error: {message}")]
    Network {
        message: String,
        /// `true` when the connection itself could not be established, so
        /// the request never reached the server.
        connect: bool,
    },
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// The request did not settle within the configured timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

impl AttemptError {
    /// Label used when reporting the attempt to a metrics sink.
    pub fn status_label(&self) -> String {
        match self {
            Self::Network { .. } => "network".to_owned(),
            Self::Http { status, .. } => status.to_string(),
            Self::Timeout { .. } => "timeout".to_owned(),
        }
    }

    /// Returns `true` when the server provably never saw the request.
    pub fn never_sent(&self) -> bool {
        matches!(self, Self::Network { connect: true, .. })
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Every candidate base URL and retry was exhausted, or the retry policy
    /// stopped early. `last` is the error of the final attempt.
    #[error("request failed after {} attempt(s): {last}", .attempts.len())]
    RequestFailure {
        #[source]
        last: AttemptError,
        attempts: Vec<AttemptRecord>,
    },
    /// The caller cancelled the dispatch.
    #[error("request cancelled after {} attempt(s)", .attempts.len())]
    Cancelled { attempts: Vec<AttemptRecord> },
    /// The server answered 304 where a fresh document was required.
    #[error("{path}: not modified, no fresh body to decode")]
    NotModified { path: String },
    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Physical attempts made before the error surfaced.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::RequestFailure { attempts, .. } | Self::Cancelled { attempts } => attempts,
            _ => &[],
        }
    }

    /// HTTP status of the last attempt, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailure {
                last: AttemptError::Http { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    /// Backend-provided `message` field from the last HTTP error body.
    ///
    /// The catalog backend answers failures with `{"message": "..."}`.
    pub fn server_message(&self) -> Option<String> {
        let Self::RequestFailure {
            last: AttemptError::Http { body, .. },
            ..
        } = self
        else {
            return None;
        };
        let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
        parsed
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    }
}
