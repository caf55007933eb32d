use std::time::Duration;

use serde_json::Value;

use crate::AttemptError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Repeating the request leaves the server in the same state.
    pub fn is_idempotent(self) -> bool {
        !matches!(self, Self::Post)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One logical call: method, path relative to a base URL, optional JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub payload: Option<Value>,
    /// Route template such as `/movies/edit-movie/:id`. Metrics are keyed
    /// by it so entity ids do not create a series each.
    pub route: Option<String>,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: None,
            route: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::Post, path).with_payload(payload)
    }

    pub fn put(path: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::Put, path).with_payload(payload)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Endpoint label reported to metrics: the route template when set,
    /// otherwise the path.
    pub fn metrics_label(&self) -> &str {
        self.route.as_deref().unwrap_or(&self.path)
    }
}

/// Body of a successful dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// 2xx response. Empty bodies decode as `null`, non-JSON bodies as a
    /// JSON string.
    Fresh(Value),
    /// 304: the resource is unchanged and no body was sent.
    NotModified,
}

impl ResponseBody {
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Fresh(value) => Some(value),
            Self::NotModified => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { status: u16 },
    Failure(AttemptError),
}

/// One physical HTTP attempt made while serving a dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptRecord {
    pub base_url: String,
    /// 1-based, counted per base URL.
    pub attempt: usize,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
    /// Delay waited after this attempt before the next one on the same base URL.
    pub backoff: Option<Duration>,
}

impl AttemptRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

/// Successful dispatch together with every attempt it took.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatched {
    pub body: ResponseBody,
    pub attempts: Vec<AttemptRecord>,
}
