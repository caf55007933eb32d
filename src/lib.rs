//! `catalog-http` is a resilient async HTTP client for the movie catalog
//! REST API.
//!
//! Every call is a single logical dispatch, attempted against a primary
//! base URL and then a secondary one, each with bounded, linearly backed-off
//! retries:
//! - [`Dispatcher::dispatch`] for raw `(method, path, payload)` calls
//! - [`CatalogClient`] for typed movie, actor and producer operations
//! - [`ApiMetrics`] to collect per-attempt API metrics

mod client;
mod clock;
mod dispatcher;
mod error;
mod metrics;
mod model;
mod options;
mod retry;
mod transport;
mod types;

pub use client::{paths, CatalogClient};
pub use dispatcher::{join_url, Dispatcher};
pub use error::{AttemptError, CatalogError};
pub use metrics::{
    sanitize_label, ApiCallSnapshot, ApiMetrics, MetricsSink, MetricsSnapshot, NoopMetrics,
    LOAD_TIME_WINDOW,
};
pub use model::{
    Actor, ApiStatus, Gender, HealthReport, Movie, NewActor, NewMovie, NewPerson, NewProducer,
    Person, Producer, Reference, ServiceStatus,
};
pub use options::{ClientOptions, DispatchOptions};
pub use retry::RetryPolicy;
pub use transport::{AttemptRequest, HttpTransport, RawResponse, Transport};
pub use types::{AttemptOutcome, AttemptRecord, Dispatched, Endpoint, Method, ResponseBody};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, CatalogError>;
