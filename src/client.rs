use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    Actor, ApiStatus, CatalogError, ClientOptions, DispatchOptions, Dispatcher, Endpoint,
    HealthReport, HttpTransport, MetricsSink, Movie, NewActor, NewMovie, NewProducer, Producer,
    ResponseBody, Result, ServiceStatus, Transport,
};

/// REST paths served by the catalog backend.
pub mod paths {
    pub const HEALTH: &str = "/health";
    pub const MOVIES: &str = "/movies";
    pub const ACTORS: &str = "/actors";
    pub const PRODUCERS: &str = "/producers";
}

/// One entity collection and the suffix of its mutation routes.
#[derive(Clone, Copy)]
struct Collection {
    root: &'static str,
    singular: &'static str,
}

const MOVIES: Collection = Collection {
    root: paths::MOVIES,
    singular: "movie",
};
const ACTORS: Collection = Collection {
    root: paths::ACTORS,
    singular: "actor",
};
const PRODUCERS: Collection = Collection {
    root: paths::PRODUCERS,
    singular: "producer",
};

// Routes that embed an id carry a `:id` template for metrics labels.
impl Collection {
    fn item(self, id: &str) -> Endpoint {
        Endpoint::get(format!("{}/{}", self.root, id)).with_route(format!("{}/:id", self.root))
    }

    fn add(self) -> String {
        format!("{}/add-{}", self.root, self.singular)
    }

    fn edit(self, id: &str, payload: Value) -> Endpoint {
        let prefix = format!("{}/edit-{}", self.root, self.singular);
        Endpoint::put(format!("{prefix}/{id}"), payload).with_route(format!("{prefix}/:id"))
    }

    fn delete(self, id: &str) -> Endpoint {
        let prefix = format!("{}/delete-{}", self.root, self.singular);
        Endpoint::delete(format!("{prefix}/{id}")).with_route(format!("{prefix}/:id"))
    }
}

/// Typed client for the movie catalog API.
///
/// Every call goes through the [`Dispatcher`], so each one gets the
/// primary/secondary fallback and retry behavior.
#[derive(Clone, Debug)]
pub struct CatalogClient<T = HttpTransport> {
    dispatcher: Dispatcher<T>,
}

impl CatalogClient<HttpTransport> {
    pub fn new(options: ClientOptions) -> Self {
        Self::from_dispatcher(Dispatcher::new(options))
    }

    /// Creates a client against a backend root: `{url}/api`, then `{url}`.
    pub fn for_backend(backend_url: impl AsRef<str>) -> Self {
        Self::new(ClientOptions::for_backend(backend_url))
    }

    /// Creates a client from `CATALOG_*` environment variables.
    ///
    /// See [`ClientOptions::from_env`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientOptions::from_env()?))
    }
}

impl<T: Transport> CatalogClient<T> {
    pub fn from_dispatcher(dispatcher: Dispatcher<T>) -> Self {
        Self { dispatcher }
    }

    pub fn with_metrics(self, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            dispatcher: self.dispatcher.with_metrics(metrics),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Calls `GET /health`.
    pub async fn health(&self) -> Result<HealthReport> {
        self.fetch(paths::HEALTH).await
    }

    /// Probes `path` with a GET. Any successful response, 304 included,
    /// counts as up.
    pub async fn api_status(&self, path: &str) -> ApiStatus {
        match self.send(Endpoint::get(path)).await {
            Ok(_) => ApiStatus::Up,
            Err(err) => {
                tracing::warn!(path, error = %err, "api status check failed");
                ApiStatus::Down
            }
        }
    }

    /// Checks backend health and each entity API. Never fails: unreachable
    /// parts are reported as down.
    pub async fn service_status(&self) -> ServiceStatus {
        let (backend, database) = match self.health().await {
            Ok(report) => (true, report.database_connected()),
            Err(err) => {
                tracing::warn!(error = %err, "health check failed");
                (false, false)
            }
        };

        let status = ServiceStatus {
            backend,
            database,
            actor_api: self.api_status(paths::ACTORS).await.is_up(),
            movie_api: self.api_status(paths::MOVIES).await.is_up(),
            producer_api: self.api_status(paths::PRODUCERS).await.is_up(),
        };
        tracing::info!(?status, "service status checked");
        status
    }

    pub async fn movies(&self) -> Result<Vec<Movie>> {
        self.fetch(MOVIES.root).await
    }

    pub async fn movie(&self, id: &str) -> Result<Movie> {
        self.fetch_endpoint(MOVIES.item(id)).await
    }

    pub async fn add_movie(&self, movie: &NewMovie) -> Result<Value> {
        self.post(&MOVIES.add(), movie).await
    }

    pub async fn update_movie(&self, id: &str, movie: &NewMovie) -> Result<Value> {
        self.acknowledged(MOVIES.edit(id, encode(movie)?)).await
    }

    pub async fn delete_movie(&self, id: &str) -> Result<Value> {
        self.acknowledged(MOVIES.delete(id)).await
    }

    pub async fn actors(&self) -> Result<Vec<Actor>> {
        self.fetch(ACTORS.root).await
    }

    pub async fn actor(&self, id: &str) -> Result<Actor> {
        self.fetch_endpoint(ACTORS.item(id)).await
    }

    pub async fn add_actor(&self, actor: &NewActor) -> Result<Value> {
        self.post(&ACTORS.add(), actor).await
    }

    pub async fn update_actor(&self, id: &str, actor: &NewActor) -> Result<Value> {
        self.acknowledged(ACTORS.edit(id, encode(actor)?)).await
    }

    pub async fn delete_actor(&self, id: &str) -> Result<Value> {
        self.acknowledged(ACTORS.delete(id)).await
    }

    pub async fn producers(&self) -> Result<Vec<Producer>> {
        self.fetch(PRODUCERS.root).await
    }

    pub async fn producer(&self, id: &str) -> Result<Producer> {
        self.fetch_endpoint(PRODUCERS.item(id)).await
    }

    pub async fn add_producer(&self, producer: &NewProducer) -> Result<Value> {
        self.post(&PRODUCERS.add(), producer).await
    }

    pub async fn update_producer(&self, id: &str, producer: &NewProducer) -> Result<Value> {
        self.acknowledged(PRODUCERS.edit(id, encode(producer)?)).await
    }

    pub async fn delete_producer(&self, id: &str) -> Result<Value> {
        self.acknowledged(PRODUCERS.delete(id)).await
    }

    /// Raw GET. A 304 comes back as [`ResponseBody::NotModified`].
    pub async fn get(&self, path: &str) -> Result<ResponseBody> {
        self.send(Endpoint::get(path)).await
    }

    /// Raw POST returning the backend's JSON acknowledgement.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.acknowledged(Endpoint::post(path, encode(body)?)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.acknowledged(Endpoint::put(path, encode(body)?)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.acknowledged(Endpoint::delete(path)).await
    }

    async fn acknowledged(&self, endpoint: Endpoint) -> Result<Value> {
        self.send(endpoint).await.map(acknowledgement)
    }

    async fn send(&self, endpoint: Endpoint) -> Result<ResponseBody> {
        self.dispatcher
            .dispatch(&endpoint, &DispatchOptions::default())
            .await
    }

    async fn fetch<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        self.fetch_endpoint(Endpoint::get(path)).await
    }

    async fn fetch_endpoint<D: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<D> {
        match self.send(endpoint.clone()).await? {
            ResponseBody::Fresh(value) => serde_json::from_value(value).map_err(|err| {
                CatalogError::Decode(format!("invalid response for {}: {err}", endpoint.path))
            }),
            ResponseBody::NotModified => Err(CatalogError::NotModified {
                path: endpoint.path,
            }),
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|err| CatalogError::Decode(format!("request body is not valid JSON: {err}")))
}

// Mutations answering 304 carry no body; report the same shape the UI expects.
fn acknowledgement(body: ResponseBody) -> Value {
    body.into_value()
        .unwrap_or_else(|| serde_json::json!({ "status": "success" }))
}
