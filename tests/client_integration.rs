use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use catalog_http::{
    ApiMetrics, ApiStatus, AttemptError, AttemptOutcome, CatalogClient, CatalogError,
    ClientOptions, DispatchOptions, Dispatcher, Endpoint, Gender, NewMovie, NewPerson,
    ResponseBody,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: Option<JsonValue>,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body: Some(body),
            delay: Duration::from_millis(0),
        }
    }

    fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Hit {
    method: Method,
    path: String,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

async fn catch_all(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    state
        .hits
        .lock()
        .expect("hits mutex must not be poisoned")
        .push(Hit {
            method,
            path: uri.path().to_owned(),
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    match response.body {
        Some(body) => (response.status, Json(body)).into_response(),
        None => response.status.into_response(),
    }
}

struct TestServer {
    base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> Vec<Hit> {
        self.hits.lock().expect("hits mutex").clone()
    }

    fn api_url(&self) -> String {
        format!("{}/api", self.base_url)
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        hits: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new().fallback(catch_all).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        task,
    }
}

/// Base URL on which nothing listens, so every connect is refused.
fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind probe listener");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);
    format!("http://{address}/api")
}

fn fast_options(primary: String, secondary: String) -> ClientOptions {
    ClientOptions::with_base_urls(primary, secondary)
        .timeout_ms(1_000)
        .max_retries(2)
        .retry_backoff_ms(1)
}

fn movies_body() -> JsonValue {
    json!([
        {
            "_id": "m1",
            "name": "Heat",
            "desc": "Crime",
            "director": "Michael Mann",
            "poster": "https://img/heat.jpg",
            "yearOfRelease": 1995,
            "actors": [{"_id": "a1", "name": "Al Pacino", "gender": "male"}],
            "producer": {"_id": "p1", "name": "Art Linson"}
        }
    ])
}

#[tokio::test]
async fn movies_are_fetched_from_api_prefixed_primary() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, movies_body())]).await;
    let client = CatalogClient::new(ClientOptions::for_backend(&server.base_url));

    let movies = client.movies().await.expect("movies must load");

    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].name, "Heat");
    assert_eq!(movies[0].year_of_release, Some(1995));
    assert_eq!(
        server.hits(),
        vec![Hit {
            method: Method::GET,
            path: "/api/movies".to_owned(),
            body: String::new(),
        }]
    );
}

#[tokio::test]
async fn unreachable_primary_falls_back_to_direct_base_url() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, movies_body())]).await;
    let dispatcher = Dispatcher::new(fast_options(unreachable_base_url(), server.base_url.clone()));

    let dispatched = dispatcher
        .dispatch_recorded(&Endpoint::get("/movies"), &DispatchOptions::new())
        .await
        .expect("secondary must answer");

    assert_eq!(dispatched.attempts.len(), 4);
    assert!(dispatched.attempts[..3].iter().all(|attempt| matches!(
        attempt.outcome,
        AttemptOutcome::Failure(AttemptError::Network { connect: true, .. })
    )));
    assert_eq!(dispatched.attempts[3].base_url, server.base_url);
    assert_eq!(server.hits().len(), 1);
    assert_eq!(server.hits()[0].path, "/movies");
}

#[tokio::test]
async fn retries_on_server_error_before_succeeding() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "boom"})),
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"message": "busy"})),
        MockResponse::json(StatusCode::OK, json!([])),
    ])
    .await;
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()));

    let actors = client.actors().await.expect("third attempt must succeed");

    assert!(actors.is_empty());
    let paths: Vec<_> = server.hits().into_iter().map(|hit| hit.path).collect();
    assert_eq!(paths, vec!["/api/actors"; 3]);
}

#[tokio::test]
async fn not_modified_is_success_for_status_probe_but_not_for_typed_reads() {
    let server = spawn_server(vec![
        MockResponse::empty(StatusCode::NOT_MODIFIED),
        MockResponse::empty(StatusCode::NOT_MODIFIED),
        MockResponse::empty(StatusCode::NOT_MODIFIED),
    ])
    .await;
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()));

    assert_eq!(client.api_status("/producers").await, ApiStatus::Up);
    assert_eq!(
        client.get("/producers").await.expect("304 is success"),
        ResponseBody::NotModified
    );
    let err = client.producers().await.expect_err("no fresh body to decode");
    assert!(matches!(err, CatalogError::NotModified { ref path } if path == "/producers"));
    assert_eq!(server.hits().len(), 3);
}

#[tokio::test]
async fn request_timeout_surfaces_timeout_error() {
    let slow = || {
        MockResponse::json(StatusCode::OK, json!([])).with_delay(Duration::from_millis(300))
    };
    let server = spawn_server(vec![slow(), slow()]).await;
    let dispatcher = Dispatcher::new(
        fast_options(server.api_url(), server.base_url.clone())
            .timeout_ms(30)
            .max_retries(0),
    );

    let err = dispatcher
        .dispatch(&Endpoint::get("/movies"), &DispatchOptions::new())
        .await
        .expect_err("request must time out");

    match err {
        CatalogError::RequestFailure { last, attempts } => {
            assert_eq!(last, AttemptError::Timeout { timeout_ms: 30 });
            assert_eq!(attempts.len(), 2);
        }
        other => panic!("expected request failure, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_post_is_sent_once_per_base_url_and_exposes_backend_message() {
    let failure = || {
        MockResponse::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "Failed to add movie"}),
        )
    };
    let server = spawn_server(vec![failure(), failure()]).await;
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()));

    let err = client
        .add_movie(&NewMovie {
            name: "Heat".to_owned(),
            desc: "Crime".to_owned(),
            director: "Michael Mann".to_owned(),
            poster: "https://img/heat.jpg".to_owned(),
            year_of_release: 1995,
            actors: vec!["a1".to_owned()],
            producer: "p1".to_owned(),
        })
        .await
        .expect_err("server error must surface");

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.server_message().as_deref(), Some("Failed to add movie"));
    assert_eq!(err.attempts().len(), 2);
    let hits = server.hits();
    assert!(hits.iter().all(|hit| hit.method == Method::POST));
    let paths: Vec<_> = hits.iter().map(|hit| hit.path.as_str()).collect();
    assert_eq!(paths, vec!["/api/movies/add-movie", "/movies/add-movie"]);
    let sent: JsonValue = serde_json::from_str(&hits[0].body).expect("body must be JSON");
    assert_eq!(sent["yearOfRelease"], json!(1995));
    assert_eq!(sent["actors"], json!(["a1"]));
}

#[tokio::test]
async fn post_rejected_by_api_prefix_falls_back_to_backend_root() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::NOT_FOUND, json!({"message": "Cannot POST"})),
        MockResponse::json(StatusCode::CREATED, json!({"message": "Actor added"})),
    ])
    .await;
    let client = CatalogClient::for_backend(&server.base_url);

    let ack = client
        .post("/actors/add-actor", &json!({"name": "Kit"}))
        .await
        .expect("backend root must accept the POST");

    assert_eq!(ack, json!({"message": "Actor added"}));
    let paths: Vec<_> = server.hits().into_iter().map(|hit| hit.path).collect();
    assert_eq!(paths, vec!["/api/actors/add-actor", "/actors/add-actor"]);
}

#[tokio::test]
async fn mutations_use_backend_route_names() {
    let ack = || MockResponse::json(StatusCode::OK, json!({"message": "ok"}));
    let server = spawn_server(vec![ack(), ack(), ack()]).await;
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()));
    let person = NewPerson {
        name: "Kit".to_owned(),
        bio: "Character actor".to_owned(),
        image: "https://img/kit.jpg".to_owned(),
        dob: "1990-01-31".to_owned(),
        gender: Gender::Female,
    };

    client.add_actor(&person).await.expect("add must succeed");
    client
        .update_producer("p9", &person)
        .await
        .expect("edit must succeed");
    let ack = client.delete_actor("a7").await.expect("delete must succeed");

    assert_eq!(ack, json!({"message": "ok"}));
    let routes: Vec<_> = server
        .hits()
        .into_iter()
        .map(|hit| (hit.method, hit.path))
        .collect();
    assert_eq!(
        routes,
        vec![
            (Method::POST, "/api/actors/add-actor".to_owned()),
            (Method::PUT, "/api/producers/edit-producer/p9".to_owned()),
            (Method::DELETE, "/api/actors/delete-actor/a7".to_owned()),
        ]
    );
}

#[tokio::test]
async fn client_error_moves_to_secondary_without_retrying_primary() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::BAD_REQUEST, json!({"message": "bad id"})),
        MockResponse::json(StatusCode::BAD_REQUEST, json!({"message": "bad id"})),
    ])
    .await;
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()));

    let err = client.movie("not-an-id").await.expect_err("both candidates reject");

    assert_eq!(err.attempts().len(), 2);
    assert_eq!(err.server_message().as_deref(), Some("bad id"));
    let paths: Vec<_> = server.hits().into_iter().map(|hit| hit.path).collect();
    assert_eq!(paths, vec!["/api/movies/not-an-id", "/movies/not-an-id"]);
}

#[tokio::test]
async fn service_status_reports_each_component() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::OK, json!({"status": "ok", "database": "connected"})),
        MockResponse::json(StatusCode::OK, json!([])),
        MockResponse::empty(StatusCode::NOT_MODIFIED),
        MockResponse::json(StatusCode::OK, json!([])),
    ])
    .await;
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()));

    let status = client.service_status().await;

    assert!(status.all_up());
    let paths: Vec<_> = server.hits().into_iter().map(|hit| hit.path).collect();
    assert_eq!(
        paths,
        vec!["/api/health", "/api/actors", "/api/movies", "/api/producers"]
    );
}

#[tokio::test]
async fn service_status_marks_everything_down_when_unreachable() {
    let options = ClientOptions::with_base_urls(unreachable_base_url(), unreachable_base_url())
        .max_retries(0)
        .retry_backoff_ms(1);
    let client = CatalogClient::new(options);

    let status = client.service_status().await;

    assert!(!status.backend);
    assert!(!status.database);
    assert!(!status.actor_api && !status.movie_api && !status.producer_api);
}

#[tokio::test]
async fn metrics_sink_sees_every_attempt() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::BAD_GATEWAY, json!({"message": "upstream"})),
        MockResponse::json(StatusCode::OK, json!({"status": "ok", "database": "connected"})),
    ])
    .await;
    let metrics = Arc::new(ApiMetrics::new());
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()))
        .with_metrics(metrics.clone());

    let health = client.health().await.expect("retry must succeed");

    assert!(health.database_connected());
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.calls_to("/health"), 2);
    let statuses: Vec<_> = snapshot
        .api_calls
        .iter()
        .map(|call| call.status.as_str())
        .collect();
    assert_eq!(statuses, vec!["200", "502"]);
}

#[tokio::test]
async fn metrics_group_entity_ids_under_route_template() {
    let movie = |id: &str| MockResponse::json(StatusCode::OK, json!({"_id": id, "name": "Heat"}));
    let server = spawn_server(vec![movie("m1"), movie("m2")]).await;
    let metrics = Arc::new(ApiMetrics::new());
    let client = CatalogClient::new(fast_options(server.api_url(), server.base_url.clone()))
        .with_metrics(metrics.clone());

    client.movie("m1").await.expect("m1 must load");
    client.movie("m2").await.expect("m2 must load");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.api_calls.len(), 1);
    assert_eq!(snapshot.calls_to("/movies/:id"), 2);
    let paths: Vec<_> = server.hits().into_iter().map(|hit| hit.path).collect();
    assert_eq!(paths, vec!["/api/movies/m1", "/api/movies/m2"]);
}
