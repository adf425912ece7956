//! Helpers for testing the web server and service.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`MockUpstream`] or [`Server`], make sure that the server is held until all
//!    requests to it have been made. Once dropped, the server stops and all connections to it
//!    fail. To avoid this, assign it to a variable: `let upstream = MockUpstream::new();`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::header::{CONTENT_TYPE, HeaderName, REFERER, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `leetstats` crates and mutes all
///    other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("leetstats_service=trace,leetstats=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Returns the absolute path to the given fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the workspace root.
///
/// # Panics
///
/// Panics if the fixture path does not exist on the file system.
pub fn fixture(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let mut full_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    full_path.pop(); // to /crates/
    full_path.pop(); // to /
    full_path.push("./tests/fixtures/");
    full_path.push(path);

    assert!(full_path.exists(), "'{}' does not exist", path.display());

    full_path
}

/// Returns the contents of a fixture.
///
/// # Panics
///
/// Panics if the fixture does not exist or cannot be read.
pub fn read_fixture(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(fixture(path)).unwrap()
}

/// Returns a JSON fixture from the `leetcode` fixture directory.
pub fn leetcode_fixture(name: &str) -> Value {
    let bytes = read_fixture(Path::new("leetcode").join(name));
    serde_json::from_slice(&bytes).unwrap()
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    pub handle: tokio::task::JoinHandle<()>,
    pub socket: SocketAddr,
}

impl Server {
    /// Creates a new test server serving the given router.
    pub fn with_router(router: Router) -> Self {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The two queries the upstream answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Profile,
    Calendar,
}

impl Operation {
    fn from_query(query: &str) -> Self {
        if query.contains("userProfileCalendar") {
            Self::Calendar
        } else {
            Self::Profile
        }
    }
}

/// A canned response of the [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockResponse {
    /// Responds with `200 OK` and the given JSON document.
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    /// Responds with `200 OK` and the named fixture from `tests/fixtures/leetcode`.
    pub fn fixture(name: &str) -> Self {
        Self::json(leetcode_fixture(name))
    }

    /// Responds with the given status code and an empty body.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    /// Responds with `200 OK` and a body that is not JSON.
    pub fn garbage() -> Self {
        Self {
            status: StatusCode::OK,
            body: "<html>upstream maintenance</html>".to_owned(),
            delay: Duration::ZERO,
        }
    }

    /// Waits for the given duration before responding.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        (self.status, [(CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

/// A request received by the [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub operation: Operation,
    pub username: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
struct MockState {
    responses: Mutex<BTreeMap<Operation, MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A fake LeetCode GraphQL endpoint.
///
/// Answers `POST /graphql` with a canned response per [`Operation`], which is picked from the
/// query text. By default, it serves the `profile.json` and `calendar.json` fixtures.
#[derive(Debug)]
pub struct MockUpstream {
    server: Server,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub fn new() -> Self {
        let responses = BTreeMap::from([
            (Operation::Profile, MockResponse::fixture("profile.json")),
            (Operation::Calendar, MockResponse::fixture("calendar.json")),
        ]);
        let state = Arc::new(MockState {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/graphql", post(graphql))
            .with_state(state.clone());

        Self {
            server: Server::with_router(router),
            state,
        }
    }

    /// Replaces the response to the profile query.
    pub fn respond_profile(&self, response: MockResponse) {
        self.respond(Operation::Profile, response);
    }

    /// Replaces the response to the calendar query.
    pub fn respond_calendar(&self, response: MockResponse) {
        self.respond(Operation::Calendar, response);
    }

    pub fn respond(&self, operation: Operation, response: MockResponse) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(operation, response);
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Returns how often the given query was received.
    pub fn hits(&self, operation: Operation) -> usize {
        let requests = self.state.requests.lock().unwrap();
        requests.iter().filter(|r| r.operation == operation).count()
    }

    /// Returns the URL of the GraphQL endpoint.
    pub fn url(&self) -> Url {
        self.server.url("graphql")
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

async fn graphql(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    let operation = Operation::from_query(body["query"].as_str().unwrap_or_default());
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };

    state.requests.lock().unwrap().push(RecordedRequest {
        operation,
        username: body["variables"]["username"].as_str().map(str::to_owned),
        referer: header(REFERER),
        user_agent: header(USER_AGENT),
    });

    let response = state.responses.lock().unwrap()[&operation].clone();
    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    response
}
