//! Shared fixtures: in-process upstream collectors and a scripted probe provider.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, StreamExt};
use healthagent::healthagent_core::{
    headers, Endpoint, HealthStatus, ProbeProvider, ProbeSettings, ProviderRegistry, StatusStream,
};
use healthagent::{Agent, AgentConfig, UpstreamClient};
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const PROTOCOL: &str = "scripted";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub agent_name: Option<String>,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn statuses(&self) -> Vec<HealthStatus> {
        serde_json::from_slice(&self.body).expect("POST body is a status array")
    }
}

#[derive(Debug)]
struct MockState {
    get_status: StatusCode,
    post_status: StatusCode,
    monitors_body: String,
    requests: Vec<RecordedRequest>,
}

/// An upstream collector served by axum on a random local port.
#[derive(Debug, Clone)]
pub struct MockUpstream {
    pub url: Url,
    state: Arc<Mutex<MockState>>,
}

impl MockUpstream {
    pub async fn spawn(monitors: &[&str]) -> Self {
        let state = Arc::new(Mutex::new(MockState {
            get_status: StatusCode::OK,
            post_status: StatusCode::OK,
            monitors_body: monitors_body(monitors),
            requests: Vec::new(),
        }));

        let app = Router::new()
            .route("/", get(serve_monitors).post(accept_status))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: Url::parse(&format!("http://{addr}/")).unwrap(),
            state,
        }
    }

    /// An upstream that refuses connections.
    pub fn unreachable() -> Url {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    pub fn set_monitors(&self, monitors: &[&str]) {
        self.state.lock().monitors_body = monitors_body(monitors);
    }

    pub fn set_monitors_body(&self, body: &str) {
        self.state.lock().monitors_body = body.to_string();
    }

    pub fn fail_posts_with(&self, status: StatusCode) {
        self.state.lock().post_status = status;
    }

    pub fn fail_gets_with(&self, status: StatusCode) {
        self.state.lock().get_status = status;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn posts(&self) -> Vec<RecordedRequest> {
        self.requests_with(Method::POST)
    }

    pub fn gets(&self) -> Vec<RecordedRequest> {
        self.requests_with(Method::GET)
    }

    fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }
}

fn monitors_body(monitors: &[&str]) -> String {
    serde_json::to_string(monitors).unwrap()
}

fn record(state: &Mutex<MockState>, method: Method, headers: &HeaderMap, body: Bytes) {
    let agent_name = headers
        .get(headers::AGENT_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.lock().requests.push(RecordedRequest {
        method,
        agent_name,
        body,
    });
}

async fn serve_monitors(
    State(state): State<Arc<Mutex<MockState>>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    record(&state, Method::GET, &headers, Bytes::new());
    let state = state.lock();
    (state.get_status, state.monitors_body.clone())
}

async fn accept_status(
    State(state): State<Arc<Mutex<MockState>>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    record(&state, Method::POST, &headers, body);
    state.lock().post_status
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Started(Endpoint),
    Stopped(Endpoint),
}

/// Probe provider whose observations are pushed by the test.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    feeds: Mutex<HashMap<Endpoint, mpsc::UnboundedSender<HealthStatus>>>,
    events: Arc<Mutex<Vec<ProbeEvent>>>,
}

struct StreamGuard {
    endpoint: Endpoint,
    events: Arc<Mutex<Vec<ProbeEvent>>>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.events.lock().push(ProbeEvent::Stopped(self.endpoint));
    }
}

impl ScriptedProvider {
    /// Feeds an observation to the live stream for `endpoint`.
    pub fn emit(&self, endpoint: &str, status: HealthStatus) -> bool {
        let endpoint: Endpoint = endpoint.parse().unwrap();
        self.feeds
            .lock()
            .get(&endpoint)
            .is_some_and(|feed| feed.send(status).is_ok())
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.lock().clone()
    }

    pub fn live_streams(&self) -> usize {
        let events = self.events();
        let started = events
            .iter()
            .filter(|e| matches!(e, ProbeEvent::Started(_)))
            .count();
        started - (events.len() - started)
    }
}

impl ProbeProvider for ScriptedProvider {
    fn protocol(&self) -> &str {
        PROTOCOL
    }

    fn watch(&self, endpoint: Endpoint, _settings: ProbeSettings) -> StatusStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().insert(endpoint, tx);
        self.events.lock().push(ProbeEvent::Started(endpoint));

        let guard = StreamGuard {
            endpoint,
            events: self.events.clone(),
        };
        stream::unfold((rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|status| (status, (rx, guard)))
        })
        .boxed()
    }
}

pub fn scripted_registry() -> (ProviderRegistry, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::default());
    let registry = ProviderRegistry::new();
    registry.register(provider.clone());
    (registry, provider)
}

pub fn monitor(endpoint: &str) -> String {
    format!("{PROTOCOL}://{endpoint}")
}

pub fn test_config(upstreams: Vec<Url>) -> AgentConfig {
    AgentConfig {
        upstreams,
        name: "test-agent".to_string(),
        keep_alive: Duration::from_secs(600),
        ..AgentConfig::default()
    }
}

pub fn plain_client(config: &AgentConfig) -> UpstreamClient {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .unwrap();
    UpstreamClient::new(http, config.upstreams.clone(), config.name.clone()).unwrap()
}

pub async fn bootstrap_agent(
    config: AgentConfig,
) -> (Arc<Agent>, Arc<ScriptedProvider>) {
    let (registry, provider) = scripted_registry();
    let upstream = plain_client(&config);
    let agent = Agent::bootstrap(config, upstream, registry).await.unwrap();
    (agent, provider)
}

/// Polls `condition` until it holds or the timeout elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
