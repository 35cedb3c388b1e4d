//! In-process stand-in for the dashboard backend: REST auth routes, two
//! protected resources and the two realtime namespaces.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strading_session::{
    ApiClient, ChannelManager, ConnectionState, CredentialStore, MemoryCookieJar, RefreshCoordinator,
    WatchNavigator,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const DEMO_EMAIL: &str = "demo@strading.com";
pub const DEMO_PASSWORD: &str = "demo123";

/// A frame the backend received on a socket.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub namespace: String,
    pub connection: usize,
    pub event: String,
    pub data: Value,
}

pub struct BackendState {
    generation: AtomicUsize,
    valid_access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_delay_ms: AtomicU64,
    pub refresh_fails: AtomicBool,
    /// Reject every bearer token, even freshly issued ones
    pub reject_all: AtomicBool,
    pub logout_calls: AtomicUsize,
    pub notification_unread: AtomicU64,
    pub message_unread: AtomicU64,
    pub connections: AtomicUsize,
    /// Answer auth emits with `authenticated`
    pub send_ack: AtomicBool,
    frames: Mutex<Vec<ReceivedFrame>>,
    handshake_tokens: Mutex<Vec<Option<String>>>,
    push: broadcast::Sender<(String, String)>,
    kick: broadcast::Sender<String>,
}

impl BackendState {
    fn issue(&self) -> (String, String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{}", generation);
        *self.valid_access.lock().unwrap() = access.clone();
        (access, format!("refresh-{}", generation))
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        let expected = format!("Bearer {}", self.valid_access.lock().unwrap());
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == expected)
    }
}

pub struct Backend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl Backend {
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(8);
        let state = Arc::new(BackendState {
            generation: AtomicUsize::new(0),
            valid_access: Mutex::new(String::new()),
            refresh_calls: AtomicUsize::new(0),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_fails: AtomicBool::new(false),
            reject_all: AtomicBool::new(false),
            logout_calls: AtomicUsize::new(0),
            notification_unread: AtomicU64::new(0),
            message_unread: AtomicU64::new(0),
            connections: AtomicUsize::new(0),
            send_ack: AtomicBool::new(true),
            frames: Mutex::new(Vec::new()),
            handshake_tokens: Mutex::new(Vec::new()),
            push,
            kick,
        });

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/profile", get(profile))
            .route("/api/orders", get(orders))
            .route("/api/notifications/unread-count", get(notification_count))
            .route("/api/messages/unread-count", get(message_count))
            .route("/notifications", get(notifications_ws))
            .route("/messages", get(messages_ws))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Issue a valid pair without going through login.
    pub fn issue_tokens(&self) -> (String, String) {
        self.state.issue()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn frames(&self, namespace: &str) -> Vec<ReceivedFrame> {
        self.state
            .frames
            .lock()
            .unwrap()
            .iter()
            .filter(|frame| frame.namespace == namespace)
            .cloned()
            .collect()
    }

    pub fn handshake_tokens(&self) -> Vec<Option<String>> {
        self.state.handshake_tokens.lock().unwrap().clone()
    }

    /// Send an event to every open socket of `namespace`.
    pub fn push(&self, namespace: &str, event: &str, data: Value) {
        let text = json!({ "event": event, "data": data }).to_string();
        let _ = self.state.push.send((namespace.to_string(), text));
    }

    /// Close every open socket of `namespace` from the server side.
    pub fn kick(&self, namespace: &str) {
        let _ = self.state.kick.send(namespace.to_string());
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn demo_user() -> Value {
    json!({
        "id": 42,
        "email": DEMO_EMAIL,
        "firstName": "Demo",
        "lastName": "Trader",
        "role": "trader"
    })
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["email"] != DEMO_EMAIL || body["password"] != DEMO_PASSWORD {
        return unauthorized();
    }
    let (access, refresh) = state.issue();
    Json(json!({ "accessToken": access, "refreshToken": refresh, "user": demo_user() }))
        .into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.refresh_fails.load(Ordering::SeqCst) || !body["refresh_token"].is_string() {
        return unauthorized();
    }
    let (access, refresh) = state.issue();
    Json(json!({ "accessToken": access, "refreshToken": refresh })).into_response()
}

async fn logout(State(state): State<Arc<BackendState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({})).into_response()
}

async fn profile(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(demo_user()).into_response()
}

async fn orders(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "orders": [{ "id": 1, "symbol": "BTC-USD" }] })).into_response()
}

async fn notification_count(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "count": state.notification_unread.load(Ordering::SeqCst) })).into_response()
}

async fn message_count(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "unreadCount": state.message_unread.load(Ordering::SeqCst) })).into_response()
}

async fn notifications_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<Arc<BackendState>>,
) -> impl IntoResponse {
    state
        .handshake_tokens
        .lock()
        .unwrap()
        .push(query.get("token").cloned());
    ws.on_upgrade(move |socket| handle_socket(socket, "/notifications", state))
}

async fn messages_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BackendState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, "/messages", state))
}

async fn handle_socket(socket: WebSocket, namespace: &'static str, state: Arc<BackendState>) {
    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let mut push = state.push.subscribe();
    let mut kick = state.kick.subscribe();
    let (mut tx, mut rx) = socket.split();

    loop {
        tokio::select! {
            incoming = rx.next() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else { continue };

                let event = frame["event"].as_str().unwrap_or_default().to_string();
                state.frames.lock().unwrap().push(ReceivedFrame {
                    namespace: namespace.to_string(),
                    connection,
                    event: event.clone(),
                    data: frame["data"].clone(),
                });

                if (event == "authenticate" || event == "subscribe")
                    && state.send_ack.load(Ordering::SeqCst)
                {
                    let ack = json!({ "event": "authenticated", "data": { "userId": frame["data"]["userId"] } });
                    if tx.send(Message::Text(ack.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
            pushed = push.recv() => {
                let Ok((target, text)) = pushed else { continue };
                if target == namespace && tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            kicked = kick.recv() => {
                if kicked.is_ok_and(|target| target == namespace) {
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }
}

/// Credential store, REST client and navigator wired like the session
/// client does it.
pub struct RestHarness {
    pub jar: Arc<MemoryCookieJar>,
    pub credentials: Arc<CredentialStore>,
    pub navigator: Arc<WatchNavigator>,
    pub refresher: Arc<RefreshCoordinator>,
    pub api: ApiClient,
}

pub fn rest_harness(backend: &Backend) -> RestHarness {
    let jar = Arc::new(MemoryCookieJar::new());
    let credentials = Arc::new(CredentialStore::new(jar.clone()));
    let navigator = Arc::new(WatchNavigator::new());
    let http = reqwest::Client::new();
    let refresher = Arc::new(RefreshCoordinator::new(
        http.clone(),
        format!("{}/auth/refresh", backend.api_url()),
        Arc::clone(&credentials),
        navigator.clone(),
        "/sign-in".to_string(),
    ));
    let api = ApiClient::new(
        backend.api_url(),
        http,
        Arc::clone(&credentials),
        Arc::clone(&refresher),
    );

    RestHarness {
        jar,
        credentials,
        navigator,
        refresher,
        api,
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether the channel reaches `state` within `within`.
pub async fn reaches_state(
    manager: &ChannelManager,
    state: ConnectionState,
    within: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if manager.state().await == state {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the channel accepts emits.
pub async fn wait_until_live(manager: &ChannelManager) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !manager.state().await.can_emit() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} never became live",
            manager.namespace()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strading_session=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
