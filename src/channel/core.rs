use super::connection::{ConnectionManager, ConnectionState};
use super::state::ChannelSession;
use super::subscription::{EventStream, ListenerId, ListenerRegistry, Subscription};
use crate::RealtimeEvent;
use crate::credentials::CredentialStore;
use crate::infrastructure::HeartbeatManager;
use crate::messaging::EventRouter;
use crate::types::{ChannelMessage, Result, STABLE_CONNECTION, SessionError};
use crate::websocket::{WebSocketFactory, WsStream};
use futures::stream::{SplitStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::builder::ChannelOptions;

/// What happened to an emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Written to the socket
    Sent,
    /// Not connected; the emit was discarded, not queued
    Dropped,
}

/// Why a socket went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server sent a close frame
    ServerClosed(String),
    /// The stream ended without a close frame
    TransportClosed,
    TransportError(String),
    HeartbeatTimeout,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerClosed(reason) if reason.is_empty() => write!(f, "server closed"),
            Self::ServerClosed(reason) => write!(f, "server closed: {}", reason),
            Self::TransportClosed => write!(f, "transport closed"),
            Self::TransportError(e) => write!(f, "transport error: {}", e),
            Self::HeartbeatTimeout => write!(f, "heartbeat timeout"),
        }
    }
}

/// Realtime connection for one namespace (`/notifications`, `/messages`).
///
/// Lifecycle: build → [`connect`](Self::connect) → [`on`](Self::on)* →
/// [`disconnect`](Self::disconnect). After every (re)connect the configured
/// auth event is emitted with `{ "userId": ... }` before anything else is
/// written. Non-manual disconnects are retried with `delay × attempt`
/// backoff until the attempt ceiling, after which the channel stays quiet.
///
/// Listeners registered through [`on`](Self::on) belong to the manager, not
/// the socket, so they keep receiving events across reconnects and
/// explicit disconnect/connect cycles.
///
/// # Example
///
/// ```no_run
/// use strading_session::{ChannelManagerBuilder, ChannelOptions, RealtimeEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let messages = ChannelManagerBuilder::new("https://api.example.com/api", ChannelOptions::messages())
///     .build()?;
///
/// let subscription = messages.on(RealtimeEvent::NewMessage, |payload| {
///     println!("new message: {}", payload);
/// });
///
/// messages.connect("42").await?;
/// // ...
/// subscription.unsubscribe();
/// messages.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChannelManager {
    pub(crate) endpoint: Url,
    pub(crate) options: ChannelOptions,
    pub(crate) credentials: Option<Arc<CredentialStore>>,

    // Connection manager
    pub(crate) connection: Arc<ConnectionManager>,

    // Consolidated mutable state
    pub(crate) session: Arc<RwLock<ChannelSession>>,

    // Application listeners, independent of the socket
    pub(crate) listeners: Arc<ListenerRegistry>,
}

impl ChannelManager {
    /// Open the namespace connection and authenticate as `user_id`.
    ///
    /// Idempotent while a session for the same user is open or connecting.
    /// A session for a different user is torn down first. If the handshake
    /// fails the error is returned and reconnection starts in the background.
    pub async fn connect(&self, user_id: impl Into<String>) -> Result<()> {
        let user_id = user_id.into();

        let (current_user, state) = {
            let session = self.session.read().await;
            (session.user_id.clone(), self.connection.state().await)
        };

        if current_user.as_deref() == Some(user_id.as_str())
            && state != ConnectionState::Disconnected
        {
            tracing::debug!("{} already connected for user {}", self.namespace(), user_id);
            return Ok(());
        }

        if current_user.is_some() || state != ConnectionState::Disconnected {
            self.disconnect().await?;
        }

        {
            let mut session = self.session.write().await;
            session.user_id = Some(user_id.clone());
            session.was_manual_disconnect = false;
            session.reconnect.reset();

            let (state_tx, state_rx) = watch::channel((ConnectionState::Disconnected, false));
            session.state_change_tx = Some(state_tx);
            session.watcher.spawn(Self::watch_state(self.clone(), state_rx));
        }

        self.open_socket(&user_id).await
    }

    /// Close the connection and forget the user; no reconnection follows.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut session = self.session.write().await;
            session.teardown();
        }

        self.close_quietly().await;

        tracing::info!("Disconnected from {}", self.namespace());
        Ok(())
    }

    /// Register a callback for `event`. The returned handle unregisters it
    /// when dropped or unsubscribed.
    pub fn on<F>(&self, event: impl Into<RealtimeEvent>, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let event = event.into();
        let id = self.listeners.add(event.clone(), Arc::new(callback));
        Subscription::new(event, id, &self.listeners)
    }

    /// Remove one listener, or all listeners of `event` when `id` is `None`.
    pub fn off(&self, event: impl Into<RealtimeEvent>, id: Option<ListenerId>) {
        let event = event.into();
        match id {
            Some(id) => {
                self.listeners.remove(&event, id);
            }
            None => {
                let removed = self.listeners.remove_all(&event);
                tracing::debug!("Removed {} listener(s) for '{}'", removed, event);
            }
        }
    }

    /// Receive payloads of `event` through a channel instead of a callback.
    pub fn stream(&self, event: impl Into<RealtimeEvent>) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.on(event, move |payload| {
            let _ = tx.send(payload);
        });
        EventStream::new(rx, subscription)
    }

    /// Emit an event if the session is authenticated; otherwise log and drop it.
    pub async fn emit(&self, event: impl Into<RealtimeEvent>, data: Value) -> Result<EmitOutcome> {
        let event = event.into();
        let state = self.connection.state().await;
        if !state.can_emit() {
            tracing::warn!(
                "Dropping '{}' on {}: not connected ({:?})",
                event,
                self.namespace(),
                state
            );
            return Ok(EmitOutcome::Dropped);
        }

        match self
            .connection
            .send_message(&ChannelMessage::new(event.clone(), data))
            .await
        {
            Ok(()) => {
                tracing::debug!("Emitted '{}' on {}", event, self.namespace());
                Ok(EmitOutcome::Sent)
            }
            Err(SessionError::NotConnected) => {
                tracing::warn!("Dropping '{}' on {}: socket went away", event, self.namespace());
                Ok(EmitOutcome::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub async fn user_id(&self) -> Option<String> {
        self.session.read().await.user_id.clone()
    }

    /// Reconnect attempts since the last acknowledged or long-lived socket.
    pub async fn reconnect_attempts(&self) -> u32 {
        self.session.read().await.reconnect_attempts()
    }

    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: impl Into<RealtimeEvent>) -> usize {
        self.listeners.count(&event.into())
    }

    async fn close_quietly(&self) {
        if let Err(e) = self.connection.close().await {
            tracing::debug!("Close handshake on {} failed: {}", self.namespace(), e);
        }
    }

    /// Set connection state and notify watchers
    async fn set_state(&self, new_state: ConnectionState) {
        self.connection.set_state(new_state).await;
        self.session.read().await.notify_state_change(new_state);
    }

    fn socket_url(&self) -> String {
        let mut url = self.endpoint.clone();
        if self.options.handshake_token {
            match self.credentials.as_ref().and_then(|c| c.access_token()) {
                Some(token) => {
                    url.query_pairs_mut().append_pair("token", &token);
                }
                None => tracing::warn!(
                    "{} expects a handshake token but none is stored",
                    self.namespace()
                ),
            }
        }
        url.to_string()
    }

    /// Handshake, start the read loop and heartbeat, then authenticate.
    async fn open_socket(&self, user_id: &str) -> Result<()> {
        self.set_state(ConnectionState::Connecting).await;
        tracing::info!("Connecting to {}", self.endpoint);

        let ws_stream =
            match WebSocketFactory::create(&self.socket_url(), self.options.connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!("Connection to {} failed: {}", self.endpoint, e);
                    self.set_state(ConnectionState::Disconnected).await;
                    return Err(e);
                }
            };
        let (write_half, read_half) = ws_stream.split();

        // A previous socket's read loop must not close the new writer
        self.session.write().await.socket_tasks.abort_all();
        self.connection.set_writer(write_half).await;
        self.set_state(ConnectionState::Connected).await;

        let timeout = Arc::new(Notify::new());
        {
            let mut session = self.session.write().await;
            session.pending_heartbeat = false;
            session.connected_at = Some(Instant::now());

            let router = EventRouter::new(
                self.options.namespace.clone(),
                Arc::clone(&self.connection),
                Arc::clone(&self.session),
                Arc::clone(&self.listeners),
            );
            session.socket_tasks.spawn(Self::read_loop(
                self.clone(),
                read_half,
                router,
                Arc::clone(&timeout),
            ));

            if let Some(interval) = self.options.heartbeat_interval {
                let heartbeat = HeartbeatManager::new(
                    Arc::downgrade(&self.connection),
                    Arc::downgrade(&self.session),
                    timeout,
                )
                .with_interval(interval);
                session.socket_tasks.spawn(heartbeat.run());
            }
        }

        // The server binds the user per connection, so this runs on every connect
        let auth = ChannelMessage::new(
            self.options.auth_event.clone(),
            serde_json::json!({ "userId": user_id }),
        );
        if let Err(e) = self.connection.send_message(&auth).await {
            tracing::error!("Failed to authenticate on {}: {}", self.namespace(), e);
            self.close_quietly().await;
            self.set_state(ConnectionState::Disconnected).await;
            return Err(e);
        }

        if self
            .connection
            .transition(ConnectionState::Connected, ConnectionState::Authenticating)
            .await
        {
            self.session
                .read()
                .await
                .notify_state_change(ConnectionState::Authenticating);
        }

        tracing::info!("Connected to {} as user {}", self.namespace(), user_id);
        Ok(())
    }

    async fn read_loop(
        self,
        mut read_half: SplitStream<WsStream>,
        router: EventRouter,
        heartbeat_timeout: Arc<Notify>,
    ) {
        tracing::debug!("Starting read task for {}", self.namespace());

        let reason = loop {
            let frame = tokio::select! {
                frame = read_half.next() => frame,
                _ = heartbeat_timeout.notified() => break DisconnectReason::HeartbeatTimeout,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChannelMessage>(&text) {
                        Ok(message) => router.route(message).await,
                        Err(e) => {
                            tracing::error!("Failed to parse frame: {} - Raw: {}", e, text);
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    break DisconnectReason::ServerClosed(reason);
                }
                Some(Ok(Message::Pong(_))) => {
                    self.session.write().await.pending_heartbeat = false;
                }
                Some(Ok(Message::Ping(data))) => {
                    tracing::debug!("Received ping ({} bytes)", data.len());
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::warn!("Received unexpected binary frame ({} bytes)", data.len());
                }
                Some(Ok(Message::Frame(_))) => {
                    tracing::debug!("Received raw frame (internal)");
                }
                Some(Err(e)) => break DisconnectReason::TransportError(e.to_string()),
                None => break DisconnectReason::TransportClosed,
            }
        };

        self.handle_disconnect(reason).await;
    }

    async fn handle_disconnect(&self, reason: DisconnectReason) {
        // The peer may already be gone
        self.close_quietly().await;

        let manual = {
            let mut session = self.session.write().await;
            // Only a socket that stayed up earns a fresh set of attempts
            let stable = Duration::from_millis(STABLE_CONNECTION);
            if session
                .connected_at
                .take()
                .is_some_and(|opened| opened.elapsed() >= stable)
            {
                session.reconnect.reset();
            }
            session.was_manual_disconnect
        };
        if manual {
            tracing::info!("{} closed: {}", self.namespace(), reason);
        } else {
            tracing::warn!("Lost connection to {}: {}", self.namespace(), reason);
        }

        self.set_state(ConnectionState::Disconnected).await;
    }

    /// Runs for the lifetime of a connected session; restarts the socket
    /// after every unexpected disconnect.
    async fn watch_state(self, mut rx: watch::Receiver<(ConnectionState, bool)>) {
        while rx.changed().await.is_ok() {
            let (state, was_manual) = *rx.borrow_and_update();

            if state == ConnectionState::Disconnected && !was_manual {
                self.try_reconnect().await;
            }
        }
        tracing::debug!("Reconnection watcher for {} finished", self.namespace());
    }

    async fn try_reconnect(&self) {
        loop {
            let state = self.connection.state().await;
            if state != ConnectionState::Disconnected {
                tracing::debug!("{} is {:?}, skipping reconnect", self.namespace(), state);
                return;
            }

            let (user_id, delay, attempt, max) = {
                let mut session = self.session.write().await;
                if session.was_manual_disconnect {
                    return;
                }
                let Some(user_id) = session.user_id.clone() else {
                    return;
                };
                let Some(delay) = session.reconnect.next_delay() else {
                    return;
                };
                (
                    user_id,
                    delay,
                    session.reconnect.attempts(),
                    self.options.max_reconnect_attempts,
                )
            };

            tracing::info!(
                "Reconnecting to {} in {:?} (attempt {}/{})",
                self.namespace(),
                delay,
                attempt,
                max
            );
            tokio::time::sleep(delay).await;

            if self.session.read().await.was_manual_disconnect {
                return;
            }

            match self.open_socket(&user_id).await {
                Ok(()) => {
                    tracing::info!("Reconnected to {}", self.namespace());
                    return;
                }
                Err(e) => {
                    tracing::warn!("Reconnect attempt {} to {} failed: {}", attempt, self.namespace(), e);
                    if attempt >= max {
                        tracing::warn!(
                            "Giving up on {} after {} reconnect attempts",
                            self.namespace(),
                            attempt
                        );
                        return;
                    }
                }
            }
        }
    }
}
