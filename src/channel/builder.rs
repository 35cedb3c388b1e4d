use super::connection::{ConnectionManager, ConnectionState};
use super::core::ChannelManager;
use super::state::ChannelSession;
use super::subscription::ListenerRegistry;
use crate::RealtimeEvent;
use crate::credentials::CredentialStore;
use crate::infrastructure::{Timer, realtime_endpoint};
use crate::types::{
    DEFAULT_TIMEOUT, HEARTBEAT_INTERVAL, MAX_RECONNECT_ATTEMPTS, MESSAGES_NAMESPACE,
    NOTIFICATIONS_NAMESPACE, RECONNECT_DELAY, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Per-namespace connection settings.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Namespace path, e.g. `/messages`
    pub namespace: String,
    /// Emitted with `{ "userId": ... }` after every (re)connect
    pub auth_event: RealtimeEvent,
    /// Send the stored access token as the `token` handshake query parameter
    pub handshake_token: bool,
    /// Base reconnect delay, multiplied by the attempt number
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Ping interval; `None` disables dead-connection detection
    pub heartbeat_interval: Option<Duration>,
    pub connect_timeout: Duration,
}

impl ChannelOptions {
    pub fn new(namespace: impl Into<String>, auth_event: RealtimeEvent) -> Self {
        Self {
            namespace: namespace.into(),
            auth_event,
            handshake_token: false,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: Some(Duration::from_millis(HEARTBEAT_INTERVAL)),
            connect_timeout: Duration::from_millis(DEFAULT_TIMEOUT),
        }
    }

    /// `/notifications`: token in the handshake, then `subscribe`.
    pub fn notifications() -> Self {
        Self {
            handshake_token: true,
            ..Self::new(NOTIFICATIONS_NAMESPACE, RealtimeEvent::Subscribe)
        }
    }

    /// `/messages`: post-connect `authenticate`.
    pub fn messages() -> Self {
        Self::new(MESSAGES_NAMESPACE, RealtimeEvent::Authenticate)
    }

    pub fn with_reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Builder for [`ChannelManager`].
pub struct ChannelManagerBuilder {
    api_url: String,
    options: ChannelOptions,
    credentials: Option<Arc<CredentialStore>>,
}

impl ChannelManagerBuilder {
    pub fn new(api_url: impl Into<String>, options: ChannelOptions) -> Self {
        Self {
            api_url: api_url.into(),
            options,
            credentials: None,
        }
    }

    /// Source of the handshake token for namespaces that need one.
    pub fn with_credentials(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Resolve the namespace URL and build an idle manager.
    pub fn build(self) -> Result<ChannelManager> {
        let endpoint = realtime_endpoint(&self.api_url, &self.options.namespace)?;
        let timer = Timer::new(
            self.options.reconnect_delay,
            self.options.max_reconnect_attempts,
        );

        tracing::debug!(
            "Built channel manager for {} ({:?})",
            endpoint,
            ConnectionState::Disconnected
        );

        Ok(ChannelManager {
            endpoint,
            options: self.options,
            credentials: self.credentials,
            connection: Arc::new(ConnectionManager::new()),
            session: Arc::new(RwLock::new(ChannelSession::new(timer))),
            listeners: Arc::new(ListenerRegistry::new()),
        })
    }
}
