use super::connection::ConnectionState;
use crate::infrastructure::{TaskManager, Timer};
use std::time::Instant;
use tokio::sync::watch;

/// Mutable state of one namespace session.
pub struct ChannelSession {
    /// User the socket authenticates as; survives reconnects
    pub user_id: Option<String>,

    /// Reconnect backoff; its attempt count is the session's reconnect counter
    pub reconnect: Timer,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    /// A ping went out and no pong has come back yet
    pub pending_heartbeat: bool,

    /// When the current socket opened
    pub connected_at: Option<Instant>,

    /// Read loop and heartbeat of the current socket
    pub socket_tasks: TaskManager,

    /// Reconnection watcher
    pub watcher: TaskManager,

    /// Sender for state change notifications
    pub state_change_tx: Option<watch::Sender<(ConnectionState, bool)>>,
}

impl ChannelSession {
    pub fn new(reconnect: Timer) -> Self {
        Self {
            user_id: None,
            reconnect,
            was_manual_disconnect: false,
            pending_heartbeat: false,
            connected_at: None,
            socket_tasks: TaskManager::new(),
            watcher: TaskManager::new(),
            state_change_tx: None,
        }
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect.attempts()
    }

    /// Notify state change watchers
    pub fn notify_state_change(&self, state: ConnectionState) {
        if let Some(tx) = &self.state_change_tx
            && tx.send((state, self.was_manual_disconnect)).is_err()
        {
            tracing::debug!(
                "State change watcher gone, could not notify state: {:?}",
                state
            );
        }
    }

    /// Forget everything tied to the current user and socket.
    pub fn teardown(&mut self) {
        self.was_manual_disconnect = true;
        self.watcher.abort_all();
        self.socket_tasks.abort_all();
        self.state_change_tx = None;
        self.user_id = None;
        self.pending_heartbeat = false;
        self.connected_at = None;
        self.reconnect.reset();
    }
}
