use super::RealtimeEvent;
use crate::channel::{ChannelSession, ConnectionManager, ConnectionState, ListenerRegistry};
use crate::types::ChannelMessage;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Routes incoming frames: protocol acks update the session, everything is
/// then fanned out to application listeners.
pub struct EventRouter {
    namespace: String,
    connection: Arc<ConnectionManager>,
    session: Arc<RwLock<ChannelSession>>,
    listeners: Arc<ListenerRegistry>,
}

impl EventRouter {
    pub fn new(
        namespace: String,
        connection: Arc<ConnectionManager>,
        session: Arc<RwLock<ChannelSession>>,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            namespace,
            connection,
            session,
            listeners,
        }
    }

    /// Routes a message to the appropriate handler(s)
    pub async fn route(&self, message: ChannelMessage) {
        if message.event == RealtimeEvent::Authenticated {
            self.handle_authenticated().await;
        }

        let delivered = self.listeners.emit(&message.event, &message.data);
        tracing::debug!(
            "Routed '{}' on {} to {} listener(s)",
            message.event,
            self.namespace,
            delivered
        );
    }

    /// The ack can overtake the Connected → Authenticating step, since the
    /// auth frame is written before that state change.
    async fn handle_authenticated(&self) {
        if self
            .connection
            .transition_from(
                &[ConnectionState::Connected, ConnectionState::Authenticating],
                ConnectionState::Ready,
            )
            .await
        {
            let mut session = self.session.write().await;
            session.reconnect.reset();
            session.notify_state_change(ConnectionState::Ready);
            tracing::info!("Session on {} authenticated", self.namespace);
        } else {
            tracing::debug!(
                "Ignoring 'authenticated' on {} in state {:?}",
                self.namespace,
                self.connection.state().await
            );
        }
    }
}
