use crate::types::{ChannelMessage, Result, SessionError};
use crate::websocket::WsStream;
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::sync::{Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;

type WsWriter = SplitSink<WsStream, Message>;

/// Lifecycle of one namespace connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Transport open, auth emit not yet written
    Connected,
    /// Auth emit written, waiting for the optional `authenticated` ack
    Authenticating,
    /// Server acknowledged the session
    Ready,
}

impl ConnectionState {
    /// Transport is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Connected | Self::Authenticating | Self::Ready)
    }

    /// Application emits are allowed; the auth emit has already gone out.
    pub fn can_emit(&self) -> bool {
        matches!(self, Self::Authenticating | Self::Ready)
    }
}

pub struct ConnectionManager {
    ws_write: Mutex<Option<WsWriter>>,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            ws_write: Mutex::new(None),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Sets the WebSocket write sink (called after successful connection)
    pub async fn set_writer(&self, writer: WsWriter) {
        *self.ws_write.lock().await = Some(writer);
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    /// Move to `next` only if currently in `expected`.
    pub async fn transition(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        self.transition_from(&[expected], next).await
    }

    /// Move to `next` only if currently in one of `expected`.
    pub async fn transition_from(&self, expected: &[ConnectionState], next: ConnectionState) -> bool {
        let mut state = self.state.write().await;
        if expected.contains(&state) {
            *state = next;
            true
        } else {
            false
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await.is_open()
    }

    /// Serialize and write a frame.
    pub async fn send_message(&self, msg: &ChannelMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.send_raw(Message::Text(json.into())).await
    }

    pub async fn send_ping(&self) -> Result<()> {
        self.send_raw(Message::Ping(Default::default())).await
    }

    async fn send_raw(&self, message: Message) -> Result<()> {
        let mut ws_guard = self.ws_write.lock().await;
        match ws_guard.as_mut() {
            Some(ws) => {
                ws.send(message).await?;
                Ok(())
            }
            None => Err(SessionError::NotConnected),
        }
    }

    /// Closes the WebSocket connection gracefully
    pub async fn close(&self) -> Result<()> {
        let writer = self.ws_write.lock().await.take();
        let result = match writer {
            Some(mut ws) => ws.close().await.map_err(SessionError::from),
            None => Ok(()),
        };

        self.set_state(ConnectionState::Disconnected).await;
        result
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
