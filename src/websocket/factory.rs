use crate::types::{Result, SessionError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket factory for creating WebSocket connections
pub struct WebSocketFactory;

impl WebSocketFactory {
    /// Open a WebSocket connection, failing if the handshake outlasts `timeout`.
    pub async fn create(url: &str, timeout: Duration) -> Result<WsStream> {
        tracing::debug!("Creating WebSocket connection to: {}", redact_token(url));

        let (stream, response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| {
                SessionError::Connection(format!("handshake timed out after {:?}", timeout))
            })??;

        tracing::debug!("WebSocket handshake completed ({})", response.status());
        Ok(stream)
    }
}

/// Strip the handshake token before a URL reaches the logs.
fn redact_token(url: &str) -> String {
    match url.split_once("token=") {
        Some((head, tail)) => {
            let rest = tail.split_once('&').map(|(_, r)| format!("&{}", r));
            format!("{}token=***{}", head, rest.unwrap_or_default())
        }
        None => url.to_string(),
    }
}
