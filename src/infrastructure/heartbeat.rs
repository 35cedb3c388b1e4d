use crate::channel::{ChannelSession, ConnectionManager};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time;

/// Pings the server on a fixed interval and signals `timeout` when a ping
/// goes unanswered for a whole interval.
pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
    session: Weak<RwLock<ChannelSession>>,
    timeout: Arc<Notify>,
}

impl HeartbeatManager {
    pub fn new(
        connection: Weak<ConnectionManager>,
        session: Weak<RwLock<ChannelSession>>,
        timeout: Arc<Notify>,
    ) -> Self {
        Self {
            interval: Duration::from_millis(crate::types::HEARTBEAT_INTERVAL),
            connection,
            session,
            timeout,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Heartbeat loop; ends when the channel is dropped or a timeout fires.
    pub async fn run(self) {
        let mut interval_timer = time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        // First tick completes immediately
        interval_timer.tick().await;

        loop {
            interval_timer.tick().await;

            let (Some(connection), Some(session)) =
                (self.connection.upgrade(), self.session.upgrade())
            else {
                // Channel dropped, exit heartbeat task
                break;
            };

            if !connection.is_connected().await {
                continue;
            }

            {
                let mut session = session.write().await;
                if session.pending_heartbeat {
                    tracing::warn!("Heartbeat timeout, dropping connection");
                    self.timeout.notify_one();
                    break;
                }
                // Raised before the ping goes out so an early pong clears it
                session.pending_heartbeat = true;
            }

            match connection.send_ping().await {
                Ok(()) => {
                    tracing::debug!("Sent heartbeat ping");
                }
                Err(e) => {
                    tracing::error!("Failed to send heartbeat: {}", e);
                }
            }
        }
    }
}
