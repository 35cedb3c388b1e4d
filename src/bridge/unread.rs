use crate::RealtimeEvent;
use crate::channel::{ChannelManager, Subscription};
use crate::infrastructure::{ApiClient, TaskManager};
use crate::types::{Result, SessionError, UNREAD_POLL_INTERVAL, endpoints};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// How a realtime event changes an unread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountUpdate {
    /// The payload carries the new count
    Set,
    /// One more unread item
    Increment,
    /// Something changed; ask the server
    Refetch,
}

/// Where a counter loads its value and which events move it.
#[derive(Debug, Clone)]
pub struct UnreadSource {
    pub name: &'static str,
    pub endpoint: String,
    pub events: Vec<(RealtimeEvent, CountUpdate)>,
}

impl UnreadSource {
    pub fn notifications() -> Self {
        Self {
            name: "notifications",
            endpoint: endpoints::NOTIFICATIONS_UNREAD_COUNT.to_string(),
            events: vec![
                (RealtimeEvent::UnreadCountUpdate, CountUpdate::Set),
                (RealtimeEvent::Notification, CountUpdate::Increment),
            ],
        }
    }

    pub fn messages() -> Self {
        Self {
            name: "messages",
            endpoint: endpoints::MESSAGES_UNREAD_COUNT.to_string(),
            events: vec![
                (RealtimeEvent::UnreadCount, CountUpdate::Set),
                (RealtimeEvent::NewMessage, CountUpdate::Refetch),
                (RealtimeEvent::ConversationUpdate, CountUpdate::Refetch),
                (RealtimeEvent::MessageMarkedAsRead, CountUpdate::Refetch),
            ],
        }
    }
}

/// Reads an unread count from a bare number or an object carrying
/// `count`, `unreadCount` or `unread_count`.
pub fn extract_count(payload: &Value) -> Option<u64> {
    match payload {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => ["count", "unreadCount", "unread_count"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(extract_count),
        _ => None,
    }
}

enum Command {
    Apply(CountUpdate, Value),
}

#[derive(Default)]
struct CounterRun {
    user_id: Option<String>,
    tasks: TaskManager,
    subscriptions: Vec<Subscription>,
}

/// Unread count for one realtime namespace.
///
/// [`start`](Self::start) loads the count over REST, follows the source's
/// realtime events and re-polls on a fixed interval so a missed event is
/// corrected without a reconnect. The local mutations are optimistic and
/// get overwritten by the next server value.
#[derive(Clone)]
pub struct UnreadCounter {
    source: Arc<UnreadSource>,
    api: ApiClient,
    channel: ChannelManager,
    poll_interval: Duration,
    count: Arc<watch::Sender<u64>>,
    run: Arc<Mutex<CounterRun>>,
}

impl UnreadCounter {
    pub fn new(source: UnreadSource, api: ApiClient, channel: ChannelManager) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            source: Arc::new(source),
            api,
            channel,
            poll_interval: Duration::from_millis(UNREAD_POLL_INTERVAL),
            count: Arc::new(count),
            run: Arc::new(Mutex::new(CounterRun::default())),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Begin tracking for `user_id`. Restarts when the user changes; a
    /// no-op when already tracking the same user.
    pub async fn start(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut run = self.run.lock().await;
        if run.user_id.as_deref() == Some(user_id.as_str()) {
            return;
        }

        run.tasks.abort_all();
        run.subscriptions.clear();
        self.count.send_replace(0);

        if let Err(e) = self.refresh().await {
            tracing::warn!("Initial {} unread count failed: {}", self.source.name, e);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for (event, update) in &self.source.events {
            let tx = tx.clone();
            let update = *update;
            run.subscriptions.push(self.channel.on(event.clone(), move |payload| {
                let _ = tx.send(Command::Apply(update, payload));
            }));
        }
        run.tasks.spawn(Self::worker(self.clone(), rx));
        run.user_id = Some(user_id);

        tracing::debug!(
            "Tracking {} unread count (poll every {:?})",
            self.source.name,
            self.poll_interval
        );
    }

    /// Stop listening and polling. The last count stays readable.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        run.tasks.abort_all();
        run.subscriptions.clear();
        run.user_id = None;
    }

    /// Load the count from the server and publish it.
    pub async fn refresh(&self) -> Result<u64> {
        let payload: Value = self.api.get_json(&self.source.endpoint).await?;
        let count = extract_count(&payload).ok_or_else(|| {
            SessionError::UnexpectedResponse(format!(
                "no unread count in {} response: {}",
                self.source.endpoint, payload
            ))
        })?;
        self.count.send_replace(count);
        Ok(count)
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    /// Follow count changes.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.count.subscribe()
    }

    pub fn decrement_unread_count(&self) {
        self.count.send_modify(|count| *count = count.saturating_sub(1));
    }

    pub fn reset_unread_count(&self) {
        self.count.send_replace(0);
    }

    pub async fn is_running(&self) -> bool {
        self.run.lock().await.user_id.is_some()
    }

    async fn worker(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        // interval() panics on a zero period
        let period = self.poll_interval.max(Duration::from_millis(100));
        let mut poll = tokio::time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Apply(update, payload)) => self.apply(update, &payload).await,
                    None => break,
                },
                _ = poll.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::debug!("Polling {} unread count failed: {}", self.source.name, e);
                    }
                }
            }
        }
    }

    async fn apply(&self, update: CountUpdate, payload: &Value) {
        match update {
            CountUpdate::Set => match extract_count(payload) {
                Some(count) => {
                    self.count.send_replace(count);
                }
                None => {
                    tracing::debug!("Unreadable {} count payload: {}", self.source.name, payload);
                    self.refetch().await;
                }
            },
            CountUpdate::Increment => {
                self.count.send_modify(|count| *count = count.saturating_add(1));
            }
            CountUpdate::Refetch => self.refetch().await,
        }
    }

    async fn refetch(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Refreshing {} unread count failed: {}", self.source.name, e);
        }
    }
}
