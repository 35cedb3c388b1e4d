use crate::RealtimeEvent;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

pub type Callback = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Application-level listeners, independent of any socket.
///
/// One incoming event fans out to every callback registered for it.
/// Callbacks run on the socket read task and should return quickly.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<RealtimeEvent, Vec<(ListenerId, Callback)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: RealtimeEvent, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(event).or_default().push((id, callback));
        id
    }

    /// Remove one listener. Returns whether it was registered.
    pub fn remove(&self, event: &RealtimeEvent, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(bindings) = listeners.get_mut(event) else {
            return false;
        };

        let before = bindings.len();
        bindings.retain(|(listener, _)| *listener != id);
        let removed = bindings.len() != before;
        if bindings.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Remove every listener for `event`. Returns how many were dropped.
    pub fn remove_all(&self, event: &RealtimeEvent) -> usize {
        self.lock().remove(event).map_or(0, |bindings| bindings.len())
    }

    /// Deliver `payload` to every listener of `event`. Returns the number of
    /// callbacks invoked.
    pub fn emit(&self, event: &RealtimeEvent, payload: &Value) -> usize {
        let callbacks: Vec<Callback> = {
            let listeners = self.lock();
            match listeners.get(event) {
                Some(bindings) => bindings.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return 0,
            }
        }; // Lock released here

        for callback in &callbacks {
            callback(payload.clone());
        }
        callbacks.len()
    }

    pub fn count(&self, event: &RealtimeEvent) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RealtimeEvent, Vec<(ListenerId, Callback)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Disposable handle for a registered listener.
///
/// Dropping the handle unregisters the listener; call [`detach`](Self::detach)
/// to keep it registered until an explicit `off`.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    event: RealtimeEvent,
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
    active: bool,
}

impl Subscription {
    pub(crate) fn new(event: RealtimeEvent, id: ListenerId, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            event,
            id,
            registry: Arc::downgrade(registry),
            active: true,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn event(&self) -> &RealtimeEvent {
        &self.event
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered after this handle goes away.
    pub fn detach(mut self) -> ListenerId {
        self.active = false;
        self.id
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Stream of payloads for one event; unsubscribes when dropped.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Value>,
    _subscription: Subscription,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Value>, subscription: Subscription) -> Self {
        Self {
            rx,
            _subscription: subscription,
        }
    }

    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        (
            hits,
            Arc::new(move |_| {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_removed_listener_is_never_called_again() {
        let registry = Arc::new(ListenerRegistry::new());
        let (first_hits, first) = counter();
        let (second_hits, second) = counter();

        let first_id = registry.add(RealtimeEvent::NewMessage, first);
        registry.add(RealtimeEvent::NewMessage, second);

        assert_eq!(registry.emit(&RealtimeEvent::NewMessage, &json!({})), 2);
        assert!(registry.remove(&RealtimeEvent::NewMessage, first_id));
        registry.emit(&RealtimeEvent::NewMessage, &json!({}));
        registry.emit(&RealtimeEvent::NewMessage, &json!({}));

        assert_eq!(first_hits.load(Ordering::SeqCst), 1);
        assert_eq!(second_hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listeners_are_scoped_to_their_event() {
        let registry = Arc::new(ListenerRegistry::new());
        let (hits, callback) = counter();
        registry.add(RealtimeEvent::Notification, callback);

        assert_eq!(registry.emit(&RealtimeEvent::NewMessage, &json!({})), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let registry = Arc::new(ListenerRegistry::new());
        let (hits, callback) = counter();
        let id = registry.add(RealtimeEvent::UnreadCount, callback);
        let subscription = Subscription::new(RealtimeEvent::UnreadCount, id, &registry);

        registry.emit(&RealtimeEvent::UnreadCount, &json!(1));
        drop(subscription);
        registry.emit(&RealtimeEvent::UnreadCount, &json!(2));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(&RealtimeEvent::UnreadCount), 0);
    }

    #[test]
    fn test_detached_subscription_stays_registered() {
        let registry = Arc::new(ListenerRegistry::new());
        let (_, callback) = counter();
        let id = registry.add(RealtimeEvent::UnreadCount, callback);

        let detached = Subscription::new(RealtimeEvent::UnreadCount, id, &registry).detach();

        assert_eq!(detached, id);
        assert_eq!(registry.count(&RealtimeEvent::UnreadCount), 1);
    }

    #[test]
    fn test_remove_all_for_event() {
        let registry = Arc::new(ListenerRegistry::new());
        registry.add(RealtimeEvent::MessageSent, counter().1);
        registry.add(RealtimeEvent::MessageSent, counter().1);
        registry.add(RealtimeEvent::MessageError, counter().1);

        assert_eq!(registry.remove_all(&RealtimeEvent::MessageSent), 2);
        assert_eq!(registry.count(&RealtimeEvent::MessageError), 1);
    }
}
