use tokio::sync::watch;

/// Receives route changes requested by the session layer (sign-in after a
/// terminal auth failure, dashboard after login).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Publishes the most recent route on a watch channel.
pub struct WatchNavigator {
    tx: watch::Sender<Option<String>>,
}

impl WatchNavigator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    /// Last route navigated to, if any.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }
}

impl Default for WatchNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for WatchNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!("Navigating to {}", route);
        self.tx.send_replace(Some(route.to_string()));
    }
}
