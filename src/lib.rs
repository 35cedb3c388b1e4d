//! # Strading Session
//!
//! Client-side session layer for the Strading dashboard: cookie-backed
//! credentials, a REST client that refreshes expired tokens exactly once
//! for any number of concurrent 401s, realtime channels for the
//! `/notifications` and `/messages` namespaces, and unread counters that
//! combine REST, realtime events and polling.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strading_session::{ClientConfig, MemoryCookieJar, RealtimeEvent, SessionClient, WatchNavigator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SessionClient::new(
//!         ClientConfig::from_env()?,
//!         Arc::new(MemoryCookieJar::new()),
//!         Arc::new(WatchNavigator::new()),
//!     )?;
//!
//!     client.login("demo@strading.com", "demo123").await?;
//!
//!     let _subscription = client.messages().on_new_message(|message| {
//!         println!("new message: {}", message);
//!     });
//!     println!("unread: {}", client.message_counter().count());
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod infrastructure;
pub mod messaging;
pub mod session;
pub mod types;
pub mod websocket;

pub use auth::{AuthService, AuthSession, RefreshCoordinator, RefreshFailure, TokenPair, UserProfile};
pub use bridge::{UnreadCounter, UnreadSource};
pub use channel::{
    ChannelManager, ChannelManagerBuilder, ChannelOptions, ConnectionState, EmitOutcome,
    EventStream, MessagesChannel, NotificationsChannel, OutgoingMessage, Subscription,
};
pub use config::ClientConfig;
pub use credentials::{CookieJar, CredentialStore, MemoryCookieJar};
pub use infrastructure::{ApiClient, ApiRequest, Navigator, WatchNavigator};
pub use messaging::RealtimeEvent;
pub use session::SessionClient;
pub use types::{ChannelMessage, Result, SessionError};
