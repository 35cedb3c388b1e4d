// Module declarations
mod builder;
mod connection;
mod core;
mod namespaces;
mod state;
mod subscription;

// Public API exports
pub use builder::{ChannelManagerBuilder, ChannelOptions};
pub use connection::{ConnectionManager, ConnectionState};
pub use core::{ChannelManager, DisconnectReason, EmitOutcome};
pub use namespaces::{MessagesChannel, NotificationsChannel, OutgoingMessage};
pub use state::ChannelSession;
pub use subscription::{Callback, EventStream, ListenerId, ListenerRegistry, Subscription};
