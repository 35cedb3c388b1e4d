use crate::types::constants::realtime_events;
use serde::{Deserialize, Serialize};

/// Type-safe realtime event names.
///
/// Serialized as the bare event string so the wire envelope stays
/// `{"event": "newMessage", ...}`; anything unrecognised round-trips through
/// [`RealtimeEvent::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RealtimeEvent {
    /// A new notification for the current user
    Notification,
    /// Notification unread count changed
    UnreadCountUpdate,
    /// A message arrived in one of the user's conversations
    NewMessage,
    /// Conversation metadata changed (last message, participants, ...)
    ConversationUpdate,
    /// Message unread count changed
    UnreadCount,
    /// Server acknowledged a `sendMessage`
    MessageSent,
    /// Server rejected a `sendMessage`
    MessageError,
    /// A message was marked as read
    MessageMarkedAsRead,
    /// Server acknowledged the post-connect `authenticate`
    Authenticated,

    /// Notification namespace registration
    Subscribe,
    /// Messages namespace registration
    Authenticate,
    SendMessage,
    MarkAsRead,
    JoinConversation,
    LeaveConversation,

    /// Custom event not known to this crate
    Custom(String),
}

impl RealtimeEvent {
    /// Parse a string into a RealtimeEvent
    pub fn parse(s: &str) -> Self {
        match s {
            realtime_events::NOTIFICATION => Self::Notification,
            realtime_events::UNREAD_COUNT_UPDATE => Self::UnreadCountUpdate,
            realtime_events::NEW_MESSAGE => Self::NewMessage,
            realtime_events::CONVERSATION_UPDATE => Self::ConversationUpdate,
            realtime_events::UNREAD_COUNT => Self::UnreadCount,
            realtime_events::MESSAGE_SENT => Self::MessageSent,
            realtime_events::MESSAGE_ERROR => Self::MessageError,
            realtime_events::MESSAGE_MARKED_AS_READ => Self::MessageMarkedAsRead,
            realtime_events::AUTHENTICATED => Self::Authenticated,
            realtime_events::SUBSCRIBE => Self::Subscribe,
            realtime_events::AUTHENTICATE => Self::Authenticate,
            realtime_events::SEND_MESSAGE => Self::SendMessage,
            realtime_events::MARK_AS_READ => Self::MarkAsRead,
            realtime_events::JOIN_CONVERSATION => Self::JoinConversation,
            realtime_events::LEAVE_CONVERSATION => Self::LeaveConversation,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Convert event to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Notification => realtime_events::NOTIFICATION,
            Self::UnreadCountUpdate => realtime_events::UNREAD_COUNT_UPDATE,
            Self::NewMessage => realtime_events::NEW_MESSAGE,
            Self::ConversationUpdate => realtime_events::CONVERSATION_UPDATE,
            Self::UnreadCount => realtime_events::UNREAD_COUNT,
            Self::MessageSent => realtime_events::MESSAGE_SENT,
            Self::MessageError => realtime_events::MESSAGE_ERROR,
            Self::MessageMarkedAsRead => realtime_events::MESSAGE_MARKED_AS_READ,
            Self::Authenticated => realtime_events::AUTHENTICATED,
            Self::Subscribe => realtime_events::SUBSCRIBE,
            Self::Authenticate => realtime_events::AUTHENTICATE,
            Self::SendMessage => realtime_events::SEND_MESSAGE,
            Self::MarkAsRead => realtime_events::MARK_AS_READ,
            Self::JoinConversation => realtime_events::JOIN_CONVERSATION,
            Self::LeaveConversation => realtime_events::LEAVE_CONVERSATION,
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for RealtimeEvent {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for RealtimeEvent {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RealtimeEvent> for String {
    fn from(event: RealtimeEvent) -> Self {
        match event {
            RealtimeEvent::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for RealtimeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
