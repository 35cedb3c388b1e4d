use super::core::{ChannelManager, EmitOutcome};
use super::subscription::Subscription;
use crate::RealtimeEvent;
use crate::types::Result;
use serde::Serialize;
use serde_json::{Value, json};

/// `/notifications` namespace.
#[derive(Clone)]
pub struct NotificationsChannel {
    manager: ChannelManager,
}

impl NotificationsChannel {
    pub fn new(manager: ChannelManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ChannelManager {
        &self.manager
    }

    pub async fn connect(&self, user_id: impl Into<String>) -> Result<()> {
        self.manager.connect(user_id).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.manager.disconnect().await
    }

    pub fn on_notification<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::Notification, callback)
    }

    pub fn on_unread_count_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::UnreadCountUpdate, callback)
    }
}

/// Outgoing chat message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub content: String,
}

impl OutgoingMessage {
    pub fn to_conversation(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            receiver_id: None,
            content: content.into(),
        }
    }

    pub fn to_user(receiver_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: None,
            receiver_id: Some(receiver_id.into()),
            content: content.into(),
        }
    }
}

/// `/messages` namespace.
#[derive(Clone)]
pub struct MessagesChannel {
    manager: ChannelManager,
}

impl MessagesChannel {
    pub fn new(manager: ChannelManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ChannelManager {
        &self.manager
    }

    pub async fn connect(&self, user_id: impl Into<String>) -> Result<()> {
        self.manager.connect(user_id).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.manager.disconnect().await
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<EmitOutcome> {
        self.manager
            .emit(RealtimeEvent::SendMessage, serde_json::to_value(message)?)
            .await
    }

    pub async fn mark_as_read(&self, message_id: &str) -> Result<EmitOutcome> {
        self.manager
            .emit(RealtimeEvent::MarkAsRead, json!({ "messageId": message_id }))
            .await
    }

    pub async fn join_conversation(&self, conversation_id: &str) -> Result<EmitOutcome> {
        self.manager
            .emit(
                RealtimeEvent::JoinConversation,
                json!({ "conversationId": conversation_id }),
            )
            .await
    }

    pub async fn leave_conversation(&self, conversation_id: &str) -> Result<EmitOutcome> {
        self.manager
            .emit(
                RealtimeEvent::LeaveConversation,
                json!({ "conversationId": conversation_id }),
            )
            .await
    }

    pub fn on_new_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::NewMessage, callback)
    }

    pub fn on_conversation_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::ConversationUpdate, callback)
    }

    pub fn on_unread_count<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::UnreadCount, callback)
    }

    pub fn on_message_sent<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::MessageSent, callback)
    }

    pub fn on_message_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::MessageError, callback)
    }

    pub fn on_message_marked_as_read<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.manager.on(RealtimeEvent::MessageMarkedAsRead, callback)
    }
}
