use serde::{Deserialize, Serialize};

use crate::RealtimeEvent;

/// A single realtime frame: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelMessage {
    pub event: RealtimeEvent,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ChannelMessage {
    pub fn new(event: impl Into<RealtimeEvent>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}
