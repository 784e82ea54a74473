use serde::{Deserialize, Serialize};

use crate::domain::chatbot::ChatbotId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ConversationStarted,
    MessageSent,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversationStarted => "conversation_started",
            Self::MessageSent => "message_sent",
        }
    }
}

/// Append-only fact record written alongside message writes. The pipeline
/// never reads these back; they feed dashboard reporting only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub chatbot_id: ChatbotId,
    pub visitor_id: Option<String>,
    pub event_type: EventType,
    pub event_data: serde_json::Value,
}
