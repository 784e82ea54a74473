use serde::{Deserialize, Serialize};

use crate::domain::business::BusinessId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatbotId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    BottomRight,
    BottomLeft,
}

impl WidgetPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
        }
    }

    /// Unknown values fall back to the default corner rather than failing a
    /// read path over presentation data.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "bottom-left" => Self::BottomLeft,
            _ => Self::BottomRight,
        }
    }
}

/// Per-chatbot behavioral configuration. `fallback_message` is the verbatim
/// reply used whenever generation fails or produces nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: ChatbotId,
    pub business_id: BusinessId,
    pub name: String,
    pub description: Option<String>,
    pub welcome_message: String,
    pub fallback_message: String,
    pub is_active: bool,
    pub widget_color: String,
    pub widget_position: WidgetPosition,
}
