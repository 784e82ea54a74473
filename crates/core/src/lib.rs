//! Domain model, configuration, and the pure prompt-assembly logic for the
//! storebot platform.
//!
//! Everything in this crate is I/O-free. Persistence lives in `storebot-db`,
//! model calls in `storebot-agent`, catalog ingestion in `storebot-sync`, and
//! the HTTP surface in `storebot-server`.

pub mod config;
pub mod context;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use context::{ChatMessage, ChatRole, PromptContext};
pub use domain::analytics::{AnalyticsEvent, EventType};
pub use domain::business::{Business, BusinessId, StoreCredentials};
pub use domain::chatbot::{Chatbot, ChatbotId, WidgetPosition};
pub use domain::conversation::{Conversation, ConversationId, ConversationStatus};
pub use domain::message::{Message, MessageId, SenderType};
pub use domain::product::{NewProduct, Product, ProductId};
pub use errors::TurnError;
