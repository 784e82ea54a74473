use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use storebot_core::domain::analytics::AnalyticsEvent;
use storebot_core::domain::business::{Business, BusinessId};
use storebot_core::domain::chatbot::{Chatbot, ChatbotId};
use storebot_core::domain::conversation::{Conversation, ConversationId};
use storebot_core::domain::message::{Message, SenderType};
use storebot_core::domain::product::{NewProduct, Product};

pub mod analytics;
pub mod business;
pub mod chatbot;
pub mod conversation;
pub mod memory;
pub mod message;
pub mod product;

pub use analytics::SqlAnalyticsRepository;
pub use business::SqlBusinessRepository;
pub use chatbot::SqlChatbotRepository;
pub use conversation::SqlConversationRepository;
pub use memory::{
    InMemoryAnalyticsRepository, InMemoryBusinessRepository, InMemoryChatbotRepository,
    InMemoryConversationRepository, InMemoryMessageRepository, InMemoryProductRepository,
};
pub use message::SqlMessageRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn find_by_id(&self, id: &BusinessId) -> Result<Option<Business>, RepositoryError>;
}

#[async_trait]
pub trait ChatbotRepository: Send + Sync {
    /// Resolves a chatbot for public-facing invocation. Inactive chatbots are
    /// indistinguishable from missing ones here.
    async fn find_active(&self, id: &ChatbotId) -> Result<Option<Chatbot>, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_in_stock(
        &self,
        business_id: &BusinessId,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Upserts one batch keyed on `(business_id, external_id)`, stamping every
    /// touched row with the run marker. All-or-nothing per batch.
    async fn upsert_batch(
        &self,
        business_id: &BusinessId,
        batch: &[NewProduct],
        synced_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Sweeps rows the given run did not touch. Returns the deleted count.
    async fn delete_unsynced(
        &self,
        business_id: &BusinessId,
        synced_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Lookup scoped to the chatbot so a conversation id cannot be replayed
    /// against another tenant's bot.
    async fn find_for_chatbot(
        &self,
        id: &ConversationId,
        chatbot_id: &ChatbotId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn create(
        &self,
        chatbot_id: &ChatbotId,
        visitor_id: &str,
    ) -> Result<Conversation, RepositoryError>;

    /// Bumps `updated_at`; called once per turn.
    async fn touch(&self, id: &ConversationId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        sender: SenderType,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, RepositoryError>;

    /// The newest `limit` messages, returned oldest first. The bound exists to
    /// cap prompt size downstream.
    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: i64,
    ) -> Result<Vec<Message>, RepositoryError>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), RepositoryError>;
}

/// Timestamps are stored as RFC3339 with fixed microsecond precision so that
/// lexicographic ordering matches chronological ordering.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}

pub(crate) fn decode_string_list(raw: &str) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid JSON list `{raw}`: {error}")))
}

pub(crate) fn encode_string_list(values: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(values)
        .map_err(|error| RepositoryError::Decode(format!("could not encode JSON list: {error}")))
}
