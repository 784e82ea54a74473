//! In-memory repository doubles for pipeline tests that need to inject
//! storage behavior (or failures) without a database file.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use storebot_core::domain::analytics::AnalyticsEvent;
use storebot_core::domain::business::{Business, BusinessId};
use storebot_core::domain::chatbot::{Chatbot, ChatbotId};
use storebot_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use storebot_core::domain::message::{Message, MessageId, SenderType};
use storebot_core::domain::product::{NewProduct, Product, ProductId};

use super::{
    AnalyticsRepository, BusinessRepository, ChatbotRepository, ConversationRepository,
    MessageRepository, ProductRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryBusinessRepository {
    businesses: RwLock<HashMap<String, Business>>,
}

impl InMemoryBusinessRepository {
    pub async fn insert(&self, business: Business) {
        self.businesses.write().await.insert(business.id.0.clone(), business);
    }
}

#[async_trait::async_trait]
impl BusinessRepository for InMemoryBusinessRepository {
    async fn find_by_id(&self, id: &BusinessId) -> Result<Option<Business>, RepositoryError> {
        Ok(self.businesses.read().await.get(&id.0).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryChatbotRepository {
    chatbots: RwLock<HashMap<String, Chatbot>>,
}

impl InMemoryChatbotRepository {
    pub async fn insert(&self, chatbot: Chatbot) {
        self.chatbots.write().await.insert(chatbot.id.0.clone(), chatbot);
    }
}

#[async_trait::async_trait]
impl ChatbotRepository for InMemoryChatbotRepository {
    async fn find_active(&self, id: &ChatbotId) -> Result<Option<Chatbot>, RepositoryError> {
        Ok(self.chatbots.read().await.get(&id.0).filter(|bot| bot.is_active).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<(Product, DateTime<Utc>)>>,
}

impl InMemoryProductRepository {
    pub async fn insert(&self, product: Product) {
        self.products.write().await.push((product, Utc::now()));
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list_in_stock(
        &self,
        business_id: &BusinessId,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|(p, _)| &p.business_id == business_id && p.in_stock)
            .take(limit.max(0) as usize)
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|(p, _)| &p.business_id == business_id)
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn upsert_batch(
        &self,
        business_id: &BusinessId,
        batch: &[NewProduct],
        synced_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        for incoming in batch {
            let existing = products.iter_mut().find(|(p, _)| {
                &p.business_id == business_id && p.external_id == incoming.external_id
            });
            let product = Product {
                id: existing
                    .as_ref()
                    .map(|(p, _)| p.id.clone())
                    .unwrap_or_else(|| ProductId(format!("prod-{}", Uuid::new_v4()))),
                business_id: business_id.clone(),
                external_id: incoming.external_id,
                name: incoming.name.clone(),
                description: incoming.description.clone(),
                short_description: incoming.short_description.clone(),
                price: incoming.price,
                regular_price: incoming.regular_price,
                sale_price: incoming.sale_price,
                sku: incoming.sku.clone(),
                stock_quantity: incoming.stock_quantity,
                in_stock: incoming.in_stock,
                categories: incoming.categories.clone(),
                tags: incoming.tags.clone(),
                images: incoming.images.clone(),
                permalink: incoming.permalink.clone(),
            };
            match existing {
                Some(slot) => *slot = (product, synced_at),
                None => products.push((product, synced_at)),
            }
        }
        Ok(())
    }

    async fn delete_unsynced(
        &self,
        business_id: &BusinessId,
        synced_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|(p, stamp)| &p.business_id != business_id || *stamp == synced_at);
        Ok((before - products.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_for_chatbot(
        &self,
        id: &ConversationId,
        chatbot_id: &ChatbotId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(&id.0)
            .filter(|conversation| &conversation.chatbot_id == chatbot_id)
            .cloned())
    }

    async fn create(
        &self,
        chatbot_id: &ChatbotId,
        visitor_id: &str,
    ) -> Result<Conversation, RepositoryError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId(format!("conv-{}", Uuid::new_v4())),
            chatbot_id: chatbot_id.clone(),
            visitor_id: visitor_id.to_string(),
            visitor_name: None,
            visitor_email: None,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.conversations.write().await.insert(conversation.id.0.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn touch(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        if let Some(conversation) = self.conversations.write().await.get_mut(&id.0) {
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageRepository {
    pub async fn all(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        sender: SenderType,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, RepositoryError> {
        let message = Message {
            id: MessageId(format!("msg-{}", Uuid::new_v4())),
            conversation_id: conversation_id.clone(),
            content: content.to_string(),
            sender_type: sender,
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: Utc::now(),
        };
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: i64,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let matching: Vec<_> = messages
            .iter()
            .filter(|message| &message.conversation_id == conversation_id)
            .cloned()
            .collect();
        let start = matching.len().saturating_sub(limit.max(0) as usize);
        Ok(matching[start..].to_vec())
    }
}

#[derive(Default)]
pub struct InMemoryAnalyticsRepository {
    events: RwLock<Vec<AnalyticsEvent>>,
}

impl InMemoryAnalyticsRepository {
    pub async fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for InMemoryAnalyticsRepository {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event);
        Ok(())
    }
}
