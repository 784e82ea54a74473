use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use storebot_core::domain::chatbot::ChatbotId;
use storebot_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};

use super::{format_timestamp, parse_timestamp, ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_for_chatbot(
        &self,
        id: &ConversationId,
        chatbot_id: &ChatbotId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, chatbot_id, visitor_id, visitor_name, visitor_email, status,
                    created_at, updated_at
             FROM conversations WHERE id = ? AND chatbot_id = ?",
        )
        .bind(&id.0)
        .bind(&chatbot_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_conversation).transpose()
    }

    async fn create(
        &self,
        chatbot_id: &ChatbotId,
        visitor_id: &str,
    ) -> Result<Conversation, RepositoryError> {
        let id = ConversationId(format!("conv-{}", Uuid::new_v4()));
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO conversations (id, chatbot_id, visitor_id, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&chatbot_id.0)
        .bind(visitor_id)
        .bind(ConversationStatus::Active.as_str())
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(Conversation {
            id,
            chatbot_id: chatbot_id.clone(),
            visitor_id: visitor_id.to_string(),
            visitor_name: None,
            visitor_email: None,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    async fn touch(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(format_timestamp(Utc::now()))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn map_conversation(row: SqliteRow) -> Result<Conversation, RepositoryError> {
    let status_raw: String = row.get("status");
    let status = ConversationStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown conversation status `{status_raw}`")))?;

    Ok(Conversation {
        id: ConversationId(row.get("id")),
        chatbot_id: ChatbotId(row.get("chatbot_id")),
        visitor_id: row.get("visitor_id"),
        visitor_name: row.get("visitor_name"),
        visitor_email: row.get("visitor_email"),
        status,
        created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
        updated_at: parse_timestamp(row.get::<String, _>("updated_at").as_str())?,
    })
}
