use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use storebot_core::domain::conversation::ConversationId;
use storebot_core::domain::message::{Message, MessageId, SenderType};

use super::{format_timestamp, parse_timestamp, MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        sender: SenderType,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, RepositoryError> {
        let id = MessageId(format!("msg-{}", Uuid::new_v4()));
        let now = Utc::now();
        let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        let metadata_raw = serde_json::to_string(&metadata)
            .map_err(|error| RepositoryError::Decode(format!("could not encode metadata: {error}")))?;

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, content, sender_type, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&conversation_id.0)
        .bind(content)
        .bind(sender.as_str())
        .bind(&metadata_raw)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id,
            conversation_id: conversation_id.clone(),
            content: content.to_string(),
            sender_type: sender,
            metadata,
            created_at: now,
        })
    }

    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: i64,
    ) -> Result<Vec<Message>, RepositoryError> {
        // Newest `limit` rows; rowid breaks ties within one timestamp.
        let rows = sqlx::query(
            "SELECT id, conversation_id, content, sender_type, metadata, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(&conversation_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages =
            rows.into_iter().map(map_message).collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn map_message(row: SqliteRow) -> Result<Message, RepositoryError> {
    let sender_raw: String = row.get("sender_type");
    let sender_type = SenderType::parse(&sender_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown sender type `{sender_raw}`")))?;
    let metadata_raw: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid metadata JSON: {error}")))?;

    Ok(Message {
        id: MessageId(row.get("id")),
        conversation_id: ConversationId(row.get("conversation_id")),
        content: row.get("content"),
        sender_type,
        metadata,
        created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
    })
}
