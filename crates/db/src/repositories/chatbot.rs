use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use storebot_core::domain::business::BusinessId;
use storebot_core::domain::chatbot::{Chatbot, ChatbotId, WidgetPosition};

use super::{ChatbotRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChatbotRepository {
    pool: DbPool,
}

impl SqlChatbotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatbotRepository for SqlChatbotRepository {
    async fn find_active(&self, id: &ChatbotId) -> Result<Option<Chatbot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, business_id, name, description, welcome_message, fallback_message,
                    is_active, widget_color, widget_position
             FROM chatbots WHERE id = ? AND is_active = 1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_chatbot))
    }
}

fn map_chatbot(row: SqliteRow) -> Chatbot {
    Chatbot {
        id: ChatbotId(row.get("id")),
        business_id: BusinessId(row.get("business_id")),
        name: row.get("name"),
        description: row.get("description"),
        welcome_message: row.get("welcome_message"),
        fallback_message: row.get("fallback_message"),
        is_active: row.get::<i64, _>("is_active") != 0,
        widget_color: row.get("widget_color"),
        widget_position: WidgetPosition::parse_or_default(row.get::<String, _>("widget_position").as_str()),
    }
}
