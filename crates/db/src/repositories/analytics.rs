use chrono::Utc;
use uuid::Uuid;

use storebot_core::domain::analytics::AnalyticsEvent;

use super::{format_timestamp, AnalyticsRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAnalyticsRepository {
    pool: DbPool,
}

impl SqlAnalyticsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for SqlAnalyticsRepository {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), RepositoryError> {
        let event_data = serde_json::to_string(&event.event_data).map_err(|error| {
            RepositoryError::Decode(format!("could not encode event data: {error}"))
        })?;

        sqlx::query(
            "INSERT INTO analytics_events (id, chatbot_id, visitor_id, event_type, event_data, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(format!("evt-{}", Uuid::new_v4()))
        .bind(&event.chatbot_id.0)
        .bind(&event.visitor_id)
        .bind(event.event_type.as_str())
        .bind(&event_data)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
