use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use storebot_core::domain::business::{Business, BusinessId};

use super::{BusinessRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBusinessRepository {
    pool: DbPool,
}

impl SqlBusinessRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BusinessRepository for SqlBusinessRepository {
    async fn find_by_id(&self, id: &BusinessId) -> Result<Option<Business>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, website_url, store_url, store_consumer_key, store_consumer_secret
             FROM businesses WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_business).transpose()
    }
}

fn map_business(row: SqliteRow) -> Result<Business, RepositoryError> {
    Ok(Business {
        id: BusinessId(row.get("id")),
        name: row.get("name"),
        description: row.get("description"),
        website_url: row.get("website_url"),
        store_url: row.get("store_url"),
        store_consumer_key: row.get("store_consumer_key"),
        store_consumer_secret: row.get("store_consumer_secret"),
    })
}
