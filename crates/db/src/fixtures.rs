//! Deterministic seed rows shared by repository and server tests. Dashboards
//! normally create these rows; the pipeline only reads them.

use crate::repositories::RepositoryError;
use crate::DbPool;

pub const FALLBACK_MESSAGE: &str = "Sorry, I didn't catch that. A teammate can help at support@acme.test.";
pub const WELCOME_MESSAGE: &str = "Hi! Ask me anything about our gear.";

const SEED_TIMESTAMP: &str = "2026-01-01T00:00:00.000000Z";

pub async fn seed_business(
    pool: &DbPool,
    id: &str,
    with_credentials: bool,
) -> Result<(), RepositoryError> {
    let (store_url, key, secret) = if with_credentials {
        (Some("https://shop.acme.test"), Some("ck_fixture"), Some("cs_fixture"))
    } else {
        (None, None, None)
    };

    sqlx::query(
        "INSERT INTO businesses (id, name, description, website_url, store_url,
                                 store_consumer_key, store_consumer_secret, created_at, updated_at)
         VALUES (?, 'Acme Outdoors', 'camping gear', 'https://acme.test', ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(store_url)
    .bind(key)
    .bind(secret)
    .bind(SEED_TIMESTAMP)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed_chatbot(
    pool: &DbPool,
    id: &str,
    business_id: &str,
    active: bool,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO chatbots (id, business_id, name, welcome_message, fallback_message,
                               is_active, widget_color, widget_position, created_at, updated_at)
         VALUES (?, ?, 'Acme Assistant', ?, ?, ?, '#2563eb', 'bottom-right', ?, ?)",
    )
    .bind(id)
    .bind(business_id)
    .bind(WELCOME_MESSAGE)
    .bind(FALLBACK_MESSAGE)
    .bind(active)
    .bind(SEED_TIMESTAMP)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed_product(
    pool: &DbPool,
    id: &str,
    business_id: &str,
    external_id: i64,
    name: &str,
    in_stock: bool,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO products (id, business_id, external_id, name, short_description, price,
                               sku, in_stock, categories, tags, images, permalink, synced_at)
         VALUES (?, ?, ?, ?, '<p>Reliable gear</p>', 49.99, ?, ?, '[\"camping\"]', '[]',
                 '[\"https://img.acme.test/p.jpg\"]', 'https://shop.acme.test/p', ?)",
    )
    .bind(id)
    .bind(business_id)
    .bind(external_id)
    .bind(name)
    .bind(format!("SKU-{external_id}"))
    .bind(in_stock)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    Ok(())
}
