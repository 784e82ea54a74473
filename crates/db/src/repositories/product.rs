use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use storebot_core::domain::business::BusinessId;
use storebot_core::domain::product::{NewProduct, Product, ProductId};

use super::{
    decode_string_list, encode_string_list, format_timestamp, ProductRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list_in_stock(
        &self,
        business_id: &BusinessId,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, business_id, external_id, name, description, short_description,
                    price, regular_price, sale_price, sku, stock_quantity, in_stock,
                    categories, tags, images, permalink
             FROM products
             WHERE business_id = ? AND in_stock = 1
             ORDER BY rowid ASC
             LIMIT ?",
        )
        .bind(&business_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_product).collect()
    }

    async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, business_id, external_id, name, description, short_description,
                    price, regular_price, sale_price, sku, stock_quantity, in_stock,
                    categories, tags, images, permalink
             FROM products
             WHERE business_id = ?
             ORDER BY rowid ASC",
        )
        .bind(&business_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_product).collect()
    }

    async fn upsert_batch(
        &self,
        business_id: &BusinessId,
        batch: &[NewProduct],
        synced_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let stamp = format_timestamp(synced_at);
        let mut tx = self.pool.begin().await?;

        for product in batch {
            sqlx::query(
                "INSERT INTO products (
                     id, business_id, external_id, name, description, short_description,
                     price, regular_price, sale_price, sku, stock_quantity, in_stock,
                     categories, tags, images, permalink, synced_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (business_id, external_id) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     short_description = excluded.short_description,
                     price = excluded.price,
                     regular_price = excluded.regular_price,
                     sale_price = excluded.sale_price,
                     sku = excluded.sku,
                     stock_quantity = excluded.stock_quantity,
                     in_stock = excluded.in_stock,
                     categories = excluded.categories,
                     tags = excluded.tags,
                     images = excluded.images,
                     permalink = excluded.permalink,
                     synced_at = excluded.synced_at",
            )
            .bind(format!("prod-{}", Uuid::new_v4()))
            .bind(&business_id.0)
            .bind(product.external_id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.short_description)
            .bind(product.price)
            .bind(product.regular_price)
            .bind(product.sale_price)
            .bind(&product.sku)
            .bind(product.stock_quantity)
            .bind(product.in_stock)
            .bind(encode_string_list(&product.categories)?)
            .bind(encode_string_list(&product.tags)?)
            .bind(encode_string_list(&product.images)?)
            .bind(&product.permalink)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_unsynced(
        &self,
        business_id: &BusinessId,
        synced_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE business_id = ? AND synced_at <> ?")
            .bind(&business_id.0)
            .bind(format_timestamp(synced_at))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn map_product(row: SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.get("id")),
        business_id: BusinessId(row.get("business_id")),
        external_id: row.get("external_id"),
        name: row.get("name"),
        description: row.get("description"),
        short_description: row.get("short_description"),
        price: row.get("price"),
        regular_price: row.get("regular_price"),
        sale_price: row.get("sale_price"),
        sku: row.get("sku"),
        stock_quantity: row.get("stock_quantity"),
        in_stock: row.get::<i64, _>("in_stock") != 0,
        categories: decode_string_list(row.get::<String, _>("categories").as_str())?,
        tags: decode_string_list(row.get::<String, _>("tags").as_str())?,
        images: decode_string_list(row.get::<String, _>("images").as_str())?,
        permalink: row.get("permalink"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use storebot_core::domain::business::BusinessId;
    use storebot_core::domain::product::NewProduct;

    use crate::fixtures;
    use crate::repositories::{ProductRepository, SqlProductRepository};
    use crate::{connect_with_settings, migrations};

    fn new_product(external_id: i64, name: &str, in_stock: bool) -> NewProduct {
        NewProduct {
            external_id,
            name: name.to_string(),
            description: None,
            short_description: Some("<p>desc</p>".to_string()),
            price: Some(12.5),
            regular_price: Some(15.0),
            sale_price: None,
            sku: Some(format!("SKU-{external_id}")),
            stock_quantity: Some(3),
            in_stock,
            categories: vec!["camping".to_string()],
            tags: vec![],
            images: vec!["https://img.test/a.jpg".to_string()],
            permalink: Some("https://shop.test/p".to_string()),
        }
    }

    async fn setup() -> (crate::DbPool, BusinessId) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed_business(&pool, "biz-1", true).await.expect("seed");
        (pool, BusinessId("biz-1".to_string()))
    }

    #[tokio::test]
    async fn upsert_then_sweep_replaces_catalog_without_duplicates() {
        let (pool, business_id) = setup().await;
        let repo = SqlProductRepository::new(pool);

        let first_run = Utc::now();
        repo.upsert_batch(
            &business_id,
            &[new_product(1, "Tent", true), new_product(2, "Stove", true)],
            first_run,
        )
        .await
        .expect("first upsert");

        // Second run updates product 1, drops product 2, adds product 3.
        let second_run = Utc::now();
        repo.upsert_batch(
            &business_id,
            &[new_product(1, "Tent v2", true), new_product(3, "Lantern", true)],
            second_run,
        )
        .await
        .expect("second upsert");
        let swept = repo.delete_unsynced(&business_id, second_run).await.expect("sweep");
        assert_eq!(swept, 1);

        let catalog = repo.list_for_business(&business_id).await.expect("list");
        let names: Vec<_> = catalog.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tent v2", "Lantern"]);
        assert_eq!(catalog[0].categories, vec!["camping".to_string()]);
        assert_eq!(catalog[0].primary_image(), Some("https://img.test/a.jpg"));
    }

    #[tokio::test]
    async fn in_stock_listing_filters_and_preserves_catalog_order() {
        let (pool, business_id) = setup().await;
        let repo = SqlProductRepository::new(pool);

        let run = Utc::now();
        repo.upsert_batch(
            &business_id,
            &[
                new_product(1, "Tent", true),
                new_product(2, "Stove", false),
                new_product(3, "Lantern", true),
            ],
            run,
        )
        .await
        .expect("upsert");

        let in_stock = repo.list_in_stock(&business_id, 50).await.expect("list");
        let names: Vec<_> = in_stock.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tent", "Lantern"]);
    }

    #[tokio::test]
    async fn in_stock_listing_caps_at_the_requested_limit() {
        let (pool, business_id) = setup().await;

        for n in 1..=4 {
            fixtures::seed_product(&pool, &format!("prod-{n}"), "biz-1", n, &format!("Item {n}"), n != 2)
                .await
                .expect("seed product");
        }

        let repo = SqlProductRepository::new(pool);
        let in_stock = repo.list_in_stock(&business_id, 2).await.expect("list");
        let names: Vec<_> = in_stock.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Item 1", "Item 3"]);
        assert_eq!(in_stock[0].sku.as_deref(), Some("SKU-1"));
    }
}
