use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use storebot_core::domain::business::{Business, BusinessId};
use storebot_core::domain::product::NewProduct;
use storebot_db::repositories::ProductRepository;

use crate::client::StorefrontClient;
use crate::transform::transform_product;

/// Page size requested from the storefront API.
pub const SYNC_PAGE_SIZE: u32 = 100;
/// Hard ceiling on pages per run; guards against a source that never
/// returns an empty page.
pub const MAX_SYNC_PAGES: u32 = 50;
/// Products committed per storage batch.
pub const COMMIT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("business has no storefront credentials configured")]
    MissingCredentials,
    #[error("storefront connection failed: {0}")]
    Connection(String),
    #[error("storage failed: {0}")]
    Storage(String),
}

/// Outcome of one sync run. `synced_count < total_found` signals that one or
/// more commit batches failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub synced_count: usize,
    pub total_found: usize,
}

/// Pulls a business's published catalog from its storefront and mirrors it
/// into product storage.
#[derive(Clone)]
pub struct CatalogSync {
    products: Arc<dyn ProductRepository>,
}

impl CatalogSync {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    pub async fn run(&self, business: &Business) -> Result<SyncReport, SyncError> {
        let credentials = business.store_credentials().ok_or(SyncError::MissingCredentials)?;
        let client = StorefrontClient::new(&credentials)?;
        self.run_with_client(&client, &business.id).await
    }

    pub async fn run_with_client(
        &self,
        client: &StorefrontClient,
        business_id: &BusinessId,
    ) -> Result<SyncReport, SyncError> {
        client.probe().await?;
        info!(event_name = "sync.started", business_id = %business_id.0);

        let mut fetched = Vec::new();
        for page in 1..=MAX_SYNC_PAGES {
            let records = client.fetch_page(page, SYNC_PAGE_SIZE).await?;
            if records.is_empty() {
                break;
            }
            fetched.extend(records);
        }

        let total_found = fetched.len();
        let transformed: Vec<NewProduct> = fetched.into_iter().map(transform_product).collect();

        // One marker per run; every committed row is stamped with it so the
        // trailing sweep can identify rows the storefront no longer has.
        let run_marker = Utc::now();
        let mut synced_count = 0;
        for batch in transformed.chunks(COMMIT_BATCH_SIZE) {
            match self.products.upsert_batch(business_id, batch, run_marker).await {
                Ok(()) => synced_count += batch.len(),
                Err(error) => {
                    warn!(
                        event_name = "sync.batch_failed",
                        business_id = %business_id.0,
                        batch_size = batch.len(),
                        error = %error,
                        "commit batch failed, continuing with remaining batches"
                    );
                }
            }
        }

        match self.products.delete_unsynced(business_id, run_marker).await {
            Ok(removed) if removed > 0 => {
                info!(
                    event_name = "sync.swept",
                    business_id = %business_id.0,
                    removed,
                    "removed products no longer present in the storefront"
                );
            }
            Ok(_) => {}
            Err(error) => {
                warn!(
                    event_name = "sync.sweep_failed",
                    business_id = %business_id.0,
                    error = %error,
                    "stale product sweep failed, catalog may contain removed products"
                );
            }
        }

        info!(
            event_name = "sync.completed",
            business_id = %business_id.0,
            synced_count,
            total_found
        );
        Ok(SyncReport { synced_count, total_found })
    }
}
