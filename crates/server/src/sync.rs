//! Catalog sync endpoints, invoked by the dashboard.
//!
//! - `POST /api/businesses/{business_id}/sync-products` — run a full catalog sync
//! - `POST /api/businesses/{business_id}/test-connection` — probe the storefront API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use storebot_core::domain::business::{Business, BusinessId};
use storebot_db::repositories::{BusinessRepository, SqlBusinessRepository, SqlProductRepository};
use storebot_db::DbPool;
use storebot_sync::{CatalogSync, StorefrontClient, SyncError};

use crate::chat::ErrorResponse;

#[derive(Clone)]
pub struct SyncState {
    pub businesses: Arc<dyn BusinessRepository>,
    pub catalog_sync: CatalogSync,
}

impl SyncState {
    pub fn new(pool: &DbPool) -> Self {
        Self {
            businesses: Arc::new(SqlBusinessRepository::new(pool.clone())),
            catalog_sync: CatalogSync::new(Arc::new(SqlProductRepository::new(pool.clone()))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub synced_count: usize,
    pub total_found: usize,
}

/// Connection tests report reachability as data, not as an HTTP failure: an
/// unreachable storefront is an expected outcome for the caller.
#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
}

pub fn router(state: SyncState) -> Router {
    Router::new()
        .route("/api/businesses/{business_id}/sync-products", post(sync_products))
        .route("/api/businesses/{business_id}/test-connection", post(test_connection))
        .with_state(state)
}

pub async fn sync_products(
    State(state): State<SyncState>,
    Path(business_id): Path<String>,
) -> Result<Json<SyncResponse>, (StatusCode, Json<ErrorResponse>)> {
    let business = load_business(&state, &business_id).await?;

    match state.catalog_sync.run(&business).await {
        Ok(report) => {
            info!(
                event_name = "api.sync.completed",
                business_id = %business.id.0,
                synced_count = report.synced_count,
                total_found = report.total_found,
                "catalog sync finished"
            );
            Ok(Json(SyncResponse {
                success: report.synced_count == report.total_found,
                synced_count: report.synced_count,
                total_found: report.total_found,
            }))
        }
        Err(error) => {
            warn!(
                event_name = "api.sync.failed",
                business_id = %business.id.0,
                error = %error,
                "catalog sync failed"
            );
            let status = match &error {
                SyncError::MissingCredentials => StatusCode::BAD_REQUEST,
                SyncError::Connection(_) => StatusCode::BAD_GATEWAY,
                SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, Json(ErrorResponse { error: error.to_string() })))
        }
    }
}

pub async fn test_connection(
    State(state): State<SyncState>,
    Path(business_id): Path<String>,
) -> Result<Json<TestConnectionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let business = load_business(&state, &business_id).await?;

    let Some(credentials) = business.store_credentials() else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "business has no storefront credentials configured".to_string(),
            }),
        ));
    };

    let probe = match StorefrontClient::new(&credentials) {
        Ok(client) => client.probe().await,
        Err(error) => Err(error),
    };

    let response = match probe {
        Ok(()) => TestConnectionResponse {
            success: true,
            message: "storefront connection established".to_string(),
        },
        Err(error) => TestConnectionResponse { success: false, message: error.to_string() },
    };
    Ok(Json(response))
}

async fn load_business(
    state: &SyncState,
    business_id: &str,
) -> Result<Business, (StatusCode, Json<ErrorResponse>)> {
    match state.businesses.find_by_id(&BusinessId(business_id.to_string())).await {
        Ok(Some(business)) => Ok(business),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("no business `{business_id}`") }),
        )),
        Err(error) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: format!("business lookup failed: {error}") }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;
    use mockito::{Matcher, Server};

    use storebot_core::domain::business::{Business, BusinessId};
    use storebot_db::repositories::{
        InMemoryBusinessRepository, InMemoryProductRepository, ProductRepository,
    };
    use storebot_sync::CatalogSync;

    use super::{sync_products, test_connection, SyncState};

    fn business(store_url: Option<&str>) -> Business {
        Business {
            id: BusinessId("biz-1".to_string()),
            name: "Acme Outdoors".to_string(),
            description: None,
            website_url: None,
            store_url: store_url.map(str::to_string),
            store_consumer_key: store_url.map(|_| "ck_test".to_string()),
            store_consumer_secret: store_url.map(|_| "cs_test".to_string()),
        }
    }

    async fn state_with(
        business: Option<Business>,
    ) -> (SyncState, Arc<InMemoryProductRepository>) {
        let businesses = Arc::new(InMemoryBusinessRepository::default());
        if let Some(business) = business {
            businesses.insert(business).await;
        }
        let products = Arc::new(InMemoryProductRepository::default());
        let state =
            SyncState { businesses, catalog_sync: CatalogSync::new(products.clone()) };
        (state, products)
    }

    #[tokio::test]
    async fn unknown_business_is_not_found() {
        let (state, _) = state_with(None).await;

        let (status, _) =
            sync_products(State(state), Path("biz-404".to_string())).await.err().expect("404");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn business_without_credentials_is_a_bad_request() {
        let (state, _) = state_with(Some(business(None))).await;

        let (status, _) = sync_products(State(state.clone()), Path("biz-1".to_string()))
            .await
            .err()
            .expect("400");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            test_connection(State(state), Path("biz-1".to_string())).await.err().expect("400");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_pulls_the_storefront_catalog_into_storage() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/wp-json/wc/v3/products")
            .match_query(Matcher::UrlEncoded("per_page".into(), "1".into()))
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/wp-json/wc/v3/products")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .with_body(r#"[{"id": 1, "name": "Ridge Tent", "price": "129.00"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/wp-json/wc/v3/products")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .with_body("[]")
            .create_async()
            .await;

        let (state, products) = state_with(Some(business(Some(&server.url())))).await;

        let Json(response) =
            sync_products(State(state), Path("biz-1".to_string())).await.expect("sync succeeds");

        assert!(response.success);
        assert_eq!(response.synced_count, 1);
        assert_eq!(response.total_found, 1);

        let stored = products
            .list_for_business(&BusinessId("biz-1".to_string()))
            .await
            .expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Ridge Tent");
    }

    #[tokio::test]
    async fn connection_test_reports_reachability_as_data() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/wp-json/wc/v3/products")
            .match_query(Matcher::UrlEncoded("per_page".into(), "1".into()))
            .with_status(401)
            .create_async()
            .await;

        let (state, _) = state_with(Some(business(Some(&server.url())))).await;

        let Json(response) =
            test_connection(State(state), Path("biz-1".to_string())).await.expect("200");
        assert!(!response.success);
        assert!(response.message.contains("401"));
    }
}
