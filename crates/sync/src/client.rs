use std::time::Duration;

use serde::Deserialize;

use storebot_core::domain::business::StoreCredentials;

use crate::sync::SyncError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const API_BASE_PATH: &str = "/wp-json/wc/v3";

/// HTTP client for a WooCommerce-compatible storefront REST API.
///
/// Credentials travel as `consumer_key`/`consumer_secret` query parameters,
/// which is what storefronts behind plain HTTP basic-auth-stripping proxies
/// accept.
pub struct StorefrontClient {
    http: reqwest::Client,
    products_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl StorefrontClient {
    pub fn new(credentials: &StoreCredentials) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| SyncError::Connection(error.to_string()))?;

        let base = credentials.url.trim_end_matches('/');
        Ok(Self {
            http,
            products_url: format!("{base}{API_BASE_PATH}/products"),
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: credentials.consumer_secret.clone(),
        })
    }

    /// Cheapest authenticated request the API offers. Used both as the
    /// pre-sync gate and for the standalone connection test.
    pub async fn probe(&self) -> Result<(), SyncError> {
        let response = self
            .http
            .get(&self.products_url)
            .query(&[
                ("consumer_key", self.consumer_key.as_str()),
                ("consumer_secret", self.consumer_secret.as_str()),
                ("per_page", "1"),
            ])
            .send()
            .await
            .map_err(|error| SyncError::Connection(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Connection(format!(
                "storefront responded with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Fetches one page of published products. Pages are 1-based; an empty
    /// page means the catalog is exhausted.
    pub async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ExternalProduct>, SyncError> {
        let response = self
            .http
            .get(&self.products_url)
            .query(&[
                ("consumer_key", self.consumer_key.as_str()),
                ("consumer_secret", self.consumer_secret.as_str()),
                ("status", "publish"),
                ("page", &page.to_string()),
                ("per_page", &per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|error| SyncError::Connection(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Connection(format!(
                "storefront responded with status {} on page {page}",
                response.status()
            )));
        }

        response
            .json::<Vec<ExternalProduct>>()
            .await
            .map_err(|error| SyncError::Connection(format!("invalid product payload: {error}")))
    }
}

/// A product record as the storefront API serves it. Everything beyond id and
/// name is optional in practice, so every other field defaults.
#[derive(Clone, Debug, Deserialize)]
pub struct ExternalProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub regular_price: Option<String>,
    #[serde(default)]
    pub sale_price: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub categories: Vec<NamedTerm>,
    #[serde(default)]
    pub tags: Vec<NamedTerm>,
    #[serde(default)]
    pub images: Vec<ExternalImage>,
    #[serde(default)]
    pub permalink: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct NamedTerm {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExternalImage {
    pub src: String,
}
