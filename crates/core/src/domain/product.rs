use serde::{Deserialize, Serialize};

use crate::domain::business::BusinessId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// A catalog entry mirrored from the external storefront. Uniquely identified
/// per business by `external_id`; only the catalog sync writes these rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub business_id: BusinessId,
    pub external_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<f64>,
    pub regular_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub sku: Option<String>,
    pub stock_quantity: Option<i64>,
    pub in_stock: bool,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub permalink: Option<String>,
}

impl Product {
    /// First image in catalog order is the primary one.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A transformed external record ready to be upserted into the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub external_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<f64>,
    pub regular_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub sku: Option<String>,
    pub stock_quantity: Option<i64>,
    pub in_stock: bool,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub permalink: Option<String>,
}
