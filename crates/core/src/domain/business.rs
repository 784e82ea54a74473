use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusinessId(pub String);

/// A tenant. Owns chatbots and the mirrored product catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub store_url: Option<String>,
    pub store_consumer_key: Option<String>,
    pub store_consumer_secret: Option<String>,
}

/// Connection material for the business's external storefront API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreCredentials {
    pub url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Business {
    /// Returns `None` unless all three storefront credentials are present and
    /// non-blank. Catalog sync refuses to start without a complete set.
    pub fn store_credentials(&self) -> Option<StoreCredentials> {
        let url = non_blank(self.store_url.as_deref())?;
        let consumer_key = non_blank(self.store_consumer_key.as_deref())?;
        let consumer_secret = non_blank(self.store_consumer_secret.as_deref())?;
        Some(StoreCredentials { url, consumer_key, consumer_secret })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
