use std::sync::Arc;

use tracing::warn;

use storebot_core::context::{strip_tags, ChatMessage, ChatRole};
use storebot_core::domain::product::Product;

use crate::{CompletionRequest, LlmClient};

const MAX_RANKING_TOKENS: u32 = 50;
const RANKING_TEMPERATURE: f32 = 0.1;

/// Selects catalog items relevant to a visitor message by presenting an
/// indexed candidate list to the model and parsing an index selection back.
///
/// Never errors: an empty catalog short-circuits without a model call, and
/// any call failure degrades to the first `limit` in-stock products in
/// catalog order.
#[derive(Clone)]
pub struct ProductRanker {
    client: Arc<dyn LlmClient>,
}

impl ProductRanker {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn rank(&self, message: &str, products: &[Product], limit: usize) -> Vec<Product> {
        if products.is_empty() {
            return Vec::new();
        }

        let request = CompletionRequest {
            messages: vec![
                ChatMessage { role: ChatRole::System, content: ranking_system_prompt(limit) },
                ChatMessage { role: ChatRole::User, content: ranking_user_prompt(message, products) },
            ],
            max_tokens: MAX_RANKING_TOKENS,
            temperature: RANKING_TEMPERATURE,
        };

        match self.client.complete(request).await {
            Ok(text) => select_by_indices(&text, products, limit),
            Err(error) => {
                warn!(
                    event_name = "agent.rank.failed",
                    error = %error,
                    "ranking call failed, using in-stock catalog prefix"
                );
                in_stock_prefix(products, limit)
            }
        }
    }
}

fn ranking_system_prompt(limit: usize) -> String {
    format!(
        "You are a product recommendation system. Given a customer query and a list of products, \
         return the indices of the most relevant products (up to {limit}) as a comma-separated \
         list of numbers. Only return numbers, no other text."
    )
}

fn ranking_user_prompt(message: &str, products: &[Product]) -> String {
    let candidates = products
        .iter()
        .enumerate()
        .map(|(index, product)| {
            let description =
                product.short_description.as_deref().map(strip_tags).unwrap_or_default();
            format!("{index}: {} - {description}", product.name)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Customer query: \"{message}\"\n\nProducts:\n{candidates}\n\n\
         Return the indices of the most relevant products:"
    )
}

/// Out-of-range and non-numeric tokens are discarded; selection order is the
/// model's, truncated to `limit`.
fn select_by_indices(text: &str, products: &[Product], limit: usize) -> Vec<Product> {
    text.split(',')
        .filter_map(|token| token.trim().parse::<usize>().ok())
        .filter(|index| *index < products.len())
        .take(limit)
        .map(|index| products[index].clone())
        .collect()
}

fn in_stock_prefix(products: &[Product], limit: usize) -> Vec<Product> {
    products.iter().filter(|product| product.in_stock).take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storebot_core::domain::business::BusinessId;
    use storebot_core::domain::product::{Product, ProductId};

    use super::ProductRanker;
    use crate::testing::ScriptedLlmClient;

    fn product(index: i64, in_stock: bool) -> Product {
        Product {
            id: ProductId(format!("prod-{index}")),
            business_id: BusinessId("biz-1".to_string()),
            external_id: index,
            name: format!("Item {index}"),
            description: None,
            short_description: Some(format!("<p>Item number {index}</p>")),
            price: Some(10.0 + index as f64),
            regular_price: None,
            sale_price: None,
            sku: None,
            stock_quantity: None,
            in_stock,
            categories: vec![],
            tags: vec![],
            images: vec![],
            permalink: None,
        }
    }

    #[tokio::test]
    async fn selects_products_by_model_indices() {
        let client = Arc::new(ScriptedLlmClient::default().with_ranking("2, 0"));
        let ranker = ProductRanker::new(client);
        let products = vec![product(0, true), product(1, true), product(2, true)];

        let ranked = ranker.rank("camping", &products, 3).await;
        let names: Vec<_> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Item 2", "Item 0"]);
    }

    #[tokio::test]
    async fn bad_tokens_are_discarded_and_selection_is_truncated() {
        let client = Arc::new(ScriptedLlmClient::default().with_ranking("9, x, 1, 0, 2"));
        let ranker = ProductRanker::new(client);
        let products = vec![product(0, true), product(1, true), product(2, true)];

        let ranked = ranker.rank("camping", &products, 2).await;
        let names: Vec<_> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Item 1", "Item 0"]);
    }

    #[tokio::test]
    async fn failure_falls_back_to_in_stock_prefix_in_catalog_order() {
        let ranker = ProductRanker::new(Arc::new(ScriptedLlmClient::failing()));
        let products =
            vec![product(0, false), product(1, true), product(2, true), product(3, true)];

        let ranked = ranker.rank("camping", &products, 2).await;
        let names: Vec<_> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Item 1", "Item 2"]);
    }

    #[tokio::test]
    async fn empty_catalog_short_circuits_without_model_call() {
        let client = Arc::new(ScriptedLlmClient::default().with_ranking("0"));
        let ranker = ProductRanker::new(client.clone());

        let ranked = ranker.rank("camping", &[], 3).await;
        assert!(ranked.is_empty());
        assert_eq!(client.total_calls(), 0);
    }
}
