use storebot_core::domain::product::NewProduct;

use crate::client::ExternalProduct;

/// Normalizes an external record into the internal catalog shape. Price
/// strings that fail to parse are treated as absent rather than failing the
/// record; a zero price is kept as-is.
pub fn transform_product(record: ExternalProduct) -> NewProduct {
    NewProduct {
        external_id: record.id,
        name: record.name,
        description: record.description.filter(|v| !v.trim().is_empty()),
        short_description: record.short_description.filter(|v| !v.trim().is_empty()),
        price: parse_price(record.price.as_deref()),
        regular_price: parse_price(record.regular_price.as_deref()),
        sale_price: parse_price(record.sale_price.as_deref()),
        sku: record.sku.filter(|v| !v.trim().is_empty()),
        stock_quantity: record.stock_quantity,
        in_stock: record.in_stock,
        categories: record.categories.into_iter().map(|term| term.name).collect(),
        tags: record.tags.into_iter().map(|term| term.name).collect(),
        images: record.images.into_iter().map(|image| image.src).collect(),
        permalink: record.permalink.filter(|v| !v.trim().is_empty()),
    }
}

fn parse_price(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::{parse_price, transform_product};
    use crate::client::ExternalProduct;

    fn record(json: &str) -> ExternalProduct {
        serde_json::from_str(json).expect("record")
    }

    #[test]
    fn prices_parse_and_bad_values_become_none() {
        assert_eq!(parse_price(Some("19.99")), Some(19.99));
        assert_eq!(parse_price(Some(" 5 ")), Some(5.0));
        assert_eq!(parse_price(Some("0")), Some(0.0));
        assert_eq!(parse_price(Some("")), None);
        assert_eq!(parse_price(Some("call us")), None);
        assert_eq!(parse_price(None), None);
    }

    #[test]
    fn terms_and_images_flatten_to_strings() {
        let product = transform_product(record(
            r#"{
                "id": 5,
                "name": "Dry Bag",
                "price": "24.50",
                "categories": [{"name": "Camping"}, {"name": "Water"}],
                "tags": [{"name": "waterproof"}],
                "images": [{"src": "https://cdn.test/a.jpg"}, {"src": "https://cdn.test/b.jpg"}]
            }"#,
        ));

        assert_eq!(product.external_id, 5);
        assert_eq!(product.price, Some(24.5));
        assert_eq!(product.categories, vec!["Camping", "Water"]);
        assert_eq!(product.tags, vec!["waterproof"]);
        assert_eq!(product.images.len(), 2);
    }

    #[test]
    fn blank_optional_strings_become_none() {
        let product = transform_product(record(
            r#"{"id": 6, "name": "Mug", "sku": "  ", "permalink": "", "description": " "}"#,
        ));

        assert!(product.sku.is_none());
        assert!(product.permalink.is_none());
        assert!(product.description.is_none());
    }
}
