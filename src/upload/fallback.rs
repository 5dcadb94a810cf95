//! Canned results shown when the recognition backend cannot answer.

use super::schema::{ProductDetails, SearchResultItem, SearchResults};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Notice shown alongside fallback results.
pub const FALLBACK_NOTICE: &str =
    "Live product search is unavailable right now. Showing sample results instead; \
     these are not matches for your image.";

/// A complete stand-in for a successful recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackDataset {
    #[serde(default)]
    pub s3_url: Option<String>,
    pub product_details: ProductDetails,
    pub search_results: SearchResults,
}

impl Default for FallbackDataset {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackDataset {
    /// The sample identification compiled into the binary.
    pub fn builtin() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("color".to_string(), "Black/White".into());
        attributes.insert("style".to_string(), "Low-top sneaker".into());
        attributes.insert("closure".to_string(), "Lace-up".into());
        attributes.insert("gender".to_string(), "Unisex".into());

        Self {
            s3_url: None,
            product_details: ProductDetails {
                name: "Classic Canvas Low-Top Sneaker".into(),
                brand: Some("Converse".into()),
                category: Some("Footwear".into()),
                confidence: 0.87,
                materials: vec!["Canvas".into(), "Rubber".into()],
                attributes,
            },
            search_results: SearchResults {
                products: vec![
                    offer(
                        "Chuck Taylor All Star Low Top Sneaker",
                        "$55.00",
                        "$65.00",
                        "Amazon",
                        "https://www.amazon.com/s?k=chuck+taylor+all+star+low+top",
                    ),
                    offer(
                        "Chuck Taylor All Star Classic Low",
                        "$49.99",
                        "$60.00",
                        "Zappos",
                        "https://www.zappos.com/search?term=chuck+taylor+low",
                    ),
                    offer(
                        "Unisex Canvas Low-Top Sneaker",
                        "$42.00",
                        "$55.00",
                        "Nordstrom Rack",
                        "https://www.nordstromrack.com/sr?keyword=canvas+low+top+sneaker",
                    ),
                    offer(
                        "Classic Canvas Lace-Up Shoe",
                        "$29.99",
                        "$39.99",
                        "Walmart",
                        "https://www.walmart.com/search?q=canvas+lace+up+shoe",
                    ),
                ],
            },
        }
    }

    /// Load a dataset from a JSON fixture.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fallback dataset {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fallback dataset {}", path.display()))
    }

    /// Fixture if configured and readable, otherwise the built-in set.
    pub fn resolve(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::from_file(path) {
            Ok(dataset) => dataset,
            Err(e) => {
                tracing::warn!("{e:#}; using built-in fallback dataset");
                Self::builtin()
            }
        }
    }
}

fn offer(title: &str, price: &str, list_price: &str, source: &str, url: &str) -> SearchResultItem {
    SearchResultItem {
        title: title.into(),
        image: None,
        price: Some(price.into()),
        list_price: Some(list_price.into()),
        source: Some(source.into()),
        url: Some(url.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dataset_is_populated() {
        let data = FallbackDataset::builtin();
        assert!(!data.product_details.name.is_empty());
        assert!((0.0..=1.0).contains(&data.product_details.confidence));
        assert!(data.search_results.len() >= 3);
    }

    #[test]
    fn fixture_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(
            &path,
            r#"{
                "product_details": {"name": "Fixture Mug", "confidence": 0.5},
                "search_results": {"products": [{"title": "Mug", "price": 9}]}
            }"#,
        )
        .unwrap();

        let data = FallbackDataset::resolve(Some(&path));
        assert_eq!(data.product_details.name, "Fixture Mug");
        assert_eq!(data.search_results.products[0].price.as_deref(), Some("9.00"));
    }

    #[test]
    fn broken_fixture_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert_eq!(FallbackDataset::resolve(Some(&path)), FallbackDataset::builtin());
        assert_eq!(
            FallbackDataset::resolve(Some(&dir.path().join("missing.json"))),
            FallbackDataset::builtin()
        );
    }
}
