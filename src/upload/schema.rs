use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Structured identification of the pictured product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Recognition confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub materials: Vec<String>,
    /// Free-form attributes (color, size, style, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// One comparable offer from a marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    #[serde(default, alias = "image_url", alias = "thumbnail")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "price")]
    pub price: Option<String>,
    #[serde(default, alias = "original_price", deserialize_with = "price")]
    pub list_price: Option<String>,
    #[serde(default, alias = "marketplace")]
    pub source: Option<String>,
    #[serde(default, alias = "link")]
    pub url: Option<String>,
}

/// Ordered list of offers, as wrapped by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub products: Vec<SearchResultItem>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Top-level response body of `POST /api/upload`.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadData {
    pub s3_url: String,
    pub product_details: ProductDetails,
    pub search_results: SearchResults,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Prices arrive either as display strings ("$24.99") or bare numbers.
fn price<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(format!("{n:.2}")),
        None => None,
    })
}
