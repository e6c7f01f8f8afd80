use super::CatalogReader;
use super::entry::build_products;
use crate::error::CatalogError;
use crate::models::Product;
use async_trait::async_trait;
use serde_json::Value;

/// Catalog pasted by the user and kept in the settings store.
pub struct PayloadCatalogReader {
    raw: String,
}

impl PayloadCatalogReader {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

#[async_trait]
impl CatalogReader for PayloadCatalogReader {
    fn describe(&self) -> &'static str {
        "Loading products from pasted payload…"
    }

    async fn load(&self) -> Result<Vec<Product>, CatalogError> {
        let parsed: Value = serde_json::from_str(&self.raw)?;
        let entries = parsed
            .as_array()
            .ok_or_else(|| CatalogError::BadPayload("Stored payload is not an array".into()))?;
        build_products(entries)
    }
}
