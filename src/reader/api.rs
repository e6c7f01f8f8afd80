use super::CatalogReader;
use super::entry::build_products;
use crate::error::CatalogError;
use crate::models::Product;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Client used for every outbound request: 30s timeout, identifying agent.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("cogtour/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Remote catalog served as a JSON array by an HTTP endpoint.
pub struct ApiCatalogReader {
    client: Client,
    url: String,
}

impl ApiCatalogReader {
    pub fn new(url: impl Into<String>) -> Result<Self, CatalogError> {
        Ok(Self {
            client: http_client()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn not_an_array() -> CatalogError {
    CatalogError::BadSource("API response was not an array".into())
}

#[async_trait]
impl CatalogReader for ApiCatalogReader {
    fn describe(&self) -> &'static str {
        "Loading products from API…"
    }

    async fn load(&self) -> Result<Vec<Product>, CatalogError> {
        debug!(url = %self.url, "fetching catalog");
        let resp = self.client.get(&self.url).send().await?;

        if !resp.status().is_success() {
            warn!(url = %self.url, status = %resp.status(), "catalog request rejected");
            return Err(CatalogError::BadSource(format!(
                "API responded with {}",
                resp.status().as_u16()
            )));
        }

        let body = resp.bytes().await?;
        let payload = serde_json::from_slice::<Value>(&body).map_err(|e| {
            warn!(url = %self.url, "catalog response is not JSON: {}", e);
            not_an_array()
        })?;
        let entries = payload.as_array().ok_or_else(not_an_array)?;

        build_products(entries)
    }
}
