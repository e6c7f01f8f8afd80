use crate::config::Source;
use crate::error::CatalogError;
use crate::models::{Catalog, Product};
use async_trait::async_trait;
use tracing::info;

pub mod api;
pub mod entry;
pub mod payload;
pub mod sample;

pub use api::{ApiCatalogReader, http_client};
pub use payload::PayloadCatalogReader;
pub use sample::SampleCatalogReader;

#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Status line shown while the load is in flight.
    fn describe(&self) -> &'static str;
    async fn load(&self) -> Result<Vec<Product>, CatalogError>;
}

pub fn reader_for(source: &Source) -> Result<Box<dyn CatalogReader>, CatalogError> {
    Ok(match source {
        Source::Sample => Box::new(SampleCatalogReader),
        Source::Api(url) => Box::new(ApiCatalogReader::new(url.clone())?),
        Source::Payload(raw) => Box::new(PayloadCatalogReader::new(raw.clone())),
    })
}

/// Load and sort a catalog. Either every entry makes it or the load fails.
pub async fn load_catalog(reader: &dyn CatalogReader) -> Result<Catalog, CatalogError> {
    let products = reader.load().await?;
    let catalog = Catalog::new(products);
    info!(products = catalog.len(), "catalog loaded");
    Ok(catalog)
}
