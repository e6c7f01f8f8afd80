use super::CatalogReader;
use super::entry::parse_date;
use crate::error::CatalogError;
use crate::models::{DEFAULT_AOI_BOUNDS, Product};
use async_trait::async_trait;

// (id, name, date, cloud cover %)
const SAMPLE_PRODUCTS: &[(&str, &str, &str, u8)] = &[
    ("S2A_2016_05_12", "Spring 2016", "2016-05-12", 4),
    ("S2A_2017_04_03", "Early 2017", "2017-04-03", 12),
    ("S2B_2018_07_19", "Mid 2018", "2018-07-19", 6),
    ("S2B_2019_08_24", "Late summer 2019", "2019-08-24", 3),
    ("S2A_2020_06_15", "Green-up 2020", "2020-06-15", 9),
    ("S2A_2021_09_01", "Harvest 2021", "2021-09-01", 14),
    ("S2B_2022_11_19", "Autumn 2022", "2022-11-19", 18),
    ("S2B_2023_03_05", "Early 2023", "2023-03-05", 7),
    ("S2A_2024_06_02", "Green-up 2024", "2024-06-02", 5),
    ("S2B_2025_02_18", "Winter 2025", "2025-02-18", 22),
    ("S2B_2026_05_27", "Spring 2026", "2026-05-27", 8),
];

const SAMPLE_URL_BASE: &str = "https://example.com/cog/sentinel-2";

/// Built-in Sentinel-2 sample catalog used when no API or payload is set.
pub struct SampleCatalogReader;

#[async_trait]
impl CatalogReader for SampleCatalogReader {
    fn describe(&self) -> &'static str {
        "Loading sample products…"
    }

    async fn load(&self) -> Result<Vec<Product>, CatalogError> {
        SAMPLE_PRODUCTS
            .iter()
            .map(|&(id, name, date, cloud_cover)| {
                let time = parse_date(date).ok_or_else(|| {
                    CatalogError::InvalidEntry(format!("Invalid sample date {}", date))
                })?;
                Ok(Product {
                    id: id.to_string(),
                    name: name.to_string(),
                    date: date.to_string(),
                    cloud_cover,
                    url: format!("{}/{}.tif", SAMPLE_URL_BASE, date),
                    bounds: DEFAULT_AOI_BOUNDS,
                    time,
                })
            })
            .collect()
    }
}
