use super::geometry::Bounds;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A timestamped imagery product. Built once per catalog load and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Date label exactly as the source provided it.
    pub date: String,
    /// Percentage in 0..=100.
    pub cloud_cover: u8,
    pub url: String,
    pub bounds: Bounds,
    pub time: DateTime<Utc>,
}

/// Chronologically sorted list of products.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Sorts by time. The sort is stable so equal timestamps keep their
    /// source order.
    pub fn new(mut products: Vec<Product>) -> Self {
        products.sort_by_key(|p| p.time);
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn first(&self) -> Option<&Product> {
        self.products.first()
    }

    pub fn last(&self) -> Option<&Product> {
        self.products.last()
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.products.iter()
    }

    /// One-line description shown above the product list.
    pub fn summary(&self) -> String {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => format!(
                "{} products from {} to {}",
                self.len(),
                first.date,
                last.date
            ),
            _ => "No products available.".to_string(),
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Product;
    type IntoIter = std::slice::Iter<'a, Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.iter()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::geometry::DEFAULT_AOI_BOUNDS;
    use chrono::NaiveDate;

    pub fn product(id: &str, date: &str) -> Product {
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("fixture date");
        Product {
            id: id.to_string(),
            name: id.to_string(),
            date: date.to_string(),
            cloud_cover: 0,
            url: format!("https://example.com/{id}.tif"),
            bounds: DEFAULT_AOI_BOUNDS,
            time: day.and_hms_opt(0, 0, 0).expect("midnight").and_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;

    #[test]
    fn test_catalog_sorts_chronologically() {
        let catalog = Catalog::new(vec![
            product("c", "2022-01-01"),
            product("a", "2020-01-01"),
            product("b", "2021-01-01"),
        ]);
        let ids: Vec<_> = catalog.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_catalog_summary() {
        assert_eq!(Catalog::default().summary(), "No products available.");
        let catalog = Catalog::new(vec![
            product("b", "2021-06-01"),
            product("a", "2020-01-01"),
        ]);
        assert_eq!(catalog.summary(), "2 products from 2020-01-01 to 2021-06-01");
    }
}
