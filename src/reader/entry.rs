use crate::error::CatalogError;
use crate::models::{Bounds, DEFAULT_AOI_BOUNDS, Product};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Map one raw catalog entry (API response element or pasted payload element)
/// onto a canonical [`Product`]. `index` is the zero-based position in the
/// source array and only feeds the generated id and error messages.
pub fn build_product(entry: &Value, index: usize) -> Result<Product, CatalogError> {
    let position = index + 1;

    let url = entry
        .get("url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            CatalogError::InvalidEntry(format!("Missing URL for product entry {}", position))
        })?;

    let raw_date = entry.get("date").and_then(Value::as_str);
    let time = raw_date.and_then(parse_date).ok_or_else(|| {
        CatalogError::InvalidEntry(format!("Invalid date for product entry {}", position))
    })?;

    let name = entry.get("name").and_then(text);
    let id = format!("{}-{}", name.as_deref().unwrap_or("product"), position)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    let bounds = entry
        .get("bounds")
        .and_then(|b| serde_json::from_value::<Bounds>(b.clone()).ok())
        .unwrap_or(DEFAULT_AOI_BOUNDS);

    Ok(Product {
        id,
        name: name.unwrap_or_else(|| format!("Product {}", position)),
        date: raw_date.unwrap_or_default().to_string(),
        cloud_cover: cloud_percent(entry.get("cloud")),
        url: url.to_string(),
        bounds,
        time,
    })
}

/// Parse a catalog date. Values with a `T` are date-times (RFC 3339, or naive
/// and then read as UTC); bare dates mean midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        return NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .ok()
            .map(|ndt| ndt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// `cloud` is a 0–1 fraction. Anything that is not a finite number counts as
/// clear sky.
fn cloud_percent(value: Option<&Value>) -> u8 {
    let fraction = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match fraction {
        Some(f) if f.is_finite() => (f * 100.0).round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Canonicalise a whole array. The first bad entry fails the load.
pub fn build_products(entries: &[Value]) -> Result<Vec<Product>, CatalogError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| build_product(entry, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_cloud_fraction_is_rescaled() {
        let p = build_product(
            &json!({"url": "https://x/a.tif", "date": "2020-01-01", "cloud": 0.12}),
            0,
        )
        .unwrap();
        assert_eq!(p.cloud_cover, 12);
        assert_eq!(p.url, "https://x/a.tif");
    }

    #[test]
    fn test_missing_or_bad_cloud_defaults_to_zero() {
        for cloud in [json!(null), json!("cloudy"), json!({})] {
            let p = build_product(&json!({"url": "u", "date": "2020-01-01", "cloud": cloud}), 0)
                .unwrap();
            assert_eq!(p.cloud_cover, 0);
        }
        let p = build_product(&json!({"url": "u", "date": "2020-01-01"}), 0).unwrap();
        assert_eq!(p.cloud_cover, 0);
    }

    #[test]
    fn test_defaults_for_name_id_and_bounds() {
        let p = build_product(&json!({"url": "u", "date": "2020-01-01"}), 4).unwrap();
        assert_eq!(p.name, "Product 5");
        assert_eq!(p.id, "product-5");
        assert_eq!(p.bounds, DEFAULT_AOI_BOUNDS);
        assert_eq!(p.date, "2020-01-01");
    }

    #[test]
    fn test_id_collapses_whitespace() {
        let p = build_product(
            &json!({"url": "u", "date": "2020-01-01", "name": "Green  up\t2020"}),
            0,
        )
        .unwrap();
        assert_eq!(p.id, "Green-up-2020-1");
        assert_eq!(p.name, "Green  up\t2020");
    }

    #[test]
    fn test_explicit_bounds_are_kept() {
        let p = build_product(
            &json!({
                "url": "u",
                "date": "2020-01-01",
                "bounds": {"west": 1.0, "south": 2.0, "east": 3.0, "north": 4.0}
            }),
            0,
        )
        .unwrap();
        assert_eq!(p.bounds, Bounds::from((1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let err = build_product(&json!({"date": "2021-03-01"}), 0).unwrap_err();
        assert_eq!(err.to_string(), "Missing URL for product entry 1");
        assert!(err.is_configuration());

        let err = build_product(&json!({"url": "", "date": "2021-03-01"}), 2).unwrap_err();
        assert_eq!(err.to_string(), "Missing URL for product entry 3");
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        for date in [json!("not a date"), json!(20200101), json!(null), json!("2020-13-40")] {
            let err = build_product(&json!({"url": "u", "date": date}), 1).unwrap_err();
            assert_eq!(err.to_string(), "Invalid date for product entry 2");
        }
    }

    #[test]
    fn test_parse_date_variants() {
        let midnight = Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2020-05-01"), Some(midnight));
        assert_eq!(parse_date("2020-05-01T00:00:00Z"), Some(midnight));
        assert_eq!(
            parse_date("2020-05-01T02:00:00+02:00"),
            Some(midnight)
        );
        assert_eq!(
            parse_date("2020-05-01T10:30:00"),
            Some(Utc.with_ymd_and_hms(2020, 5, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_date("May 1st"), None);
    }

    #[test]
    fn test_build_products_fails_whole_batch() {
        let entries = vec![
            json!({"url": "a", "date": "2020-01-01"}),
            json!({"date": "2020-02-01"}),
        ];
        assert!(build_products(&entries).is_err());
    }
}
