use super::geometry::{Bounds, GeoPoint};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BUNDLED_OBSERVATIONS: &str = include_str!("../../public/data/observations.geojson");

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<ObservationProperties>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationProperties {
    pub name: Option<String>,
    pub title: Option<String>,
    pub article_html: Option<String>,
    pub article_url: Option<String>,
    pub summary: Option<String>,
}

/// Content for the article side panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub title: String,
    pub body_html: String,
}

/// A pin on the globe, pointing back at its feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub index: usize,
    pub title: String,
    pub position: GeoPoint,
}

#[derive(Debug, Clone)]
pub struct ObservationSet {
    features: Vec<Feature>,
}

impl ObservationSet {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("Failed to read {}: {}", path.as_ref().display(), e)
        })?;
        Self::from_json(&content)
    }

    /// The observations shipped with the crate under `public/data`.
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json(BUNDLED_OBSERVATIONS)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(content)?;
        Ok(Self {
            features: collection.features,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn status(&self) -> String {
        format!("{} observations loaded", self.len())
    }

    /// Positions of every point feature, in feature order. These get a pin.
    pub fn points(&self) -> Vec<GeoPoint> {
        self.features.iter().filter_map(point_of).collect()
    }

    /// Pins for every point feature, keeping the feature index so the
    /// article can be looked up later.
    pub fn markers(&self) -> Vec<Marker> {
        self.features
            .iter()
            .enumerate()
            .filter_map(|(index, f)| {
                let position = point_of(f)?;
                let props = f.properties.as_ref();
                let title = props
                    .and_then(|p| p.title.clone().or_else(|| p.name.clone()))
                    .unwrap_or_else(|| "Observation".to_string());
                Some(Marker {
                    index,
                    title,
                    position,
                })
            })
            .collect()
    }

    /// Box around every point, used to frame the initial camera flight.
    pub fn bounds(&self) -> Option<Bounds> {
        let points = self.points();
        let first = points.first()?;
        let init = Bounds::from((first.lon, first.lat, first.lon, first.lat));
        Some(points.iter().fold(init, |b, p| Bounds {
            west: b.west.min(p.lon),
            south: b.south.min(p.lat),
            east: b.east.max(p.lon),
            north: b.north.max(p.lat),
        }))
    }

    /// Article for the feature at `index`. Features without properties have
    /// nothing to show.
    pub fn article(&self, index: usize) -> Option<Article> {
        let props = self.features.get(index)?.properties.as_ref()?;
        Some(article_for(props))
    }
}

pub fn article_for(props: &ObservationProperties) -> Article {
    let title = props
        .title
        .clone()
        .or_else(|| props.name.clone())
        .unwrap_or_else(|| "Observation".to_string());

    let mut body = String::new();
    if let Some(summary) = props.summary.as_deref().filter(|s| !s.is_empty()) {
        body.push_str(&format!("<p>{}</p>", escape_html(summary)));
    }

    // Trusted markup from the bundled file goes in as-is
    if let Some(html) = props.article_html.as_deref().filter(|s| !s.is_empty()) {
        body.push_str(html);
    } else if let Some(url) = props.article_url.as_deref().filter(|s| !s.is_empty()) {
        body.push_str(&format!(
            r#"<p><a href="{}" target="_blank" rel="noopener">Read the full article</a></p>"#,
            escape_html(url)
        ));
    } else {
        body.push_str("<p>No article content is available for this observation.</p>");
    }

    Article {
        title,
        body_html: body,
    }
}

fn point_of(feature: &Feature) -> Option<GeoPoint> {
    match &feature.geometry {
        Some(Geometry::Point { coordinates }) if coordinates.len() >= 2 => Some(GeoPoint {
            lon: coordinates[0],
            lat: coordinates[1],
        }),
        _ => None,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
