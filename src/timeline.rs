use crate::models::{Catalog, Product};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Clock ticks within this many seconds of a product select it implicitly.
pub const SELECTION_PROXIMITY_SECS: i64 = 43_200;

/// Days added either side of the catalog when framing the timeline.
const RANGE_PADDING_DAYS: i64 = 10;

/// Whether a clock at `time` is close enough to `product` to select it.
pub fn within_selection_proximity(product: &Product, time: DateTime<Utc>) -> bool {
    (time - product.time).abs() < Duration::seconds(SELECTION_PROXIMITY_SECS)
}

/// Product whose time is closest to `time`. Ties go to the earliest entry in
/// catalog order.
pub fn nearest(catalog: &Catalog, time: DateTime<Utc>) -> Option<&Product> {
    let mut best: Option<(&Product, Duration)> = None;
    for product in catalog {
        let diff = (time - product.time).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((product, diff)),
        }
    }
    best.map(|(p, _)| p)
}

/// Half-open interval a product is shown on the timeline: its day.
pub fn availability(product: &Product) -> (DateTime<Utc>, DateTime<Utc>) {
    (product.time, product.time + Duration::days(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub current: DateTime<Utc>,
}

impl TimelineRange {
    /// Ten days either side of the catalog, cursor on the newest product.
    pub fn for_catalog(catalog: &Catalog) -> Option<Self> {
        let first = catalog.first()?;
        let last = catalog.last()?;
        Some(Self {
            start: first.time - Duration::days(RANGE_PADDING_DAYS),
            stop: last.time + Duration::days(RANGE_PADDING_DAYS),
            current: last.time,
        })
    }

    pub fn span(&self) -> Duration {
        (self.stop - self.start).abs()
    }

    /// Halve or double the span around its centre. The cursor is left alone,
    /// and a zoom that would leave the representable calendar is ignored.
    pub fn zoom(&self, direction: ZoomDirection) -> Self {
        let span_ms = self.span().num_milliseconds();
        let new_span_ms = match direction {
            ZoomDirection::In => span_ms / 2,
            ZoomDirection::Out => span_ms.saturating_mul(2),
        };
        let half = Duration::milliseconds(new_span_ms / 2);
        let zoomed = self
            .start
            .checked_add_signed(Duration::milliseconds(span_ms / 2))
            .and_then(|center| {
                Some((center.checked_sub_signed(half)?, center.checked_add_signed(half)?))
            });
        match zoomed {
            Some((start, stop)) => Self {
                start,
                stop,
                current: self.current,
            },
            None => *self,
        }
    }
}
