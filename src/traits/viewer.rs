use crate::error::{ImageryError, ViewerError};
use crate::imagery::{OverlayHandle, OverlayRequest};
use crate::models::{Bounds, Catalog, GeoPoint};
use crate::session::ProductDetail;
use crate::timeline::TimelineRange;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Camera locked onto a point, as used while orbiting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub target: GeoPoint,
    pub heading_deg: f64,
    pub pitch_deg: f64,
    pub range_m: f64,
}

#[async_trait]
pub trait Viewer: Send + Sync {
    /// Animate the camera until `bounds` fills the view.
    async fn fly_to(&self, bounds: &Bounds, duration: Duration) -> Result<(), ViewerError>;
    /// One frame of a locked camera.
    fn look_at(&self, pose: &CameraPose);
    /// Drop any lock installed by `look_at`.
    fn release_camera(&self);
    fn set_clock(&self, time: DateTime<Utc>);
    /// Where the time cursor is now; it also moves without `set_clock`.
    fn clock(&self) -> Option<DateTime<Utc>>;
    fn set_timeline(&self, range: &TimelineRange);
    fn set_continuous_rendering(&self, enabled: bool);
}

pub trait Presenter: Send + Sync {
    fn set_status(&self, message: &str);
    /// Product list, its summary line and the timeline markers.
    fn show_products(&self, catalog: &Catalog);
    fn highlight(&self, product_id: Option<&str>);
    fn show_detail(&self, detail: Option<&ProductDetail>);
    fn show_region(&self, bounds: Option<&Bounds>);
    fn set_mode_controls_enabled(&self, enabled: bool);
    /// Controls that act on the active product; off while the catalog is empty.
    fn set_selection_controls_enabled(&self, enabled: bool);
}

#[async_trait]
pub trait ImageryHost: Send + Sync {
    async fn add_overlay(&self, request: &OverlayRequest) -> Result<OverlayHandle, ImageryError>;
    fn remove_overlay(&self, handle: OverlayHandle);
}

/// Source of encoded media chunks, e.g. a canvas capture.
#[async_trait]
pub trait CaptureStream: Send {
    fn mime_type(&self) -> &str;
    /// Next chunk, `None` once the stream has ended.
    async fn next_chunk(&mut self) -> Option<Vec<u8>>;
    /// Stop capturing and hand back whatever is still buffered.
    async fn finish(&mut self) -> Vec<Vec<u8>>;
}
