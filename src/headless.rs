//! Terminal stand-ins for the globe and the page, so a whole session can run
//! from the command line. Camera moves are logged and, while something is
//! listening, broadcast as poses that can be recorded.

use crate::error::{ImageryError, ViewerError};
use crate::imagery::{Capabilities, ImageryManager, OverlayHandle, OverlayRequest};
use crate::models::{Bounds, Catalog};
use crate::render::{IDLE_RENDER_DELAY, RenderThrottle};
use crate::session::{ProductDetail, Session};
use crate::timeline::TimelineRange;
use crate::traits::{CameraPose, CaptureStream, ImageryHost, Presenter, Viewer};
use crate::utils::style::NdviRamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const POSE_CHANNEL_CAPACITY: usize = 1024;
pub const POSE_MIME_TYPE: &str = "application/x-ndjson";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraEvent {
    Flight { bounds: Bounds, seconds: f64 },
    Pose(CameraPose),
    Released,
}

pub struct HeadlessViewer {
    events: broadcast::Sender<CameraEvent>,
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl Default for HeadlessViewer {
    fn default() -> Self {
        let (events, _) = broadcast::channel(POSE_CHANNEL_CAPACITY);
        Self {
            events,
            clock: Mutex::new(None),
        }
    }
}

impl HeadlessViewer {
    /// Capture of every camera event from now on, one JSON object per line.
    pub fn capture(&self) -> PoseCapture {
        PoseCapture {
            events: Some(self.events.subscribe()),
        }
    }

    fn emit(&self, event: CameraEvent) {
        // no receivers is the normal case when nothing records
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Viewer for HeadlessViewer {
    async fn fly_to(&self, bounds: &Bounds, duration: Duration) -> Result<(), ViewerError> {
        let center = bounds.center();
        info!(
            "Flying to {:.4}, {:.4} over {:.1}s",
            center.lon,
            center.lat,
            duration.as_secs_f64()
        );
        self.emit(CameraEvent::Flight {
            bounds: *bounds,
            seconds: duration.as_secs_f64(),
        });
        tokio::time::sleep(duration).await;
        Ok(())
    }

    fn look_at(&self, pose: &CameraPose) {
        debug!(heading = pose.heading_deg, range = pose.range_m, "camera pose");
        self.emit(CameraEvent::Pose(*pose));
    }

    fn release_camera(&self) {
        debug!("camera released");
        self.emit(CameraEvent::Released);
    }

    fn set_clock(&self, time: DateTime<Utc>) {
        debug!(%time, "clock moved");
        *self.clock.lock().unwrap_or_else(|e| e.into_inner()) = Some(time);
    }

    fn clock(&self) -> Option<DateTime<Utc>> {
        *self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_timeline(&self, range: &TimelineRange) {
        info!(
            "Timeline {} to {}",
            range.start.format("%Y-%m-%d"),
            range.stop.format("%Y-%m-%d")
        );
    }

    fn set_continuous_rendering(&self, enabled: bool) {
        debug!(enabled, "continuous rendering");
    }
}

pub struct PoseCapture {
    events: Option<broadcast::Receiver<CameraEvent>>,
}

#[async_trait]
impl CaptureStream for PoseCapture {
    fn mime_type(&self) -> &str {
        POSE_MIME_TYPE
    }

    async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        let events = self.events.as_mut()?;
        loop {
            match events.recv().await {
                Ok(event) => return encode_line(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "recording fell behind, camera events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn finish(&mut self) -> Vec<Vec<u8>> {
        let Some(mut events) = self.events.take() else {
            return Vec::new();
        };
        let mut rest = Vec::new();
        while let Ok(event) = events.try_recv() {
            rest.extend(encode_line(&event));
        }
        rest
    }
}

fn encode_line(event: &CameraEvent) -> Option<Vec<u8>> {
    match serde_json::to_vec(event) {
        Ok(mut line) => {
            line.push(b'\n');
            Some(line)
        }
        Err(e) => {
            warn!("unable to encode camera event: {}", e);
            Some(Vec::new())
        }
    }
}

/// Presenter that writes to the log. The last status line is kept for the
/// HTTP API.
#[derive(Default)]
pub struct LogPresenter {
    status: Mutex<Option<String>>,
}

impl LogPresenter {
    pub fn status(&self) -> Option<String> {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Presenter for LogPresenter {
    fn set_status(&self, message: &str) {
        info!("{}", message);
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    fn show_products(&self, catalog: &Catalog) {
        info!("{}", catalog.summary());
    }

    fn highlight(&self, product_id: Option<&str>) {
        debug!(product = product_id, "highlight");
    }

    fn show_detail(&self, detail: Option<&ProductDetail>) {
        match detail {
            Some(d) => info!(
                "{} · {} · {}% cloud · {} mode",
                d.name, d.date, d.cloud_cover, d.mode
            ),
            None => debug!("no product selected"),
        }
    }

    fn show_region(&self, bounds: Option<&Bounds>) {
        debug!(?bounds, "region");
    }

    fn set_mode_controls_enabled(&self, enabled: bool) {
        if !enabled {
            warn!("GeoTIFF imagery is unavailable, render mode controls disabled");
        }
    }

    fn set_selection_controls_enabled(&self, enabled: bool) {
        debug!(enabled, "selection controls");
    }
}

/// Overlay host without a renderer. Optionally checks that each COG answers
/// before reporting the overlay as loaded.
pub struct HeadlessImageryHost {
    client: Option<reqwest::Client>,
    next: AtomicU64,
}

impl HeadlessImageryHost {
    pub fn offline() -> Self {
        Self {
            client: None,
            next: AtomicU64::new(0),
        }
    }

    pub fn checking(client: reqwest::Client) -> Self {
        Self {
            client: Some(client),
            next: AtomicU64::new(0),
        }
    }

    async fn check_url(&self, client: &reqwest::Client, url: &str) -> Result<(), ImageryError> {
        let load_error = |reason: String| ImageryError::Load {
            url: url.to_string(),
            reason,
        };
        let response = client
            .head(url)
            .send()
            .await
            .map_err(|e| load_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(load_error(format!("server responded with {}", response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageryHost for HeadlessImageryHost {
    async fn add_overlay(&self, request: &OverlayRequest) -> Result<OverlayHandle, ImageryError> {
        if let Some(client) = &self.client {
            self.check_url(client, &request.url).await?;
        }
        let handle = OverlayHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(
            handle = handle.0,
            bands = ?request.band_indices,
            ndvi_ramp = request.raster_function.is_some(),
            "overlay added for {}",
            request.url
        );
        Ok(handle)
    }

    fn remove_overlay(&self, handle: OverlayHandle) {
        debug!(handle = handle.0, "overlay removed");
    }
}

/// A session wired to the headless collaborators.
pub struct HeadlessSession {
    pub session: Arc<Session>,
    pub viewer: Arc<HeadlessViewer>,
    pub presenter: Arc<LogPresenter>,
}

impl HeadlessSession {
    pub fn new(ramp: NdviRamp, host: HeadlessImageryHost) -> Self {
        let viewer = Arc::new(HeadlessViewer::default());
        let presenter = Arc::new(LogPresenter::default());
        let imagery = ImageryManager::new(Arc::new(host), Capabilities::full(), ramp);
        let throttle = RenderThrottle::new(viewer.clone(), IDLE_RENDER_DELAY);
        let session = Arc::new(Session::new(
            viewer.clone(),
            presenter.clone(),
            imagery,
            throttle,
        ));
        Self {
            session,
            viewer,
            presenter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::{Capabilities, RenderMode};
    use crate::models::DEFAULT_AOI_BOUNDS;
    use crate::models::product::fixtures::product;
    use crate::utils::style::NdviRamp;
    use axum::{Router, http::StatusCode, routing::get};

    #[tokio::test(start_paused = true)]
    async fn test_capture_records_camera_events() {
        let viewer = HeadlessViewer::default();
        let mut capture = viewer.capture();

        viewer.fly_to(&DEFAULT_AOI_BOUNDS, Duration::from_secs(1)).await.unwrap();
        viewer.look_at(&CameraPose {
            target: DEFAULT_AOI_BOUNDS.center(),
            heading_deg: 90.0,
            pitch_deg: -35.0,
            range_m: 2_000.0,
        });
        viewer.release_camera();

        let first = capture.next_chunk().await.unwrap();
        let line: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(line["kind"], "flight");
        assert_eq!(line["seconds"], 1.0);

        let rest = capture.finish().await;
        assert_eq!(rest.len(), 2);
        let pose: serde_json::Value = serde_json::from_slice(&rest[0]).unwrap();
        assert_eq!(pose["kind"], "pose");
        assert_eq!(pose["heading_deg"], 90.0);
        assert!(rest[1].ends_with(b"\n"));
        assert!(capture.next_chunk().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_headless_session_loads_sample() {
        let headless = HeadlessSession::new(NdviRamp::default(), HeadlessImageryHost::offline());
        let count = headless
            .session
            .load(&crate::reader::SampleCatalogReader)
            .await
            .unwrap();

        assert_eq!(count, 11);
        let newest = headless.session.active().unwrap();
        assert_eq!(headless.viewer.clock(), Some(newest.time));
        assert_eq!(
            headless.presenter.status(),
            Some(format!("{} loaded · RGB mode", newest.name))
        );
    }

    #[test]
    fn test_presenter_keeps_last_status() {
        let presenter = LogPresenter::default();
        assert_eq!(presenter.status(), None);
        presenter.set_status("Loading sample products…");
        presenter.set_status("3 observations loaded");
        assert_eq!(presenter.status().as_deref(), Some("3 observations loaded"));
    }

    #[tokio::test]
    async fn test_checking_host_reports_missing_cog() {
        let app = Router::new()
            .route("/ok.tif", get(|| async { "II*" }))
            .route("/gone.tif", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let host = HeadlessImageryHost::checking(reqwest::Client::new());
        let ramp = NdviRamp::default();
        let mut ok = product("ok", "2020-01-01");
        ok.url = format!("http://{}/ok.tif", addr);
        let mut gone = product("gone", "2020-01-02");
        gone.url = format!("http://{}/gone.tif", addr);

        let request = OverlayRequest::build(&ok, RenderMode::Rgb, &Capabilities::full(), &ramp);
        assert!(host.add_overlay(&request).await.is_ok());

        let request = OverlayRequest::build(&gone, RenderMode::Ndvi, &Capabilities::full(), &ramp);
        let err = host.add_overlay(&request).await.unwrap_err();
        assert!(matches!(err, ImageryError::Load { .. }));
    }
}
