use crate::error::CatalogError;
use crate::imagery::{ImageryManager, RefreshOutcome, RefreshTicket, RenderMode};
use crate::models::{Catalog, Product};
use crate::reader::{CatalogReader, load_catalog};
use crate::render::RenderThrottle;
use crate::timeline::{TimelineRange, ZoomDirection, nearest, within_selection_proximity};
use crate::traits::{Presenter, Viewer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const FLY_DURATION: Duration = Duration::from_millis(1400);
pub const CLOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What the detail panel shows for the active product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    pub name: String,
    pub id: String,
    pub date: String,
    pub cloud_cover: u8,
    pub url: String,
    pub mode: String,
}

impl ProductDetail {
    pub fn new(product: &Product, mode: RenderMode) -> Self {
        Self {
            name: product.name.clone(),
            id: product.id.clone(),
            date: product.date.clone(),
            cloud_cover: product.cloud_cover,
            url: product.url.clone(),
            mode: mode.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    pub fly_to: bool,
    pub update_clock: bool,
}

impl SelectOptions {
    /// Explicit pick from the list or the initial load.
    pub const EXPLICIT: Self = Self {
        fly_to: true,
        update_clock: true,
    };
    /// Selection that follows the clock; neither camera nor clock move.
    pub const FOLLOW_CLOCK: Self = Self {
        fly_to: false,
        update_clock: false,
    };
}

#[derive(Default)]
struct SelectionState {
    catalog: Arc<Catalog>,
    active: Option<Product>,
    mode: RenderMode,
    last_selection_time: Option<DateTime<Utc>>,
    timeline: Option<TimelineRange>,
}

pub struct Session {
    viewer: Arc<dyn Viewer>,
    presenter: Arc<dyn Presenter>,
    imagery: ImageryManager,
    throttle: Arc<RenderThrottle>,
    state: Mutex<SelectionState>,
}

impl Session {
    pub fn new(
        viewer: Arc<dyn Viewer>,
        presenter: Arc<dyn Presenter>,
        imagery: ImageryManager,
        throttle: Arc<RenderThrottle>,
    ) -> Self {
        presenter.set_mode_controls_enabled(imagery.capabilities().geotiff_imagery);
        presenter.set_selection_controls_enabled(false);
        presenter.show_detail(None);
        Self {
            viewer,
            presenter,
            imagery,
            throttle,
            state: Mutex::new(SelectionState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn viewer(&self) -> &Arc<dyn Viewer> {
        &self.viewer
    }

    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }

    pub fn imagery(&self) -> &ImageryManager {
        &self.imagery
    }

    pub fn throttle(&self) -> &Arc<RenderThrottle> {
        &self.throttle
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.lock().catalog.clone()
    }

    pub fn active(&self) -> Option<Product> {
        self.lock().active.clone()
    }

    pub fn mode(&self) -> RenderMode {
        self.lock().mode
    }

    pub fn timeline(&self) -> Option<TimelineRange> {
        self.lock().timeline
    }

    /// Load a catalog and select its newest product. On failure the previous
    /// catalog stays in place.
    pub async fn load(&self, reader: &dyn CatalogReader) -> Result<usize, CatalogError> {
        self.presenter.set_status(reader.describe());

        let catalog = match load_catalog(reader).await {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                error!("Unable to load products: {}", e);
                self.presenter
                    .set_status(&format!("Unable to load products: {}", e));
                return Err(e);
            }
        };

        let range = TimelineRange::for_catalog(&catalog);
        {
            let mut state = self.lock();
            state.catalog = catalog.clone();
            state.active = None;
            state.last_selection_time = None;
            state.timeline = range;
        }
        self.imagery.clear();

        self.presenter.show_products(&catalog);
        self.presenter
            .set_selection_controls_enabled(!catalog.is_empty());
        if let Some(range) = &range {
            self.viewer.set_timeline(range);
        }

        match catalog.last() {
            Some(newest) => self.select(newest, SelectOptions::EXPLICIT).await,
            None => {
                self.presenter.highlight(None);
                self.presenter.show_detail(None);
                self.presenter.show_region(None);
            }
        }
        Ok(catalog.len())
    }

    /// Select by id from the current catalog. Returns false for unknown ids.
    pub async fn select_id(&self, product_id: &str, options: SelectOptions) -> bool {
        let product = self.catalog().get(product_id).cloned();
        match product {
            Some(product) => {
                self.select(&product, options).await;
                true
            }
            None => {
                warn!(product = product_id, "no such product");
                false
            }
        }
    }

    pub async fn select(&self, product: &Product, options: SelectOptions) {
        let (mode, ticket) = {
            let mut state = self.lock();
            state.active = Some(product.clone());
            if options.update_clock {
                state.last_selection_time = Some(product.time);
            }
            (state.mode, self.imagery.claim(&product.id, state.mode))
        };
        debug!(product = %product.id, ?options, "selecting product");

        self.presenter.highlight(Some(&product.id));
        self.presenter
            .show_detail(Some(&ProductDetail::new(product, mode)));
        self.presenter.show_region(Some(&product.bounds));
        if options.update_clock {
            self.viewer.set_clock(product.time);
        }

        let fly = async {
            if !options.fly_to {
                return;
            }
            self.throttle.wake();
            if let Err(e) = self.viewer.fly_to(&product.bounds, FLY_DURATION).await {
                debug!("flight to {} ended early: {}", product.id, e);
            }
            self.throttle.settle();
        };
        let refresh = async {
            match ticket {
                Some(ticket) => self.refresh_imagery(ticket, product, mode).await,
                None => debug!(product = %product.id, "overlay already current"),
            }
        };
        tokio::join!(fly, refresh);
    }

    async fn refresh_imagery(&self, ticket: RefreshTicket, product: &Product, mode: RenderMode) {
        if let RefreshOutcome::Loaded(_) = self
            .imagery
            .load(ticket, product, mode, self.presenter.as_ref())
            .await
        {
            info!(product = %product.id, mode = %mode, "imagery ready");
        }
    }

    pub async fn set_mode(&self, mode: RenderMode) {
        let (product, ticket) = {
            let mut state = self.lock();
            state.mode = mode;
            let Some(product) = state.active.clone() else {
                return;
            };
            let ticket = self.imagery.claim(&product.id, mode);
            (product, ticket)
        };
        self.presenter
            .show_detail(Some(&ProductDetail::new(&product, mode)));
        if let Some(ticket) = ticket {
            self.refresh_imagery(ticket, &product, mode).await;
        }
    }

    /// React to the clock moving. Returns the product selected as a result.
    pub async fn on_clock_tick(&self, time: DateTime<Utc>) -> Option<Product> {
        let candidate = {
            let state = self.lock();
            let active = state.active.as_ref()?;
            if state.last_selection_time == Some(time) {
                return None;
            }
            let closest = nearest(&state.catalog, time)?;
            if closest.id == active.id || !within_selection_proximity(closest, time) {
                return None;
            }
            closest.clone()
        };
        self.select(&candidate, SelectOptions::FOLLOW_CLOCK).await;
        Some(candidate)
    }

    /// Poll the viewer clock and let the selection follow it. The task ends
    /// once the session is dropped.
    pub fn follow_clock(session: &Arc<Session>, period: Duration) -> JoinHandle<()> {
        let session = Arc::downgrade(session);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seen = None;
            loop {
                ticks.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                let Some(now) = session.viewer.clock() else {
                    continue;
                };
                if seen == Some(now) {
                    continue;
                }
                seen = Some(now);
                if let Some(product) = session.on_clock_tick(now).await {
                    info!(product = %product.id, "selection followed the clock");
                }
            }
            debug!("clock follower stopped");
        })
    }

    pub fn zoom_timeline(&self, direction: ZoomDirection) -> Option<TimelineRange> {
        let range = {
            let mut state = self.lock();
            let zoomed = state.timeline?.zoom(direction);
            state.timeline = Some(zoomed);
            zoomed
        };
        self.viewer.set_timeline(&range);
        Some(range)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::ViewerError;
    use crate::models::Bounds;
    use crate::traits::CameraPose;
    use async_trait::async_trait;

    /// Presenter that remembers what it was told.
    #[derive(Default)]
    pub struct NullPresenter {
        pub statuses: Mutex<Vec<String>>,
        pub highlighted: Mutex<Option<String>>,
        pub detail: Mutex<Option<ProductDetail>>,
        pub region: Mutex<Option<Bounds>>,
        pub product_count: Mutex<Option<usize>>,
        pub mode_controls: Mutex<Option<bool>>,
        pub selection_controls: Mutex<Option<bool>>,
    }

    impl NullPresenter {
        pub fn last_status(&self) -> Option<String> {
            self.statuses.lock().unwrap().last().cloned()
        }
    }

    impl Presenter for NullPresenter {
        fn set_status(&self, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }

        fn show_products(&self, catalog: &Catalog) {
            *self.product_count.lock().unwrap() = Some(catalog.len());
        }

        fn highlight(&self, product_id: Option<&str>) {
            *self.highlighted.lock().unwrap() = product_id.map(str::to_string);
        }

        fn show_detail(&self, detail: Option<&ProductDetail>) {
            *self.detail.lock().unwrap() = detail.cloned();
        }

        fn show_region(&self, bounds: Option<&Bounds>) {
            *self.region.lock().unwrap() = bounds.copied();
        }

        fn set_mode_controls_enabled(&self, enabled: bool) {
            *self.mode_controls.lock().unwrap() = Some(enabled);
        }

        fn set_selection_controls_enabled(&self, enabled: bool) {
            *self.selection_controls.lock().unwrap() = Some(enabled);
        }
    }

    /// Viewer whose flights take `FLY_DURATION` of (usually paused) time.
    #[derive(Default)]
    pub struct MockViewer {
        pub flights: Mutex<Vec<Bounds>>,
        pub poses: Mutex<Vec<CameraPose>>,
        pub locked: Mutex<bool>,
        pub releases: Mutex<usize>,
        pub clock: Mutex<Option<DateTime<Utc>>>,
        pub timeline: Mutex<Option<TimelineRange>>,
        pub continuous: Mutex<Option<bool>>,
    }

    impl MockViewer {
        pub fn continuous(&self) -> Option<bool> {
            *self.continuous.lock().unwrap()
        }

        pub fn is_locked(&self) -> bool {
            *self.locked.lock().unwrap()
        }
    }

    #[async_trait]
    impl Viewer for MockViewer {
        async fn fly_to(&self, bounds: &Bounds, duration: Duration) -> Result<(), ViewerError> {
            self.flights.lock().unwrap().push(*bounds);
            tokio::time::sleep(duration).await;
            Ok(())
        }

        fn look_at(&self, pose: &CameraPose) {
            *self.locked.lock().unwrap() = true;
            self.poses.lock().unwrap().push(*pose);
        }

        fn release_camera(&self) {
            *self.locked.lock().unwrap() = false;
            *self.releases.lock().unwrap() += 1;
        }

        fn set_clock(&self, time: DateTime<Utc>) {
            *self.clock.lock().unwrap() = Some(time);
        }

        fn clock(&self) -> Option<DateTime<Utc>> {
            *self.clock.lock().unwrap()
        }

        fn set_timeline(&self, range: &TimelineRange) {
            *self.timeline.lock().unwrap() = Some(*range);
        }

        fn set_continuous_rendering(&self, enabled: bool) {
            *self.continuous.lock().unwrap() = Some(enabled);
        }
    }
}
