use crate::error::ImageryError;
use crate::models::Product;
use crate::traits::{ImageryHost, Presenter};
use crate::utils::style::NdviRamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

pub mod ndvi;

pub const LOAD_FAILED_STATUS: &str = "Unable to load the GeoTIFF imagery. Check the COG URL.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Rgb,
    Ndvi,
}

impl RenderMode {
    pub fn label(&self) -> &'static str {
        match self {
            RenderMode::Rgb => "RGB",
            RenderMode::Ndvi => "NDVI",
        }
    }

    /// Source bands read for the mode: red/green/blue, or NIR then red.
    pub fn band_indices(&self) -> Vec<usize> {
        match self {
            RenderMode::Rgb => vec![0, 1, 2],
            RenderMode::Ndvi => vec![3, 0],
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(RenderMode::Rgb),
            "ndvi" => Ok(RenderMode::Ndvi),
            other => Err(format!("Unknown render mode '{}'", other)),
        }
    }
}

/// Layer colour correction applied to true-colour imagery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColourAdjustment {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub gamma: f32,
}

pub const TRUE_COLOUR_ADJUSTMENT: ColourAdjustment = ColourAdjustment {
    brightness: 1.1,
    contrast: 1.25,
    saturation: 1.15,
    gamma: 1.05,
};

/// Optional renderer features, detected once when the viewer starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Cloud-optimised GeoTIFF overlays can be created at all.
    pub geotiff_imagery: bool,
    /// Per-pixel raster functions (needed to paint NDVI) are available.
    pub raster_functions: bool,
}

impl Capabilities {
    pub fn full() -> Self {
        Self {
            geotiff_imagery: true,
            raster_functions: true,
        }
    }

    pub fn none() -> Self {
        Self {
            geotiff_imagery: false,
            raster_functions: false,
        }
    }
}

/// Everything the renderer needs to build one overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRequest {
    pub product_id: String,
    pub url: String,
    pub mode: RenderMode,
    pub band_indices: Vec<usize>,
    pub raster_function: Option<NdviRamp>,
    pub adjustment: Option<ColourAdjustment>,
    pub maximum_level: u8,
    pub enable_pick_features: bool,
    pub alpha: f32,
}

impl OverlayRequest {
    pub fn build(
        product: &Product,
        mode: RenderMode,
        capabilities: &Capabilities,
        ramp: &NdviRamp,
    ) -> Self {
        let (raster_function, adjustment) = match mode {
            RenderMode::Rgb => (None, Some(TRUE_COLOUR_ADJUSTMENT)),
            RenderMode::Ndvi => (
                capabilities.raster_functions.then(|| ramp.clone()),
                None,
            ),
        };
        Self {
            product_id: product.id.clone(),
            url: product.url.clone(),
            mode,
            band_indices: mode.band_indices(),
            raster_function,
            adjustment,
            maximum_level: 16,
            enable_pick_features: false,
            alpha: 1.0,
        }
    }
}

/// Renderer-side identity of a live overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OverlayHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
struct ActiveOverlay {
    handle: OverlayHandle,
    product_id: String,
    mode: RenderMode,
}

#[derive(Debug, Default)]
struct OverlayState {
    // bumped on every refresh; a load finishing under an older value is stale
    generation: u64,
    // (product, mode) of the newest refresh, loaded or still loading
    target: Option<(String, RenderMode)>,
    active: Option<ActiveOverlay>,
}

impl OverlayState {
    fn issue(&mut self, product_id: &str, mode: RenderMode) -> RefreshTicket {
        self.generation += 1;
        self.target = Some((product_id.to_string(), mode));
        RefreshTicket {
            generation: self.generation,
            replaced: self.active.take(),
        }
    }
}

/// The right to fill the overlay slot. Only the newest ticket's overlay is
/// kept.
#[derive(Debug)]
pub struct RefreshTicket {
    generation: u64,
    replaced: Option<ActiveOverlay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Loaded(OverlayHandle),
    /// A newer refresh started while this one was loading.
    Superseded,
    Failed(String),
}

/// Keeps at most one overlay alive, always for the latest (product, mode).
pub struct ImageryManager {
    host: Arc<dyn ImageryHost>,
    capabilities: Capabilities,
    ramp: NdviRamp,
    state: Mutex<OverlayState>,
}

impl ImageryManager {
    pub fn new(host: Arc<dyn ImageryHost>, capabilities: Capabilities, ramp: NdviRamp) -> Self {
        Self {
            host,
            capabilities,
            ramp,
            state: Mutex::new(OverlayState::default()),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn ramp(&self) -> &NdviRamp {
        &self.ramp
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // a failed load must not block a retry of the same pair
    fn forget_target(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation {
            state.target = None;
        }
    }

    /// Product id and mode of the overlay currently on the map.
    pub fn active(&self) -> Option<(String, RenderMode)> {
        self.lock()
            .active
            .as_ref()
            .map(|a| (a.product_id.clone(), a.mode))
    }

    /// Remove the current overlay (if any) and invalidate loads in flight.
    pub fn clear(&self) {
        let old = {
            let mut state = self.lock();
            state.generation += 1;
            state.target = None;
            state.active.take()
        };
        if let Some(old) = old {
            self.host.remove_overlay(old.handle);
        }
    }

    /// Ticket for `product_id` in `mode`, or `None` when the overlay on the
    /// map (or the one loading) is already for that pair. The check and the
    /// claim happen atomically, so the last claimant always wins the slot.
    pub fn claim(&self, product_id: &str, mode: RenderMode) -> Option<RefreshTicket> {
        let mut state = self.lock();
        let current = state
            .target
            .as_ref()
            .is_some_and(|(id, m)| id == product_id && *m == mode);
        if current {
            return None;
        }
        Some(state.issue(product_id, mode))
    }

    /// Replace the overlay with one for `product` in `mode`. Never fails:
    /// problems end up on the status line and leave the map without overlay.
    pub async fn refresh(
        &self,
        product: &Product,
        mode: RenderMode,
        presenter: &dyn Presenter,
    ) -> RefreshOutcome {
        let ticket = self.lock().issue(&product.id, mode);
        self.load(ticket, product, mode, presenter).await
    }

    /// Fill the slot claimed by `ticket`.
    pub async fn load(
        &self,
        ticket: RefreshTicket,
        product: &Product,
        mode: RenderMode,
        presenter: &dyn Presenter,
    ) -> RefreshOutcome {
        presenter.set_status(&format!("Loading {} imagery…", mode.label()));

        let RefreshTicket {
            generation,
            replaced,
        } = ticket;
        if let Some(old) = replaced {
            debug!(handle = old.handle.0, "removing overlay");
            self.host.remove_overlay(old.handle);
        }

        if !self.capabilities.geotiff_imagery {
            self.forget_target(generation);
            let message = ImageryError::Unsupported.to_string();
            presenter.set_status(&message);
            return RefreshOutcome::Failed(message);
        }

        let request = OverlayRequest::build(product, mode, &self.capabilities, &self.ramp);
        let result = self.host.add_overlay(&request).await;

        let mut state = self.lock();
        if state.generation != generation {
            drop(state);
            if let Ok(handle) = result {
                debug!(handle = handle.0, product = %product.id, "discarding stale overlay");
                self.host.remove_overlay(handle);
            }
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(handle) => {
                state.active = Some(ActiveOverlay {
                    handle,
                    product_id: product.id.clone(),
                    mode,
                });
                drop(state);
                info!(product = %product.id, mode = %mode, "overlay loaded");
                presenter.set_status(&format!("{} loaded · {} mode", product.name, mode.label()));
                RefreshOutcome::Loaded(handle)
            }
            Err(e) => {
                state.target = None;
                drop(state);
                error!("Unable to load GeoTIFF imagery for {}: {}", product.url, e);
                presenter.set_status(LOAD_FAILED_STATUS);
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }
}
