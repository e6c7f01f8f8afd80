use crate::models::Product;
use crate::session::{FLY_DURATION, ProductDetail, Session};
use crate::utils::geometry::orbit_pose;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const MIN_ORBIT_DURATION: Duration = Duration::from_secs(3);
pub const MAX_ORBIT_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_ORBIT_DURATION: Duration = Duration::from_secs(8);

/// Roughly 30 frames per second.
pub const ORBIT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

pub fn clamp_orbit_duration(duration: Duration) -> Duration {
    duration.clamp(MIN_ORBIT_DURATION, MAX_ORBIT_DURATION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourOutcome {
    Completed { stops: usize },
    Cancelled,
    AlreadyRunning,
    EmptyCatalog,
}

#[derive(Default)]
struct TourState {
    token: Option<CancellationToken>,
    orbit_active: bool,
}

pub struct TourController {
    session: Arc<Session>,
    orbit_duration: Duration,
    run_id: AtomicU64,
    state: Mutex<TourState>,
}

impl TourController {
    pub fn new(session: Arc<Session>, orbit_duration: Duration) -> Self {
        Self {
            session,
            orbit_duration: clamp_orbit_duration(orbit_duration),
            run_id: AtomicU64::new(0),
            state: Mutex::new(TourState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TourState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn orbit_duration(&self) -> Duration {
        self.orbit_duration
    }

    pub fn is_touring(&self) -> bool {
        self.lock().token.is_some()
    }

    /// Whether the camera is currently locked onto an orbit target.
    pub fn orbit_active(&self) -> bool {
        self.lock().orbit_active
    }

    pub fn run_id(&self) -> u64 {
        self.run_id.load(Ordering::SeqCst)
    }

    /// Tour the current catalog. Resolves once the tour completes or is
    /// stopped.
    pub async fn start_tour(&self) -> TourOutcome {
        let catalog = self.session.catalog();
        let (token, run) = {
            let mut state = self.lock();
            if state.token.is_some() {
                return TourOutcome::AlreadyRunning;
            }
            if catalog.is_empty() {
                return TourOutcome::EmptyCatalog;
            }
            let token = CancellationToken::new();
            state.token = Some(token.clone());
            (token, self.run_id())
        };
        info!(run, stops = catalog.len(), "tour started");

        let _hold = self.session.throttle().hold();
        let mut stops = 0;
        for product in catalog.iter() {
            if !self.visit(product, &token).await {
                info!(run, stops, "tour cancelled");
                return TourOutcome::Cancelled;
            }
            stops += 1;
        }

        // finished on its own; a stop in the meantime owns the cleanup
        let mut state = self.lock();
        if self.run_id() == run {
            state.token = None;
        }
        info!(run, stops, "tour completed");
        TourOutcome::Completed { stops }
    }

    /// Cancel a running tour and hand the camera back. Returns false when
    /// there was nothing to stop.
    pub fn stop_tour(&self) -> bool {
        let mut state = self.lock();
        let Some(token) = state.token.take() else {
            return false;
        };
        token.cancel();
        self.run_id.fetch_add(1, Ordering::SeqCst);
        state.orbit_active = false;
        self.session.viewer().release_camera();
        info!("tour stopped");
        true
    }

    async fn visit(&self, product: &Product, token: &CancellationToken) -> bool {
        let viewer = self.session.viewer();
        tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            result = viewer.fly_to(&product.bounds, FLY_DURATION) => {
                if let Err(e) = result {
                    debug!("tour flight to {} ended early: {}", product.id, e);
                }
            }
        }
        if token.is_cancelled() {
            return false;
        }
        self.session
            .presenter()
            .show_detail(Some(&ProductDetail::new(product, self.session.mode())));
        self.orbit(product, token).await
    }

    async fn orbit(&self, product: &Product, token: &CancellationToken) -> bool {
        let viewer = self.session.viewer();
        let started = Instant::now();
        let mut frames = tokio::time::interval(ORBIT_FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return false,
                _ = frames.tick() => {}
            }
            let elapsed = started.elapsed();
            if elapsed >= self.orbit_duration {
                break;
            }
            let pose = orbit_pose(&product.bounds, elapsed, self.orbit_duration);
            // checked under the lock so a concurrent stop cannot be undone
            let mut state = self.lock();
            if token.is_cancelled() {
                return false;
            }
            state.orbit_active = true;
            viewer.look_at(&pose);
        }

        let mut state = self.lock();
        if token.is_cancelled() {
            return false;
        }
        state.orbit_active = false;
        viewer.release_camera();
        true
    }
}
