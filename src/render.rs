//! Continuous rendering is only needed while the camera moves. Once things
//! settle a timer switches the viewer to on-demand rendering; tours and
//! recordings pin it on for as long as they run.

use crate::traits::Viewer;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const IDLE_RENDER_DELAY: Duration = Duration::from_secs(5);

#[derive(Default)]
struct ThrottleState {
    pins: usize,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    continuous: bool,
}

pub struct RenderThrottle {
    viewer: Arc<dyn Viewer>,
    idle_after: Duration,
    state: Mutex<ThrottleState>,
    this: Weak<RenderThrottle>,
}

impl RenderThrottle {
    pub fn new(viewer: Arc<dyn Viewer>, idle_after: Duration) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            viewer,
            idle_after,
            state: Mutex::new(ThrottleState::default()),
            this: this.clone(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_continuous(&self, state: &mut ThrottleState, enabled: bool) {
        if state.continuous != enabled {
            state.continuous = enabled;
            self.viewer.set_continuous_rendering(enabled);
        }
    }

    fn cancel_timer(state: &mut ThrottleState) {
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    /// Something is about to move: render continuously and forget any
    /// pending idle switch.
    pub fn wake(&self) {
        let mut state = self.lock();
        Self::cancel_timer(&mut state);
        self.set_continuous(&mut state, true);
    }

    /// Motion finished. Unless pinned, go idle after the delay.
    pub fn settle(&self) {
        let mut state = self.lock();
        if state.pins > 0 {
            return;
        }
        Self::cancel_timer(&mut state);
        let generation = state.generation;
        let this = self.this.clone();
        let delay = self.idle_after;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(throttle) = this.upgrade() {
                throttle.expire(generation);
            }
        }));
    }

    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.pins > 0 {
            return;
        }
        state.timer = None;
        debug!("viewer idle, switching to on-demand rendering");
        self.set_continuous(&mut state, false);
    }

    /// Keep rendering continuously until the matching [`RenderThrottle::unpin`].
    pub fn pin(&self) {
        let mut state = self.lock();
        state.pins += 1;
        Self::cancel_timer(&mut state);
        self.set_continuous(&mut state, true);
    }

    pub fn unpin(&self) {
        let released = {
            let mut state = self.lock();
            state.pins = state.pins.saturating_sub(1);
            state.pins == 0
        };
        if released {
            self.settle();
        }
    }

    /// Pin for the lifetime of the returned guard.
    pub fn hold(&self) -> RenderHold<'_> {
        self.pin();
        RenderHold(self)
    }

    pub fn is_continuous(&self) -> bool {
        self.lock().continuous
    }

    pub fn is_pinned(&self) -> bool {
        self.lock().pins > 0
    }
}

pub struct RenderHold<'a>(&'a RenderThrottle);

impl Drop for RenderHold<'_> {
    fn drop(&mut self) {
        self.0.unpin();
    }
}
