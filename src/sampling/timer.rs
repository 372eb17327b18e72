//! Cycle Timer
//!
//! Correlates the start and end of one host cycle by handing the start
//! timestamp back to the caller instead of stashing it in thread-local state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::window::SampleWindow;

/// Start timestamp of one cycle, returned by [`CycleTimer::start`]
#[derive(Debug, Clone, Copy)]
#[must_use = "pass the token to CycleTimer::finish at the end of the cycle"]
pub struct CycleStart(Instant);

impl CycleStart {
    /// Token for a cycle starting now
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Token for a cycle that started at `instant`
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Instant the cycle started
    pub fn instant(&self) -> Instant {
        self.0
    }
}

/// Records cycle durations into a shared window
#[derive(Debug, Clone)]
pub struct CycleTimer {
    window: Arc<SampleWindow>,
}

impl CycleTimer {
    /// Create a timer writing to `window`
    pub fn new(window: Arc<SampleWindow>) -> Self {
        Self { window }
    }

    /// Mark the beginning of a cycle
    #[inline]
    pub fn start(&self) -> CycleStart {
        CycleStart::now()
    }

    /// Mark the end of the cycle started by `start` and record its duration
    #[inline]
    pub fn finish(&self, start: CycleStart) -> Duration {
        let elapsed = start.0.elapsed();
        self.window.record_duration(elapsed);
        elapsed
    }

    /// Run `cycle` and record how long it took
    pub fn time<R>(&self, cycle: impl FnOnce() -> R) -> R {
        let start = self.start();
        let result = cycle();
        self.finish(start);
        result
    }
}
