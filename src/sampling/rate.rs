//! Rate Metrics
//!
//! Smoothed cycles-per-second and mean cycle duration derived from a
//! [`SampleWindow`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::window::SampleWindow;

/// Default nominal cycle rate (cycles per second)
pub const DEFAULT_NOMINAL_RATE: u32 = 20;

/// Point-in-time view of the rate figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Cycles per second, capped at the nominal rate
    pub rate: f64,
    /// Mean cycle duration in milliseconds
    pub mean_cycle_millis: f64,
    /// Samples the figures were derived from
    pub sample_count: usize,
}

/// Derives rate and latency figures from the shared sample window
#[derive(Debug, Clone)]
pub struct RateMetrics {
    window: Arc<SampleWindow>,
    nominal_rate: f64,
}

impl RateMetrics {
    /// Create rate metrics over `window` capped at `nominal_rate`
    pub fn new(window: Arc<SampleWindow>, nominal_rate: u32) -> Self {
        Self {
            window,
            nominal_rate: f64::from(nominal_rate.max(1)),
        }
    }

    /// Nominal (maximum reportable) rate
    pub fn nominal_rate(&self) -> f64 {
        self.nominal_rate
    }

    /// Mean cycle duration in milliseconds
    pub fn mean_cycle_millis(&self) -> f64 {
        self.window.mean_nanos() / 1_000_000.0
    }

    /// Cycles per second, never above the nominal rate
    pub fn rate(&self) -> f64 {
        Self::rate_for(self.mean_cycle_millis(), self.nominal_rate)
    }

    fn rate_for(mean_cycle_millis: f64, nominal_rate: f64) -> f64 {
        if !mean_cycle_millis.is_finite() || mean_cycle_millis <= 0.0 {
            return nominal_rate;
        }
        (1000.0 / mean_cycle_millis).min(nominal_rate)
    }

    /// Read both figures from a single pass over the window
    pub fn snapshot(&self) -> RateSnapshot {
        let mean_cycle_millis = self.mean_cycle_millis();
        RateSnapshot {
            rate: Self::rate_for(mean_cycle_millis, self.nominal_rate),
            mean_cycle_millis,
            sample_count: self.window.len(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::window::{DEFAULT_NOMINAL_CYCLE, DEFAULT_WINDOW_SIZE};
    use proptest::prelude::*;

    fn metrics() -> (Arc<SampleWindow>, RateMetrics) {
        let window = Arc::new(SampleWindow::new(DEFAULT_WINDOW_SIZE, DEFAULT_NOMINAL_CYCLE));
        let metrics = RateMetrics::new(Arc::clone(&window), DEFAULT_NOMINAL_RATE);
        (window, metrics)
    }

    #[test]
    fn test_steady_state_at_nominal() {
        let (window, metrics) = metrics();
        for _ in 0..150 {
            window.record(50_000_000);
        }

        assert_eq!(window.len(), 100);
        assert_eq!(metrics.mean_cycle_millis(), 50.0);
        assert_eq!(metrics.rate(), 20.0);
    }

    #[test]
    fn test_empty_window_reports_nominal() {
        let (_, metrics) = metrics();
        assert_eq!(metrics.mean_cycle_millis(), 50.0);
        assert_eq!(metrics.rate(), 20.0);
    }

    #[test]
    fn test_fast_cycles_capped() {
        let (window, metrics) = metrics();
        window.record(5_000_000);
        assert_eq!(metrics.mean_cycle_millis(), 5.0);
        assert_eq!(metrics.rate(), 20.0);
    }

    #[test]
    fn test_slow_cycles_lower_rate() {
        let (window, metrics) = metrics();
        window.record(100_000_000);
        assert_eq!(metrics.rate(), 10.0);
    }

    #[test]
    fn test_zero_mean_returns_nominal() {
        let (window, metrics) = metrics();
        window.record(0);
        assert_eq!(metrics.mean_cycle_millis(), 0.0);
        assert_eq!(metrics.rate(), 20.0);
    }

    #[test]
    fn test_snapshot() {
        let (window, metrics) = metrics();
        window.record(80_000_000);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sample_count, 1);
        assert_eq!(snapshot.mean_cycle_millis, 80.0);
        assert_eq!(snapshot.rate, 12.5);
    }

    proptest! {
        #[test]
        fn prop_rate_never_exceeds_nominal(values in prop::collection::vec(0i64..200_000_000, 0..200)) {
            let (window, metrics) = metrics();
            for v in values {
                window.record(v);
            }
            prop_assert!(metrics.rate() <= 20.0);
            prop_assert!(metrics.rate() > 0.0);
        }
    }
}
