//! Sample Window
//!
//! Fixed-size ring of recent cycle durations. The hot path writes with two
//! relaxed stores and one release store; readers never block the writer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;

/// Default number of retained samples
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Default nominal cycle duration (20 cycles per second)
pub const DEFAULT_NOMINAL_CYCLE: Duration = Duration::from_millis(50);

/// Bounded sliding window of per-cycle durations in nanoseconds.
///
/// Holds at most `capacity` samples; once full, every insert overwrites the
/// oldest slot. Designed for a single writer (the cycle loop) and any number
/// of concurrent readers. Concurrent writers are tolerated but may drop
/// samples.
pub struct SampleWindow {
    /// Ring storage
    slots: Box<[AtomicU64]>,
    /// Total samples ever recorded; the next write goes to `written % capacity`
    written: CachePadded<AtomicU64>,
    /// Value reported by [`mean_nanos`](Self::mean_nanos) while empty
    fallback_nanos: u64,
}

impl SampleWindow {
    /// Create a window retaining `capacity` samples.
    ///
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize, nominal_cycle: Duration) -> Self {
        let capacity = capacity.max(1);
        let slots: Vec<AtomicU64> = (0..capacity).map(|_| AtomicU64::new(0)).collect();

        Self {
            slots: slots.into_boxed_slice(),
            written: CachePadded::new(AtomicU64::new(0)),
            fallback_nanos: nominal_cycle.as_nanos().min(u64::MAX as u128) as u64,
        }
    }

    /// Maximum number of retained samples
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        (self.written.load(Ordering::Acquire) as usize).min(self.capacity())
    }

    /// Whether no sample has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.written.load(Ordering::Acquire) == 0
    }

    /// Total number of samples recorded since creation, evicted ones included
    pub fn total_recorded(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    /// Record one cycle duration in nanoseconds.
    ///
    /// Negative values are clamped to zero.
    #[inline]
    pub fn record(&self, duration_nanos: i64) {
        self.record_nanos(duration_nanos.max(0) as u64);
    }

    /// Record one cycle duration.
    #[inline]
    pub fn record_duration(&self, duration: Duration) {
        self.record_nanos(duration.as_nanos().min(u64::MAX as u128) as u64);
    }

    #[inline]
    fn record_nanos(&self, nanos: u64) {
        let seq = self.written.load(Ordering::Relaxed);
        let idx = (seq % self.slots.len() as u64) as usize;
        self.slots[idx].store(nanos, Ordering::Relaxed);
        // Publish only after the slot holds its value.
        self.written.store(seq.wrapping_add(1), Ordering::Release);
    }

    /// Mean of the held samples in nanoseconds, or the nominal cycle
    /// duration while the window is empty.
    pub fn mean_nanos(&self) -> f64 {
        let len = self.len();
        if len == 0 {
            return self.fallback_nanos as f64;
        }

        let sum: u128 = self.slots[..len]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed) as u128)
            .sum();

        sum as f64 / len as f64
    }

    /// Held samples, oldest first
    pub fn samples(&self) -> Vec<u64> {
        let written = self.written.load(Ordering::Acquire);
        let capacity = self.slots.len() as u64;

        if written <= capacity {
            return self.slots[..written as usize]
                .iter()
                .map(|slot| slot.load(Ordering::Relaxed))
                .collect();
        }

        let start = written % capacity;
        (0..capacity)
            .map(|offset| {
                let idx = ((start + offset) % capacity) as usize;
                self.slots[idx].load(Ordering::Relaxed)
            })
            .collect()
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_NOMINAL_CYCLE)
    }
}

impl std::fmt::Debug for SampleWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleWindow")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("total_recorded", &self.total_recorded())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
