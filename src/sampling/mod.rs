//! Cycle Sampling
//!
//! Hot-path duration sampling and the rate figures derived from it.
//!
//! # Architecture
//!
//! ```text
//! cycle loop ──▶ CycleTimer ──▶ SampleWindow ◀── RateMetrics ◀── reports / commands
//!   (writer)                     (lock-free)        (readers)
//! ```
//!
//! # Performance Targets
//!
//! - `record`: O(1), no locks, no allocation
//! - `mean`: O(window size), readers never block the writer

mod rate;
mod timer;
mod window;

pub use rate::{RateMetrics, RateSnapshot, DEFAULT_NOMINAL_RATE};
pub use timer::{CycleStart, CycleTimer};
pub use window::{SampleWindow, DEFAULT_NOMINAL_CYCLE, DEFAULT_WINDOW_SIZE};
