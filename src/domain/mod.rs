//! Domain Layer
//!
//! Value objects and port traits shared by the sampling, reporting and
//! dispatch components.
//!
//! # Usage
//!
//! ```ignore
//! use tickwatch::domain::{RegionProvider, RegionSnapshot};
//!
//! fn occupied(provider: &dyn RegionProvider) -> u64 {
//!     provider
//!         .regions()
//!         .iter()
//!         .filter_map(|r| r.occupancy)
//!         .map(|o| o.occupancy_count)
//!         .sum()
//! }
//! ```

pub mod ports;

pub use ports::{
    // Port traits
    HostStatus,
    MessageFormatter,
    RegionProvider,
    ReportSink,
    UptimeProvider,
    // Value objects
    HostOccupancy,
    RegionId,
    RegionSnapshot,
    DEFAULT_NAMESPACE,
};
