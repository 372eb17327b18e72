//! Capacity Model
//!
//! Converts a region's occupancy and area counters into a capacity ceiling.
//! Stateless; every call works on a fresh snapshot.
//!
//! ```text
//! ceiling = floor(nominal_capacity * area_count / AREA_CONSTANT)   (area_count > 0)
//!         = 0                                                      (area_count == 0, degenerate)
//! ```

use serde::{Deserialize, Serialize};

/// Normalisation factor for area counts (a 17 x 17 area)
pub const AREA_CONSTANT: u32 = 17 * 17;

/// Default nominal capacity per normalised area
pub const DEFAULT_NOMINAL_CAPACITY: u32 = 70;

// =============================================================================
// Region Occupancy
// =============================================================================

/// Immutable occupancy snapshot for one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOccupancy {
    /// Entities currently counted against the ceiling
    pub occupancy_count: u64,
    /// Measured area / weight of the region
    pub area_count: u64,
    /// Capacity granted per `AREA_CONSTANT` units of area
    pub nominal_capacity: u32,
}

impl RegionOccupancy {
    /// Create a snapshot
    pub fn new(occupancy_count: u64, area_count: u64, nominal_capacity: u32) -> Self {
        Self {
            occupancy_count,
            area_count,
            nominal_capacity,
        }
    }

    /// Create a snapshot from signed counters, clamping negatives to zero
    pub fn from_raw(occupancy_count: i64, area_count: i64, nominal_capacity: i64) -> Self {
        Self {
            occupancy_count: occupancy_count.max(0) as u64,
            area_count: area_count.max(0) as u64,
            nominal_capacity: nominal_capacity.clamp(0, i64::from(u32::MAX)) as u32,
        }
    }

    /// Evaluate the capacity model for this snapshot
    pub fn evaluate(&self) -> CapacityResult {
        CapacityResult {
            ceiling: compute_ceiling(self),
            occupancy_count: self.occupancy_count,
            area_count: self.area_count,
            nominal_capacity: self.nominal_capacity,
            degenerate: degenerate(self),
        }
    }
}

// =============================================================================
// Capacity Result
// =============================================================================

/// Derived capacity figures for one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityResult {
    /// Maximum permitted occupancy
    pub ceiling: u64,
    /// Current occupancy
    pub occupancy_count: u64,
    /// Area the ceiling was derived from
    pub area_count: u64,
    /// Nominal capacity used for the derivation
    pub nominal_capacity: u32,
    /// Area was zero; the ceiling is trivially zero
    pub degenerate: bool,
}

impl CapacityResult {
    /// Occupancy is above the ceiling
    pub fn is_over_capacity(&self) -> bool {
        !self.degenerate && self.occupancy_count > self.ceiling
    }

    /// Occupancy as a fraction of the ceiling, `None` when the ceiling is zero
    pub fn utilization(&self) -> Option<f64> {
        if self.ceiling == 0 {
            None
        } else {
            Some(self.occupancy_count as f64 / self.ceiling as f64)
        }
    }
}

/// Capacity ceiling for `region`
pub fn compute_ceiling(region: &RegionOccupancy) -> u64 {
    if region.area_count == 0 {
        return 0;
    }
    let scaled = u128::from(region.nominal_capacity) * u128::from(region.area_count);
    (scaled / u128::from(AREA_CONSTANT)).min(u128::from(u64::MAX)) as u64
}

/// Whether `region` has a zero area measurement
pub fn degenerate(region: &RegionOccupancy) -> bool {
    region.area_count == 0
}

// =============================================================================
// Tests
// =============================================================================
