//! Region Provider Adapter
//!
//! A `RegionProvider` over a snapshot list the host pushes in.

use parking_lot::RwLock;

use crate::capacity::RegionOccupancy;
use crate::domain::{RegionId, RegionProvider, RegionSnapshot};

/// Region list updated by the host, read by reports
#[derive(Debug, Default)]
pub struct StaticRegionProvider {
    regions: RwLock<Vec<RegionSnapshot>>,
}

impl StaticRegionProvider {
    /// Create a provider holding `regions`, in that order
    pub fn new(regions: Vec<RegionSnapshot>) -> Self {
        Self {
            regions: RwLock::new(regions),
        }
    }

    /// Replace the whole list
    pub fn update(&self, regions: Vec<RegionSnapshot>) {
        *self.regions.write() = regions;
    }

    /// Set one region's counters, appending the region if it is new.
    /// `None` marks its data as unavailable.
    pub fn set(&self, id: RegionId, occupancy: Option<RegionOccupancy>) {
        let mut regions = self.regions.write();
        match regions.iter_mut().find(|r| r.id == id) {
            Some(region) => region.occupancy = occupancy,
            None => regions.push(RegionSnapshot { id, occupancy }),
        }
    }

    /// Drop a region (e.g. it was unloaded)
    pub fn remove(&self, id: &RegionId) -> bool {
        let mut regions = self.regions.write();
        let before = regions.len();
        regions.retain(|r| &r.id != id);
        regions.len() != before
    }
}

impl RegionProvider for StaticRegionProvider {
    fn regions(&self) -> Vec<RegionSnapshot> {
        self.regions.read().clone()
    }
}
