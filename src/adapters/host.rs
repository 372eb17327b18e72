//! Host status and uptime adapters

use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::domain::{HostOccupancy, HostStatus, UptimeProvider};

/// Uptime measured from construction
#[derive(Debug, Clone, Copy)]
pub struct ProcessClock {
    started: Instant,
}

impl ProcessClock {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started: Instant) -> Self {
        Self { started }
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

impl Default for ProcessClock {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeProvider for ProcessClock {
    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Host occupancy pushed in by the host; absent until first set
#[derive(Debug, Default)]
pub struct SharedHostStatus {
    occupancy: RwLock<Option<HostOccupancy>>,
}

impl SharedHostStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, current: u32, max: u32) {
        *self.occupancy.write() = Some(HostOccupancy { current, max });
    }

    pub fn clear(&self) {
        *self.occupancy.write() = None;
    }
}

impl HostStatus for SharedHostStatus {
    fn occupancy(&self) -> Option<HostOccupancy> {
        *self.occupancy.read()
    }
}
