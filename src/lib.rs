//! tickwatch - Server Health Monitoring
//!
//! Samples the duration of a server's main loop, derives its cycle rate,
//! computes per-region occupancy ceilings, and delivers a periodic health
//! report to a webhook on a cron schedule.
//!
//! # Architecture
//!
//! ```text
//! cycle loop → SampleWindow → RateMetrics ─┐
//! RegionProvider → capacity ───────────────┼─▶ ReportAssembler → Dispatcher → webhook
//! HostStatus / UptimeProvider ─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`capacity`] - Region capacity ceilings
//! - [`config`] - Configuration loading and validation
//! - [`context`] - Explicit application context
//! - [`dispatch`] - Cron schedules and the webhook dispatcher
//! - [`domain`] - Ports and value objects
//! - [`error`] - Error types
//! - [`i18n`] - Message catalogs
//! - [`report`] - Report assembly and payloads
//! - [`sampling`] - Cycle duration sampling and rate metrics

pub mod adapters;
pub mod capacity;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod i18n;
pub mod report;
pub mod sampling;

// Re-export commonly used types
pub use capacity::{CapacityResult, RegionOccupancy, AREA_CONSTANT};
pub use config::{MonitorConfig, ValidatedConfig};
pub use context::AppContext;
pub use dispatch::{CronSchedule, Dispatcher, DispatcherPhase, ScheduleState};
pub use error::{Error, Result};
pub use i18n::MessageCatalog;
pub use report::{HealthReport, RegionReport, ReportAssembler, WebhookPayload};
pub use sampling::{CycleTimer, RateMetrics, SampleWindow};
