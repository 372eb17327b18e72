//! Scheduled Delivery
//!
//! In-process cron scheduling of the health report webhook.

pub mod cron;
mod dispatcher;

pub use cron::{CronSchedule, DEFAULT_CRON_EXPRESSION};
pub use dispatcher::{
    DeliveryCounts, DeliveryStats, Dispatcher, DispatcherPhase, ScheduleState,
};
