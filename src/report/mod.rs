//! Reporting
//!
//! Turns live metrics and host data into region capacity reports and the
//! scheduled health report.

mod assembler;
mod payload;
mod region;
mod uptime;

pub use assembler::{
    CapacityDebug, PayloadStyle, RegionFigures, RegionLine, RegionReport, ReportAssembler,
};
pub use payload::{
    iso_timestamp, Embed, EmbedField, EmbedFooter, HealthReport, RegionCapacity, WebhookPayload,
};
pub use region::{display_name, RegionResolver};
pub use uptime::Uptime;
