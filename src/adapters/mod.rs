//! Infrastructure Adapters
//!
//! Implementations of the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  ReportSink │ RegionProvider │ HostStatus │ UptimeProvider │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ WebhookSink │ RecordingSink │ StaticRegionProvider         │ │
//! │  │ SharedHostStatus │ ProcessClock                            │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tickwatch::adapters::WebhookSink;
//! use tickwatch::domain::ReportSink;
//!
//! let sink = WebhookSink::new(&config.webhook())?;
//! sink.send(&payload).await?;
//! ```

mod host;
mod recording;
mod regions;
mod webhook;

pub use host::{ProcessClock, SharedHostStatus};
pub use recording::{RecordedDelivery, RecordingSink};
pub use regions::StaticRegionProvider;
pub use webhook::{WebhookSink, CONNECT_TIMEOUT};
