//! Report documents
//!
//! [`HealthReport`] is the structured, locale-independent report;
//! [`WebhookPayload`] is its rendered, Discord-compatible wire form.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::capacity::CapacityResult;
use crate::domain::HostOccupancy;
use crate::sampling::RateSnapshot;

use super::uptime::Uptime;

// =============================================================================
// Health Report
// =============================================================================

/// Capacity figures for one region, as carried by a [`HealthReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCapacity {
    /// Display label
    pub label: String,
    /// Derived capacity
    pub capacity: CapacityResult,
}

/// Structured health report, built fresh for every delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Elapsed time since process start
    pub uptime: Uptime,
    /// Rate and mean cycle duration
    pub rates: RateSnapshot,
    /// Host-wide occupancy, absent when the host cannot supply it
    pub host: Option<HostOccupancy>,
    /// Regions with usable capacity data, in host order
    pub regions: Vec<RegionCapacity>,
    /// When the report was assembled
    pub generated_at: DateTime<Utc>,
}

// =============================================================================
// Webhook Payload
// =============================================================================

/// Webhook message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Sender name
    pub username: String,
    /// Rich embeds; the report uses exactly one
    pub embeds: Vec<Embed>,
}

/// One embed block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    /// ISO-8601 timestamp
    pub timestamp: String,
}

/// Named field of an embed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    /// Inline field
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl WebhookPayload {
    /// The single report embed, if present
    pub fn embed(&self) -> Option<&Embed> {
        self.embeds.first()
    }

    /// Look up a field of the report embed by name
    pub fn field(&self, name: &str) -> Option<&EmbedField> {
        self.embed()?.fields.iter().find(|f| f.name == name)
    }
}

/// Format `at` the way the webhook timestamp field expects
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
