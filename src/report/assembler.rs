//! Report Assembler
//!
//! Builds region capacity reports for interactive callers and the health
//! report / webhook payload for the dispatcher. Every build reads live data;
//! nothing is cached between calls.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capacity::{CapacityResult, AREA_CONSTANT};
use crate::context::AppContext;
use crate::domain::{
    HostOccupancy, HostStatus, MessageFormatter, RegionId, RegionProvider, RegionSnapshot,
    UptimeProvider,
};
use crate::error::Result;
use crate::sampling::{RateMetrics, RateSnapshot};

use super::payload::{
    iso_timestamp, Embed, EmbedField, EmbedFooter, HealthReport, RegionCapacity, WebhookPayload,
};
use super::region::{display_name, RegionResolver};
use super::uptime::Uptime;

// =============================================================================
// Region Report
// =============================================================================

/// Extra figures shown in debug mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityDebug {
    pub nominal_capacity: u32,
    pub area_count: u64,
    pub area_constant: u32,
}

/// Figures shown for a region with usable data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionFigures {
    pub occupancy_count: u64,
    pub ceiling: u64,
    pub degenerate: bool,
    pub over_capacity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<CapacityDebug>,
}

/// One region entry of a [`RegionReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionLine {
    pub region_id: RegionId,
    pub label: String,
    /// `None` when the host had no data for the region
    pub figures: Option<RegionFigures>,
    /// Rendered entry
    pub text: String,
    /// Rendered warning for degenerate regions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Capacity report over one or more regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    pub title: String,
    pub lines: Vec<RegionLine>,
}

impl RegionReport {
    /// Plain-text rendering, one entry per block
    pub fn render(&self) -> String {
        let mut out = vec![self.title.clone()];
        for line in &self.lines {
            out.push(line.text.clone());
            if let Some(warning) = &line.warning {
                out.push(warning.clone());
            }
        }
        out.join("\n")
    }
}

impl std::fmt::Display for RegionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// =============================================================================
// Assembler
// =============================================================================

/// Presentation settings of the webhook message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadStyle {
    pub sender_name: String,
    pub footer: String,
    pub color: u32,
}

/// Assembles reports from live metrics and host data
#[derive(Clone)]
pub struct ReportAssembler {
    rates: RateMetrics,
    regions: Arc<dyn RegionProvider>,
    host: Option<Arc<dyn HostStatus>>,
    uptime: Arc<dyn UptimeProvider>,
    formatter: Arc<dyn MessageFormatter>,
    resolver: RegionResolver,
    style: PayloadStyle,
}

impl ReportAssembler {
    /// Create an assembler over the collaborators held by `ctx`
    pub fn new(ctx: &AppContext) -> Self {
        let config = ctx.config().get();
        let webhook = ctx.config().webhook();

        Self {
            rates: ctx.rates(),
            regions: ctx.regions(),
            host: ctx.host(),
            uptime: ctx.uptime(),
            formatter: ctx.formatter(),
            resolver: RegionResolver::new(&config.region_aliases),
            style: PayloadStyle {
                sender_name: webhook.sender_name,
                footer: webhook.footer,
                color: webhook.embed_color,
            },
        }
    }

    pub fn rates(&self) -> &RateMetrics {
        &self.rates
    }

    pub fn resolver(&self) -> &RegionResolver {
        &self.resolver
    }

    /// Build the entry for one region
    pub fn region_line(&self, snapshot: &RegionSnapshot, debug: bool) -> RegionLine {
        let fmt = self.formatter.as_ref();
        let label = display_name(&snapshot.id, fmt);

        let Some(occupancy) = snapshot.occupancy else {
            return RegionLine {
                region_id: snapshot.id.clone(),
                label,
                figures: None,
                text: fmt.get("capacity.error.unavailable"),
                warning: None,
            };
        };

        let result = occupancy.evaluate();
        let heading = fmt.format("capacity.region", &[&label]);
        let body = if debug {
            fmt.format(
                "capacity.info.debug",
                &[
                    &result.occupancy_count,
                    &result.ceiling,
                    &result.nominal_capacity,
                    &result.area_count,
                    &AREA_CONSTANT,
                ],
            )
        } else {
            fmt.format("capacity.info", &[&result.occupancy_count, &result.ceiling])
        };

        RegionLine {
            region_id: snapshot.id.clone(),
            label,
            figures: Some(RegionFigures {
                occupancy_count: result.occupancy_count,
                ceiling: result.ceiling,
                degenerate: result.degenerate,
                over_capacity: result.is_over_capacity(),
                debug: debug.then_some(CapacityDebug {
                    nominal_capacity: result.nominal_capacity,
                    area_count: result.area_count,
                    area_constant: AREA_CONSTANT,
                }),
            }),
            text: format!("{}\n{}", heading, body),
            warning: result
                .degenerate
                .then(|| fmt.get("capacity.warning.zero_area")),
        }
    }

    /// Report over every live region, in host order
    pub fn build_all_regions(&self, debug: bool) -> RegionReport {
        let lines = self
            .regions
            .regions()
            .iter()
            .map(|snapshot| self.region_line(snapshot, debug))
            .collect();

        RegionReport {
            title: self.formatter.get("capacity.title.all"),
            lines,
        }
    }

    /// Report over the single region named by `input`.
    ///
    /// Fails with [`Error::RegionNotFound`](crate::Error::RegionNotFound)
    /// when `input` does not name a live region.
    pub fn build_single_region(&self, input: &str, debug: bool) -> Result<RegionReport> {
        let snapshot = self.resolver.resolve(input, self.regions.as_ref())?;
        let line = self.region_line(&snapshot, debug);

        Ok(RegionReport {
            title: self
                .formatter
                .format("capacity.title.single", &[&line.label]),
            lines: vec![line],
        })
    }

    /// Region names accepted by [`build_single_region`](Self::build_single_region)
    pub fn region_suggestions(&self) -> Vec<String> {
        self.resolver.suggestions(self.regions.as_ref())
    }

    /// Rendered rate, e.g. `TPS: 19.87`
    pub fn render_rate(&self) -> String {
        let rate = format!("{:.2}", self.rates.rate());
        self.formatter.format("tps.result", &[&rate])
    }

    /// Rendered mean cycle duration, e.g. `MSPT: 48.12 ms`
    pub fn render_mean_cycle(&self) -> String {
        let mean = format!("{:.2}", self.rates.mean_cycle_millis());
        self.formatter.format("mspt.result", &[&mean])
    }

    /// Rendered uptime sentence
    pub fn render_uptime(&self) -> String {
        let uptime = Uptime::from_duration(self.uptime.uptime()).render(self.formatter.as_ref());
        self.formatter.format("uptime.result", &[&uptime])
    }

    /// Assemble a health report from already-collected inputs
    pub fn assemble_health_report(
        uptime: Duration,
        rates: RateSnapshot,
        host: Option<HostOccupancy>,
        regions: Vec<RegionCapacity>,
    ) -> HealthReport {
        HealthReport {
            uptime: Uptime::from_duration(uptime),
            rates,
            host,
            regions,
            generated_at: Utc::now(),
        }
    }

    /// Collect live inputs and assemble a health report.
    ///
    /// Regions without data are skipped and a missing host status drops the
    /// occupancy figures; neither fails the report.
    pub fn build_health_report(&self) -> HealthReport {
        let regions: Vec<RegionCapacity> = self
            .regions
            .regions()
            .into_iter()
            .filter_map(|snapshot| {
                let occupancy = snapshot.occupancy?;
                Some(RegionCapacity {
                    label: display_name(&snapshot.id, self.formatter.as_ref()),
                    capacity: occupancy.evaluate(),
                })
            })
            .collect();

        let host = self.host.as_ref().and_then(|h| h.occupancy());
        if host.is_none() {
            debug!("Host occupancy unavailable, omitting from report");
        }

        Self::assemble_health_report(self.uptime.uptime(), self.rates.snapshot(), host, regions)
    }

    /// Render `report` as a webhook message
    pub fn render_payload(&self, report: &HealthReport) -> WebhookPayload {
        let fmt = self.formatter.as_ref();
        let mut fields = Vec::with_capacity(4);

        if let Some(host) = report.host {
            fields.push(EmbedField::inline(
                fmt.get("webhook.players.title"),
                fmt.format("webhook.players.value", &[&host.current, &host.max]),
            ));
        }

        let rate = format!("{:.2}", report.rates.rate);
        let mean = format!("{:.2}", report.rates.mean_cycle_millis);
        fields.push(EmbedField::inline(
            fmt.get("webhook.performance.title"),
            fmt.format("webhook.performance.value", &[&rate, &mean]),
        ));

        if !report.regions.is_empty() {
            let value = report
                .regions
                .iter()
                .map(|region| capacity_summary(fmt, &region.label, &region.capacity))
                .collect::<Vec<_>>()
                .join("\n");
            fields.push(EmbedField::inline(fmt.get("webhook.capacity.title"), value));
        }

        fields.push(EmbedField::inline(
            fmt.get("webhook.uptime.title"),
            report.uptime.render(fmt),
        ));

        WebhookPayload {
            username: self.style.sender_name.clone(),
            embeds: vec![Embed {
                title: fmt.get("webhook.title"),
                description: fmt.get("webhook.description"),
                color: self.style.color,
                fields,
                footer: EmbedFooter {
                    text: self.style.footer.clone(),
                },
                timestamp: iso_timestamp(&report.generated_at),
            }],
        }
    }

    /// Build a fresh webhook message from live data
    pub fn build_payload(&self) -> WebhookPayload {
        self.render_payload(&self.build_health_report())
    }
}

fn capacity_summary(fmt: &dyn MessageFormatter, label: &str, capacity: &CapacityResult) -> String {
    let key = if capacity.degenerate {
        "webhook.capacity.value.zero_area"
    } else {
        "webhook.capacity.value"
    };
    fmt.format(key, &[&label, &capacity.occupancy_count, &capacity.ceiling])
}

impl std::fmt::Debug for ReportAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAssembler")
            .field("rates", &self.rates)
            .field("has_host_status", &self.host.is_some())
            .field("style", &self.style)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SharedHostStatus, StaticRegionProvider};
    use crate::capacity::RegionOccupancy;
    use crate::config::MonitorConfig;
    use crate::domain::UptimeProvider;
    use crate::error::Error;
    use assert_matches::assert_matches;

    struct FixedUptime(Duration);

    impl UptimeProvider for FixedUptime {
        fn uptime(&self) -> Duration {
            self.0
        }
    }

    fn regions() -> Vec<RegionSnapshot> {
        vec![
            RegionSnapshot::new(
                RegionId::with_default_namespace("overworld"),
                RegionOccupancy::new(5, 289, 70),
            ),
            RegionSnapshot::new(
                RegionId::with_default_namespace("the_nether"),
                RegionOccupancy::new(10, 0, 70),
            ),
            RegionSnapshot::unavailable(RegionId::with_default_namespace("the_end")),
        ]
    }

    fn assembler(host: Option<SharedHostStatus>) -> ReportAssembler {
        let mut builder = AppContext::builder(
            MonitorConfig::default().validate(),
            Arc::new(StaticRegionProvider::new(regions())),
        )
        .uptime(Arc::new(FixedUptime(Duration::from_secs(90_061))));
        if let Some(host) = host {
            builder = builder.host(Arc::new(host));
        }
        ReportAssembler::new(&builder.build())
    }

    #[test]
    fn test_all_regions_keep_host_order() {
        let report = assembler(None).build_all_regions(false);

        assert_eq!(report.title, "Mob cap of all dimensions");
        let labels: Vec<_> = report.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["Overworld", "Nether", "End"]);
    }

    #[test]
    fn test_basic_line() {
        let report = assembler(None).build_all_regions(false);
        let overworld = &report.lines[0];

        let figures = overworld.figures.unwrap();
        assert_eq!(figures.occupancy_count, 5);
        assert_eq!(figures.ceiling, 70);
        assert!(figures.debug.is_none());
        assert_eq!(overworld.text, "[Overworld]\n  5/70");
        assert!(overworld.warning.is_none());
    }

    #[test]
    fn test_degenerate_line_has_warning() {
        let report = assembler(None).build_all_regions(false);
        let nether = &report.lines[1];

        let figures = nether.figures.unwrap();
        assert_eq!(figures.ceiling, 0);
        assert!(figures.degenerate);
        assert!(!figures.over_capacity);
        assert!(nether.warning.as_deref().unwrap().contains("Warning"));
        assert!(report.render().contains(nether.warning.as_deref().unwrap()));
    }

    #[test]
    fn test_unavailable_line() {
        let report = assembler(None).build_all_regions(false);
        let end = &report.lines[2];
        assert!(end.figures.is_none());
        assert_eq!(end.text, "  Spawn information is not available");
    }

    #[test]
    fn test_debug_line() {
        let report = assembler(None).build_all_regions(true);
        let overworld = &report.lines[0];

        assert_eq!(
            overworld.figures.unwrap().debug,
            Some(CapacityDebug {
                nominal_capacity: 70,
                area_count: 289,
                area_constant: 289
            })
        );
        assert!(overworld.text.contains("base capacity: 70"));
        assert!(overworld.text.contains("max spawn chunks: 289"));
    }

    #[test]
    fn test_single_region() {
        let report = assembler(None).build_single_region("n", false).unwrap();
        assert_eq!(report.title, "Mob cap of Nether");
        assert_eq!(report.lines.len(), 1);
    }

    #[test]
    fn test_single_region_not_found() {
        assert_matches!(
            assembler(None).build_single_region("mars", false),
            Err(Error::RegionNotFound(name)) if name == "mars"
        );
    }

    #[test]
    fn test_health_report_skips_unavailable_regions() {
        let report = assembler(None).build_health_report();
        assert_eq!(report.regions.len(), 2);
        assert!(report.host.is_none());
        assert_eq!(report.rates.rate, 20.0);
        assert_eq!(report.uptime.days, 1);
    }

    #[test]
    fn test_payload_without_host_omits_players() {
        let payload = assembler(None).build_payload();
        let embed = payload.embed().unwrap();

        let names: Vec<_> = embed.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Performance", "Mob Cap", "Uptime"]);
        assert_eq!(payload.username, "ServerUtils");
        assert_eq!(embed.footer.text, "serverutils");
        assert_eq!(embed.color, 5_814_783);
        assert!(embed.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_payload_with_host() {
        let host = SharedHostStatus::new();
        host.set(3, 20);
        let payload = assembler(Some(host)).build_payload();

        assert_eq!(payload.field("Players").unwrap().value, "3 / 20");
        assert_eq!(
            payload.field("Performance").unwrap().value,
            "TPS: `20.00`\nMSPT: `50.00 ms`"
        );
        assert_eq!(
            payload.field("Mob Cap").unwrap().value,
            "Overworld: 5/70\nNether: 10/0 (no spawnable chunks)"
        );
        assert_eq!(payload.field("Uptime").unwrap().value, "1d 1h 1m 1s");
        assert!(payload.field("Uptime").unwrap().inline);
    }

    #[test]
    fn test_render_helpers() {
        let assembler = assembler(None);
        assert_eq!(assembler.render_rate(), "TPS: 20.00");
        assert_eq!(assembler.render_mean_cycle(), "MSPT: 50.00 ms");
        assert_eq!(assembler.render_uptime(), "Server uptime: 1d 1h 1m 1s");
    }
}
