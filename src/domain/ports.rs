//! Domain Ports (Port/Adapter Pattern)
//!
//! Abstractions over the host process. The reporting core only talks to the
//! host through these traits; adapters provide the concrete wiring.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Reporting Core                          │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ RegionProvider │ HostStatus │ UptimeProvider        │    │
//! │  │ MessageFormatter │ ReportSink                       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  WebhookSink │ StaticRegionProvider │ ProcessClock │ ...     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capacity::RegionOccupancy;
use crate::error::Result;
use crate::report::WebhookPayload;

/// Namespace assumed for region identifiers written without one
pub const DEFAULT_NAMESPACE: &str = "minecraft";

// =============================================================================
// Value Objects
// =============================================================================

/// Region identifier of the form `namespace:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId {
    namespace: String,
    path: String,
}

impl RegionId {
    /// Create an identifier from its parts
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Identifier in the default namespace
    pub fn with_default_namespace(path: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, path)
    }

    /// Parse `namespace:path` or bare `path`.
    ///
    /// Returns `None` for empty parts or characters outside
    /// `[a-z0-9_.-]` (plus `/` in the path).
    pub fn parse(raw: &str) -> Option<Self> {
        let (namespace, path) = match raw.split_once(':') {
            Some((ns, path)) => (ns, path),
            None => (DEFAULT_NAMESPACE, raw),
        };

        let ns_ok = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-'));
        let path_ok = !path.is_empty()
            && path
                .chars()
                .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-' | '/'));

        if ns_ok && path_ok {
            Some(Self::new(namespace, path))
        } else {
            None
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the identifier lives in [`DEFAULT_NAMESPACE`]
    pub fn is_default_namespace(&self) -> bool {
        self.namespace == DEFAULT_NAMESPACE
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// One region as reported by the host.
///
/// `occupancy` is `None` when the host could not produce counters for the
/// region (e.g. it is still loading).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub id: RegionId,
    pub occupancy: Option<RegionOccupancy>,
}

impl RegionSnapshot {
    pub fn new(id: RegionId, occupancy: RegionOccupancy) -> Self {
        Self {
            id,
            occupancy: Some(occupancy),
        }
    }

    pub fn unavailable(id: RegionId) -> Self {
        Self {
            id,
            occupancy: None,
        }
    }
}

/// Host-wide occupancy (e.g. connected players)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOccupancy {
    pub current: u32,
    pub max: u32,
}

// =============================================================================
// Ports
// =============================================================================

/// Port enumerating the host's regions.
///
/// Regions are returned in the host's own order; consumers must not re-sort.
pub trait RegionProvider: Send + Sync {
    /// Fresh snapshot of every live region
    fn regions(&self) -> Vec<RegionSnapshot>;

    /// Snapshot of a single live region
    fn region(&self, id: &RegionId) -> Option<RegionSnapshot> {
        self.regions().into_iter().find(|r| &r.id == id)
    }
}

/// Port for host-wide status figures. `None` means the host cannot supply
/// them right now.
pub trait HostStatus: Send + Sync {
    fn occupancy(&self) -> Option<HostOccupancy>;
}

/// Port yielding elapsed time since process start
pub trait UptimeProvider: Send + Sync {
    fn uptime(&self) -> Duration;
}

/// Port for rendering human-readable messages by key with positional
/// arguments. The core never inspects catalog contents.
pub trait MessageFormatter: Send + Sync {
    /// Render `key` with `args` substituted for `{0}`, `{1}`, ...
    fn format(&self, key: &str, args: &[&dyn Display]) -> String;

    /// Render `key` without arguments
    fn get(&self, key: &str) -> String {
        self.format(key, &[])
    }
}

/// Port receiving assembled reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one payload. Errors are reported, never retried here.
    async fn send(&self, payload: &WebhookPayload) -> Result<()>;

    /// Short description for logs (must not leak secrets)
    fn describe(&self) -> String;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_id_parse() {
        let id = RegionId::parse("minecraft:the_nether").unwrap();
        assert_eq!(id.namespace(), "minecraft");
        assert_eq!(id.path(), "the_nether");
        assert!(id.is_default_namespace());

        let id = RegionId::parse("overworld").unwrap();
        assert_eq!(id.to_string(), "minecraft:overworld");

        let id = RegionId::parse("mymod:deep/caves").unwrap();
        assert_eq!(id.namespace(), "mymod");
        assert!(!id.is_default_namespace());
    }

    #[test]
    fn test_region_id_parse_rejects_invalid() {
        assert!(RegionId::parse("").is_none());
        assert!(RegionId::parse(":x").is_none());
        assert!(RegionId::parse("ns:").is_none());
        assert!(RegionId::parse("Upper:Case").is_none());
        assert!(RegionId::parse("has space").is_none());
    }

    struct TwoRegions;

    impl RegionProvider for TwoRegions {
        fn regions(&self) -> Vec<RegionSnapshot> {
            vec![
                RegionSnapshot::new(
                    RegionId::with_default_namespace("overworld"),
                    RegionOccupancy::new(1, 289, 70),
                ),
                RegionSnapshot::unavailable(RegionId::with_default_namespace("the_end")),
            ]
        }
    }

    #[test]
    fn test_default_region_lookup() {
        let provider = TwoRegions;
        let found = provider
            .region(&RegionId::with_default_namespace("the_end"))
            .unwrap();
        assert!(found.occupancy.is_none());
        assert!(provider
            .region(&RegionId::with_default_namespace("the_nether"))
            .is_none());
    }
}
