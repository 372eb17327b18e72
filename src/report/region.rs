//! Region lookup and display names

use std::collections::BTreeMap;

use tracing::warn;

use crate::domain::{MessageFormatter, RegionId, RegionProvider, RegionSnapshot};
use crate::error::{Error, Result};

/// Regions with a translated display name (`region.name.<path>`)
const WELL_KNOWN_REGIONS: &[&str] = &["overworld", "the_nether", "the_end"];

/// Display name for `id`.
///
/// Well-known regions use their catalog name, other regions in the default
/// namespace show their path, anything else its full identifier.
pub fn display_name(id: &RegionId, formatter: &dyn MessageFormatter) -> String {
    if id.is_default_namespace() {
        if WELL_KNOWN_REGIONS.contains(&id.path()) {
            return formatter.get(&format!("region.name.{}", id.path()));
        }
        return id.path().to_string();
    }
    id.to_string()
}

/// Maps user-supplied region names to live regions
#[derive(Debug, Clone)]
pub struct RegionResolver {
    /// Lower-cased alias -> identifier
    aliases: BTreeMap<String, RegionId>,
}

impl RegionResolver {
    /// Build a resolver from `alias -> identifier` pairs.
    ///
    /// Pairs whose identifier does not parse are skipped with a warning.
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let aliases = aliases
            .iter()
            .filter_map(|(alias, raw)| match RegionId::parse(raw) {
                Some(id) => Some((alias.to_lowercase(), id)),
                None => {
                    warn!("Ignoring region alias '{}': invalid identifier '{}'", alias, raw);
                    None
                }
            })
            .collect();

        Self { aliases }
    }

    /// Resolve `input` (alias first, then full identifier) against the live
    /// regions of `provider`
    pub fn resolve(&self, input: &str, provider: &dyn RegionProvider) -> Result<RegionSnapshot> {
        let id = self
            .aliases
            .get(&input.to_lowercase())
            .cloned()
            .or_else(|| RegionId::parse(input))
            .ok_or_else(|| Error::RegionNotFound(input.to_string()))?;

        provider
            .region(&id)
            .ok_or_else(|| Error::RegionNotFound(input.to_string()))
    }

    /// Completion candidates: aliases, then live identifiers
    pub fn suggestions(&self, provider: &dyn RegionProvider) -> Vec<String> {
        self.aliases
            .keys()
            .cloned()
            .chain(provider.regions().into_iter().map(|r| r.id.to_string()))
            .collect()
    }
}

impl Default for RegionResolver {
    fn default() -> Self {
        Self::new(&crate::config::default_region_aliases())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticRegionProvider;
    use crate::capacity::RegionOccupancy;
    use crate::i18n::MessageCatalog;
    use assert_matches::assert_matches;

    fn provider() -> StaticRegionProvider {
        StaticRegionProvider::new(vec![
            RegionSnapshot::new(
                RegionId::with_default_namespace("overworld"),
                RegionOccupancy::new(3, 289, 70),
            ),
            RegionSnapshot::new(
                RegionId::with_default_namespace("the_nether"),
                RegionOccupancy::new(0, 0, 70),
            ),
            RegionSnapshot::new(RegionId::new("mymod", "caves"), RegionOccupancy::new(1, 10, 70)),
        ])
    }

    #[test]
    fn test_resolve_alias_case_insensitive() {
        let resolver = RegionResolver::default();
        let region = resolver.resolve("NETHER", &provider()).unwrap();
        assert_eq!(region.id.path(), "the_nether");

        let region = resolver.resolve("o", &provider()).unwrap();
        assert_eq!(region.id.path(), "overworld");
    }

    #[test]
    fn test_resolve_full_identifier() {
        let resolver = RegionResolver::default();
        let region = resolver.resolve("mymod:caves", &provider()).unwrap();
        assert_eq!(region.id.namespace(), "mymod");
    }

    #[test]
    fn test_resolve_unknown() {
        let resolver = RegionResolver::default();
        assert_matches!(
            resolver.resolve("end", &provider()),
            Err(Error::RegionNotFound(name)) if name == "end"
        );
        assert_matches!(
            resolver.resolve("Not Valid!", &provider()),
            Err(Error::RegionNotFound(_))
        );
    }

    #[test]
    fn test_suggestions() {
        let resolver = RegionResolver::default();
        let suggestions = resolver.suggestions(&provider());
        assert!(suggestions.contains(&"o".to_string()));
        assert!(suggestions.contains(&"mymod:caves".to_string()));
        assert_eq!(suggestions.len(), 6 + 3);
    }

    #[test]
    fn test_display_names() {
        let catalog = MessageCatalog::default();
        assert_eq!(
            display_name(&RegionId::with_default_namespace("the_end"), &catalog),
            "End"
        );
        assert_eq!(
            display_name(&RegionId::with_default_namespace("lobby"), &catalog),
            "lobby"
        );
        assert_eq!(
            display_name(&RegionId::new("mymod", "caves"), &catalog),
            "mymod:caves"
        );
    }
}
