//! Message Catalog
//!
//! Default [`MessageFormatter`]: flat `{key: template}` JSON catalogs with
//! positional `{N}` placeholders. Unknown keys render as the key itself.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::domain::MessageFormatter;
use crate::error::Result;

/// Locale used when the requested one is unknown or fails to load
pub const DEFAULT_LOCALE: &str = "en_US";

/// Locales with an embedded catalog
pub const SUPPORTED_LOCALES: &[&str] = &["en_US", "ja_JP"];

const EN_US: &str = include_str!("../assets/lang/en_US.json");
const JA_JP: &str = include_str!("../assets/lang/ja_JP.json");

/// Parsed embedded catalogs by locale
static EMBEDDED: Lazy<HashMap<&'static str, HashMap<String, String>>> = Lazy::new(|| {
    [(DEFAULT_LOCALE, EN_US), ("ja_JP", JA_JP)]
        .into_iter()
        .filter_map(|(locale, json)| match serde_json::from_str(json) {
            Ok(messages) => Some((locale, messages)),
            Err(e) => {
                warn!("Embedded catalog {} is invalid: {}", locale, e);
                None
            }
        })
        .collect()
});

/// Key/template catalog for one locale
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    locale: String,
    messages: HashMap<String, String>,
}

impl MessageCatalog {
    /// Parse a catalog from JSON
    pub fn from_json(locale: &str, json: &str) -> Result<Self> {
        let messages: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self {
            locale: locale.to_string(),
            messages,
        })
    }

    /// Embedded catalog for `locale`, falling back to [`DEFAULT_LOCALE`]
    pub fn embedded(locale: &str) -> Self {
        if let Some(messages) = EMBEDDED.get(locale) {
            return Self {
                locale: locale.to_string(),
                messages: messages.clone(),
            };
        }

        warn!("No catalog for locale {}, using {}", locale, DEFAULT_LOCALE);
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            messages: EMBEDDED.get(DEFAULT_LOCALE).cloned().unwrap_or_default(),
        }
    }

    /// Load `<dir>/<locale>.json` when present, otherwise the embedded
    /// catalog. Keys missing from the file are filled from the embedded one.
    pub fn load(locale: &str, dir: Option<&Path>) -> Self {
        let mut catalog = Self::embedded(locale);

        let Some(dir) = dir else {
            return catalog;
        };

        let path = dir.join(format!("{}.json", locale));
        match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<HashMap<String, String>>(&json) {
                Ok(overrides) => {
                    debug!(
                        "Loaded {} message overrides from {}",
                        overrides.len(),
                        path.display()
                    );
                    catalog.messages.extend(overrides);
                }
                Err(e) => warn!("Ignoring catalog {}: {}", path.display(), e),
            },
            Err(e) => debug!("No catalog override at {}: {}", path.display(), e),
        }

        catalog
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn contains(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::embedded(DEFAULT_LOCALE)
    }
}

impl MessageFormatter for MessageCatalog {
    fn format(&self, key: &str, args: &[&dyn Display]) -> String {
        let template = self.messages.get(key).map(String::as_str).unwrap_or(key);
        format_template(template, args)
    }
}

/// Substitute `{N}` placeholders in `template`.
///
/// Placeholders without a matching argument are left untouched.
pub fn format_template(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let index: usize = after[..close].parse().ok()?;
            let arg = args.get(index)?;
            Some((arg.to_string(), close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
