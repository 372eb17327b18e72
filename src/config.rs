//! Monitor Configuration
//!
//! YAML-backed settings plus the validation pass that repairs unusable
//! values instead of failing startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capacity::DEFAULT_NOMINAL_CAPACITY;
use crate::dispatch::cron::{has_min_fields, DEFAULT_CRON_EXPRESSION};
use crate::error::Result;
use crate::i18n::{DEFAULT_LOCALE, SUPPORTED_LOCALES};
use crate::sampling::{DEFAULT_NOMINAL_RATE, DEFAULT_WINDOW_SIZE};

/// Webhook URL prefixes accepted by default
pub const DEFAULT_TRUSTED_PREFIXES: &[&str] = &[
    "https://discord.com/api/webhooks/",
    "https://discordapp.com/api/webhooks/",
];

// =============================================================================
// Raw Configuration
// =============================================================================

/// Monitor configuration as read from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Message catalog locale
    pub locale: String,

    /// Optional directory with `<locale>.json` catalog overrides
    pub lang_dir: Option<PathBuf>,

    /// Enable scheduled webhook delivery
    pub enable_send_webhook: bool,

    /// Webhook destination
    pub webhook_url: String,

    /// Quartz-style schedule (`sec min hour dom month dow [year]`)
    pub webhook_cron_expression: String,

    /// URL prefixes a webhook destination must start with
    pub trusted_url_prefixes: Vec<String>,

    /// Whole-request timeout for webhook delivery, in seconds
    pub request_timeout_secs: u64,

    /// Sender name shown on the webhook message
    pub sender_name: String,

    /// Footer text of the webhook message
    pub footer: String,

    /// Embed accent colour
    pub embed_color: u32,

    /// Number of cycle samples retained
    pub sample_window_size: usize,

    /// Nominal cycles per second
    pub nominal_rate: u32,

    /// Capacity granted per normalised area
    pub nominal_capacity: u32,

    /// Short names accepted when looking up a region (alias -> identifier)
    pub region_aliases: BTreeMap<String, String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            lang_dir: None,
            enable_send_webhook: false,
            webhook_url: String::new(),
            webhook_cron_expression: DEFAULT_CRON_EXPRESSION.to_string(),
            trusted_url_prefixes: DEFAULT_TRUSTED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            request_timeout_secs: 30,
            sender_name: "ServerUtils".to_string(),
            footer: "serverutils".to_string(),
            embed_color: 5_814_783,
            sample_window_size: DEFAULT_WINDOW_SIZE,
            nominal_rate: DEFAULT_NOMINAL_RATE,
            nominal_capacity: DEFAULT_NOMINAL_CAPACITY,
            region_aliases: default_region_aliases(),
        }
    }
}

/// Built-in region aliases
pub fn default_region_aliases() -> BTreeMap<String, String> {
    [
        ("o", "minecraft:overworld"),
        ("overworld", "minecraft:overworld"),
        ("n", "minecraft:the_nether"),
        ("nether", "minecraft:the_nether"),
        ("e", "minecraft:the_end"),
        ("end", "minecraft:the_end"),
    ]
    .into_iter()
    .map(|(alias, id)| (alias.to_string(), id.to_string()))
    .collect()
}

impl MonitorConfig {
    /// Parse configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Whether `url` starts with one of the trusted prefixes
    pub fn is_trusted_url(&self, url: &str) -> bool {
        self.trusted_url_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && url.starts_with(prefix.as_str()))
    }

    /// Repair unusable values, logging each correction at warn level
    pub fn validate(mut self) -> ValidatedConfig {
        let mut corrections = Vec::new();

        if !SUPPORTED_LOCALES.contains(&self.locale.as_str()) {
            corrections.push(ConfigCorrection::LocaleReset {
                from: std::mem::replace(&mut self.locale, DEFAULT_LOCALE.to_string()),
            });
        }

        if self.enable_send_webhook && self.webhook_url.trim().is_empty() {
            self.enable_send_webhook = false;
            corrections.push(ConfigCorrection::WebhookUrlMissing);
        }

        if !self.webhook_url.is_empty() && !self.is_trusted_url(&self.webhook_url) {
            let url = std::mem::take(&mut self.webhook_url);
            self.enable_send_webhook = false;
            corrections.push(ConfigCorrection::UntrustedWebhookUrl { url });
        }

        if !has_min_fields(&self.webhook_cron_expression) {
            corrections.push(ConfigCorrection::CronExpressionReset {
                from: std::mem::replace(
                    &mut self.webhook_cron_expression,
                    DEFAULT_CRON_EXPRESSION.to_string(),
                ),
            });
        }

        if self.sample_window_size == 0 {
            self.sample_window_size = DEFAULT_WINDOW_SIZE;
            corrections.push(ConfigCorrection::WindowSizeReset);
        }

        if self.nominal_rate == 0 {
            self.nominal_rate = DEFAULT_NOMINAL_RATE;
            corrections.push(ConfigCorrection::NominalRateReset);
        }

        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = 30;
            corrections.push(ConfigCorrection::RequestTimeoutReset);
        }

        for correction in &corrections {
            warn!("{}", correction);
        }
        info!(
            "Configuration validated ({} corrections), webhook {}",
            corrections.len(),
            if self.enable_send_webhook {
                "enabled"
            } else {
                "disabled"
            }
        );

        ValidatedConfig {
            config: self,
            corrections,
        }
    }
}

// =============================================================================
// Corrections
// =============================================================================

/// A repair applied during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCorrection {
    LocaleReset { from: String },
    WebhookUrlMissing,
    UntrustedWebhookUrl { url: String },
    CronExpressionReset { from: String },
    WindowSizeReset,
    NominalRateReset,
    RequestTimeoutReset,
}

impl std::fmt::Display for ConfigCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigCorrection::LocaleReset { from } => {
                write!(f, "Invalid locale '{}'. Reset to default: {}", from, DEFAULT_LOCALE)
            }
            ConfigCorrection::WebhookUrlMissing => {
                write!(f, "Webhook is enabled but URL is empty. Disabled webhook sending.")
            }
            // The URL itself carries a token; never log it.
            ConfigCorrection::UntrustedWebhookUrl { .. } => write!(
                f,
                "Webhook URL does not match a trusted prefix. Webhook sending has been disabled."
            ),
            ConfigCorrection::CronExpressionReset { from } => write!(
                f,
                "Invalid cron expression '{}'. Reset to default: {} (daily at midnight)",
                from, DEFAULT_CRON_EXPRESSION
            ),
            ConfigCorrection::WindowSizeReset => write!(
                f,
                "Sample window size must be positive. Reset to default: {}",
                DEFAULT_WINDOW_SIZE
            ),
            ConfigCorrection::NominalRateReset => write!(
                f,
                "Nominal rate must be positive. Reset to default: {}",
                DEFAULT_NOMINAL_RATE
            ),
            ConfigCorrection::RequestTimeoutReset => {
                write!(f, "Request timeout must be positive. Reset to default: 30s")
            }
        }
    }
}

// =============================================================================
// Validated Configuration
// =============================================================================

/// Configuration that passed [`MonitorConfig::validate`]
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    config: MonitorConfig,
    corrections: Vec<ConfigCorrection>,
}

impl ValidatedConfig {
    /// Validated values
    pub fn get(&self) -> &MonitorConfig {
        &self.config
    }

    /// Repairs applied during validation
    pub fn corrections(&self) -> &[ConfigCorrection] {
        &self.corrections
    }

    /// Settings consumed by the dispatcher
    pub fn webhook(&self) -> WebhookSettings {
        WebhookSettings {
            enabled: self.config.enable_send_webhook,
            url: self.config.webhook_url.clone(),
            cron_expression: self.config.webhook_cron_expression.clone(),
            request_timeout: Duration::from_secs(self.config.request_timeout_secs),
            sender_name: self.config.sender_name.clone(),
            footer: self.config.footer.clone(),
            embed_color: self.config.embed_color,
        }
    }
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        MonitorConfig::default().validate()
    }
}

/// Webhook delivery settings
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub url: String,
    pub cron_expression: String,
    pub request_timeout: Duration,
    pub sender_name: String,
    pub footer: String,
    pub embed_color: u32,
}

impl WebhookSettings {
    /// Enabled with a destination set
    pub fn is_deliverable(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
