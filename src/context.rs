//! Application Context
//!
//! Everything a component needs, passed explicitly instead of living in
//! process-wide statics. Reloading configuration builds a new context that
//! shares the live sampling window and host collaborators with the old one.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::adapters::ProcessClock;
use crate::config::{MonitorConfig, ValidatedConfig};
use crate::domain::{HostStatus, MessageFormatter, RegionProvider, UptimeProvider};
use crate::i18n::MessageCatalog;
use crate::report::ReportAssembler;
use crate::sampling::{CycleTimer, RateMetrics, SampleWindow};

/// Shared application state
#[derive(Clone)]
pub struct AppContext {
    config: Arc<ValidatedConfig>,
    formatter: Arc<dyn MessageFormatter>,
    /// Formatter was injected rather than built from the config
    custom_formatter: bool,
    window: Arc<SampleWindow>,
    regions: Arc<dyn RegionProvider>,
    host: Option<Arc<dyn HostStatus>>,
    uptime: Arc<dyn UptimeProvider>,
    runtime: Option<Handle>,
}

impl AppContext {
    /// Start building a context around `config` and the host's regions
    pub fn builder(config: ValidatedConfig, regions: Arc<dyn RegionProvider>) -> AppContextBuilder {
        AppContextBuilder {
            config,
            regions,
            formatter: None,
            window: None,
            host: None,
            uptime: None,
            runtime: None,
        }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn formatter(&self) -> Arc<dyn MessageFormatter> {
        Arc::clone(&self.formatter)
    }

    pub fn window(&self) -> Arc<SampleWindow> {
        Arc::clone(&self.window)
    }

    pub fn regions(&self) -> Arc<dyn RegionProvider> {
        Arc::clone(&self.regions)
    }

    pub fn host(&self) -> Option<Arc<dyn HostStatus>> {
        self.host.clone()
    }

    pub fn uptime(&self) -> Arc<dyn UptimeProvider> {
        Arc::clone(&self.uptime)
    }

    /// Runtime that background jobs are spawned on
    pub fn runtime(&self) -> Option<Handle> {
        self.runtime.clone()
    }

    /// Rate figures over the shared window
    pub fn rates(&self) -> RateMetrics {
        RateMetrics::new(self.window(), self.config.get().nominal_rate)
    }

    /// Timer feeding the shared window
    pub fn timer(&self) -> CycleTimer {
        CycleTimer::new(self.window())
    }

    pub fn assembler(&self) -> ReportAssembler {
        ReportAssembler::new(self)
    }

    /// Build a context for `config`, keeping the live window and host
    /// collaborators.
    ///
    /// The window keeps its size until restart. Callers re-run
    /// [`Dispatcher::initialize`](crate::dispatch::Dispatcher::initialize)
    /// with the returned context.
    pub fn reload(&self, config: MonitorConfig) -> AppContext {
        let config = config.validate();

        if config.get().sample_window_size != self.window.capacity() {
            warn!(
                "sample_window_size changed to {}, keeping {} until restart",
                config.get().sample_window_size,
                self.window.capacity()
            );
        }

        let formatter = if self.custom_formatter {
            Arc::clone(&self.formatter)
        } else {
            catalog_for(&config)
        };

        info!(
            "Configuration reloaded ({} corrections)",
            config.corrections().len()
        );

        AppContext {
            config: Arc::new(config),
            formatter,
            custom_formatter: self.custom_formatter,
            window: Arc::clone(&self.window),
            regions: Arc::clone(&self.regions),
            host: self.host.clone(),
            uptime: Arc::clone(&self.uptime),
            runtime: self.runtime.clone(),
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("locale", &self.config.get().locale)
            .field("window", &self.window)
            .field("has_host_status", &self.host.is_some())
            .field("has_runtime", &self.runtime.is_some())
            .finish()
    }
}

fn catalog_for(config: &ValidatedConfig) -> Arc<dyn MessageFormatter> {
    let config = config.get();
    Arc::new(MessageCatalog::load(&config.locale, config.lang_dir.as_deref()))
}

/// Nominal cycle duration for `rate` cycles per second
fn nominal_cycle(rate: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(rate.max(1)))
}

/// Builder for [`AppContext`]
pub struct AppContextBuilder {
    config: ValidatedConfig,
    regions: Arc<dyn RegionProvider>,
    formatter: Option<Arc<dyn MessageFormatter>>,
    window: Option<Arc<SampleWindow>>,
    host: Option<Arc<dyn HostStatus>>,
    uptime: Option<Arc<dyn UptimeProvider>>,
    runtime: Option<Handle>,
}

impl AppContextBuilder {
    /// Use `formatter` instead of the configured message catalog
    pub fn formatter(mut self, formatter: Arc<dyn MessageFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Share an existing sample window
    pub fn window(mut self, window: Arc<SampleWindow>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn host(mut self, host: Arc<dyn HostStatus>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn uptime(mut self, uptime: Arc<dyn UptimeProvider>) -> Self {
        self.uptime = Some(uptime);
        self
    }

    /// Spawn background jobs on `runtime` (defaults to the current one)
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> AppContext {
        let settings = self.config.get();
        let custom_formatter = self.formatter.is_some();

        let formatter = self
            .formatter
            .unwrap_or_else(|| catalog_for(&self.config));
        let window = self.window.unwrap_or_else(|| {
            Arc::new(SampleWindow::new(
                settings.sample_window_size,
                nominal_cycle(settings.nominal_rate),
            ))
        });
        let uptime = self
            .uptime
            .unwrap_or_else(|| Arc::new(ProcessClock::new()));
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        AppContext {
            config: Arc::new(self.config),
            formatter,
            custom_formatter,
            window,
            regions: self.regions,
            host: self.host,
            uptime,
            runtime,
        }
    }
}
