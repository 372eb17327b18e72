//! tickwatch agent
//!
//! Runs a paced cycle loop, samples its cycle durations, exposes the derived
//! figures on `/metrics`, and delivers the scheduled webhook health report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         tickwatch agent                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Cycle Loop  │───▶│   Sample     │───▶│  Dispatcher  │──▶ webhook
//! │  │ (CycleTimer) │    │   Window     │    │   (cron)     │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │                             │                                    │
//! │                             ▼                                    │
//! │                      /metrics, /healthz                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::RwLock;
use prometheus::{Gauge, IntCounterVec, IntGauge};
use serde::Deserialize;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tickwatch::adapters::{SharedHostStatus, StaticRegionProvider};
use tickwatch::capacity::RegionOccupancy;
use tickwatch::dispatch::DeliveryCounts;
use tickwatch::domain::{RegionId, RegionSnapshot};
use tickwatch::error::{Error, Result};
use tickwatch::{AppContext, Dispatcher, MonitorConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// tickwatch - cycle rate sampling and scheduled webhook health reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "TICKWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the webhook destination
    #[arg(long, env = "TICKWATCH_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Override the webhook schedule
    #[arg(long, env = "TICKWATCH_CRON")]
    cron: Option<String>,

    /// Override the message locale
    #[arg(long, env = "TICKWATCH_LOCALE")]
    locale: Option<String>,

    /// Deliver one report right after startup
    #[arg(long, env = "TICKWATCH_DELIVER_ON_START")]
    deliver_on_start: bool,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

/// Host figures the agent reports, read from the `host:` section of the
/// configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostFile {
    host: HostSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostSection {
    players: Option<PlayersEntry>,
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct PlayersEntry {
    current: u32,
    max: u32,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    id: String,
    /// Omitted when the region's data is unavailable
    occupancy: Option<u64>,
    #[serde(default)]
    area: u64,
}

// =============================================================================
// Metrics
// =============================================================================

static READY: AtomicBool = AtomicBool::new(false);

/// Gauges and counters exposed on `/metrics`
#[derive(Clone)]
struct AgentMetrics {
    rate: Gauge,
    mean_cycle: Gauge,
    dispatcher_running: IntGauge,
    deliveries: IntCounterVec,
}

impl AgentMetrics {
    fn register() -> Result<Self> {
        let internal = |e: prometheus::Error| Error::Internal(format!("Failed to register metric: {}", e));

        Ok(Self {
            rate: prometheus::register_gauge!(
                "tickwatch_cycle_rate",
                "Cycles per second, capped at the nominal rate"
            )
            .map_err(internal)?,
            mean_cycle: prometheus::register_gauge!(
                "tickwatch_mean_cycle_milliseconds",
                "Mean cycle duration over the sample window"
            )
            .map_err(internal)?,
            dispatcher_running: prometheus::register_int_gauge!(
                "tickwatch_dispatcher_running",
                "1 while the webhook schedule is registered"
            )
            .map_err(internal)?,
            deliveries: prometheus::register_int_counter_vec!(
                "tickwatch_webhook_deliveries_total",
                "Webhook deliveries since start",
                &["outcome"]
            )
            .map_err(internal)?,
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting tickwatch agent");

    let validated = load_config(&args)?.validate();
    let regions = Arc::new(StaticRegionProvider::default());
    let host = Arc::new(SharedHostStatus::new());
    if let Some(path) = &args.config {
        apply_host_file(path, validated.get().nominal_capacity, &regions, &host);
    }

    for correction in validated.corrections() {
        info!("  Config correction: {}", correction);
    }
    info!("  Locale: {}", validated.get().locale);
    info!("  Nominal rate: {}", validated.get().nominal_rate);
    info!("  Sample window: {}", validated.get().sample_window_size);

    let ctx = AppContext::builder(validated, regions.clone())
        .host(host.clone())
        .build();
    let ctx = Arc::new(RwLock::new(ctx));
    let dispatcher = Arc::new(Dispatcher::new());

    let state = dispatcher.initialize(&ctx.read());
    info!("Dispatcher {}", state.phase);

    if args.deliver_on_start {
        if let Err(e) = dispatcher.deliver_now().await {
            warn!("Startup delivery failed: {}", e);
        }
    }

    // Cycle loop
    let cycle_ctx = ctx.read().clone();
    tokio::spawn(async move {
        run_cycle_loop(cycle_ctx).await;
    });

    // Metrics refresher
    let metrics = AgentMetrics::register()?;
    let refresh_ctx = Arc::clone(&ctx);
    let refresh_dispatcher = Arc::clone(&dispatcher);
    tokio::spawn(async move {
        refresh_metrics(metrics, refresh_ctx, refresh_dispatcher).await;
    });

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    });

    READY.store(true, Ordering::Relaxed);

    wait_for_shutdown(&args, &ctx, &dispatcher, &regions, &host).await;

    dispatcher.shutdown();
    info!("tickwatch shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(url) = &args.webhook_url {
        config.webhook_url = url.clone();
        config.enable_send_webhook = true;
    }
    if let Some(cron) = &args.cron {
        config.webhook_cron_expression = cron.clone();
    }
    if let Some(locale) = &args.locale {
        config.locale = locale.clone();
    }

    Ok(config)
}

fn apply_host_file(
    path: &Path,
    nominal_capacity: u32,
    regions: &StaticRegionProvider,
    host: &SharedHostStatus,
) {
    let file: HostFile = match std::fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|yaml| serde_yaml::from_str(&yaml).map_err(Error::from))
    {
        Ok(file) => file,
        Err(e) => {
            warn!("Ignoring host section of {}: {}", path.display(), e);
            return;
        }
    };

    match file.host.players {
        Some(players) => host.set(players.current, players.max),
        None => host.clear(),
    }

    let snapshots = file
        .host
        .regions
        .into_iter()
        .filter_map(|entry| {
            let Some(id) = RegionId::parse(&entry.id) else {
                warn!("Ignoring region with invalid id '{}'", entry.id);
                return None;
            };
            Some(match entry.occupancy {
                Some(occupancy) => RegionSnapshot::new(
                    id,
                    RegionOccupancy::new(occupancy, entry.area, nominal_capacity),
                ),
                None => RegionSnapshot::unavailable(id),
            })
        })
        .collect();

    regions.update(snapshots);
}

// =============================================================================
// Cycle Loop
// =============================================================================

async fn run_cycle_loop(ctx: AppContext) {
    let timer = ctx.timer();
    let period = Duration::from_nanos(1_000_000_000 / u64::from(ctx.config().get().nominal_rate.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Cycle loop running every {:?}", period);

    interval.tick().await;
    let mut start = timer.start();
    loop {
        interval.tick().await;
        timer.finish(start);
        start = timer.start();
    }
}

async fn refresh_metrics(
    metrics: AgentMetrics,
    ctx: Arc<RwLock<AppContext>>,
    dispatcher: Arc<Dispatcher>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut reported = DeliveryCounts::default();
    loop {
        interval.tick().await;

        let snapshot = ctx.read().rates().snapshot();
        metrics.rate.set(snapshot.rate);
        metrics.mean_cycle.set(snapshot.mean_cycle_millis);

        metrics
            .dispatcher_running
            .set(i64::from(dispatcher.state().running));
        let counts = dispatcher.stats();
        advance_delivery_counters(&metrics.deliveries, &reported, &counts);
        reported = counts;
    }
}

/// Bring the outcome counters from `reported` up to `current`
fn advance_delivery_counters(
    deliveries: &IntCounterVec,
    reported: &DeliveryCounts,
    current: &DeliveryCounts,
) {
    deliveries
        .with_label_values(&["success"])
        .inc_by(current.successes.saturating_sub(reported.successes));
    deliveries
        .with_label_values(&["failure"])
        .inc_by(current.failures.saturating_sub(reported.failures));
}

// =============================================================================
// Signals
// =============================================================================

#[cfg(unix)]
async fn wait_for_shutdown(
    args: &Args,
    ctx: &RwLock<AppContext>,
    dispatcher: &Dispatcher,
    regions: &StaticRegionProvider,
    host: &SharedHostStatus,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("SIGHUP reload unavailable: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, shutting down");
                return;
            }
            _ = hangup.recv() => {
                reload(args, ctx, dispatcher, regions, host);
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(
    _args: &Args,
    _ctx: &RwLock<AppContext>,
    _dispatcher: &Dispatcher,
    _regions: &StaticRegionProvider,
    _host: &SharedHostStatus,
) {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for interrupt: {}", e);
    }
    info!("Received interrupt, shutting down");
}

fn reload(
    args: &Args,
    ctx: &RwLock<AppContext>,
    dispatcher: &Dispatcher,
    regions: &StaticRegionProvider,
    host: &SharedHostStatus,
) {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Reload failed, keeping current configuration: {}", e);
            return;
        }
    };
    let reloaded = ctx.read().reload(config);
    if let Some(path) = &args.config {
        apply_host_file(
            path,
            reloaded.config().get().nominal_capacity,
            regions,
            host,
        );
    }
    info!("{}", reloaded.formatter().get("config.reload"));
    let state = dispatcher.initialize(&reloaded);
    info!("Dispatcher {}", state.phase);
    *ctx.write() = reloaded;
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// HTTP Servers
// =============================================================================

mod web {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::{Response, StatusCode};

    pub type Body = Full<Bytes>;

    pub fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Body> {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
    }
}

async fn serve<F>(addr: &str, name: &'static str, handler: F) -> Result<()>
where
    F: Fn(&str) -> hyper::Response<web::Body> + Copy + Send + Sync + 'static,
{
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::Request;
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid {} server address: {}", name, e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {} server: {}", name, e)))?;

    info!("{} server listening on {}", name, addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("{} server accept error: {}", name, e)))?;

        let io = TokioIo::new(stream);
        let service = service_fn(move |req: Request<hyper::body::Incoming>| async move {
            Ok::<_, std::convert::Infallible>(handler(req.uri().path()))
        });

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("{} server connection error: {}", name, e);
            }
        });
    }
}

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::StatusCode;

    serve(addr, "Health", |path| match path {
        "/healthz" | "/livez" => web::respond(StatusCode::OK, "ok"),
        "/readyz" if READY.load(Ordering::Relaxed) => web::respond(StatusCode::OK, "ok"),
        "/readyz" => web::respond(StatusCode::SERVICE_UNAVAILABLE, "starting"),
        _ => web::respond(StatusCode::NOT_FOUND, "not found"),
    })
    .await
}

async fn run_metrics_server(addr: &str) -> Result<()> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::StatusCode;
    use prometheus::{Encoder, TextEncoder};

    serve(addr, "Metrics", |path| match path {
        "/metrics" => {
            let encoder = TextEncoder::new();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
                return web::respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }

            let mut response = web::respond(StatusCode::OK, buffer);
            if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        _ => web::respond(StatusCode::NOT_FOUND, "not found"),
    })
    .await
}
