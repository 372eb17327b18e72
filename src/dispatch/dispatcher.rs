//! Scheduled Dispatcher
//!
//! Owns the single scheduled delivery job. `initialize` and `shutdown` are
//! serialized by one lock, so at most one job exists at any time.
//!
//! # State Machine
//!
//! ```text
//!            initialize                 job registered
//! Stopped ───────────────▶ Starting ───────────────────▶ Running
//!    ▲                        │ bad schedule / sink          │
//!    └────────────────────────┘                              │ shutdown / initialize
//!    ▲                                                       ▼
//!    └─────────────────────────────────────────────── StopRequested
//! ```
//!
//! A schedule with no future firing is refused at registration. A job whose
//! schedule runs out later (a bounded year list) retires itself and leaves
//! the dispatcher `Stopped`.
//!
//! Each firing spawns its own delivery task. Shutdown cancels the pending
//! trigger and returns without waiting for deliveries already in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::WebhookSink;
use crate::context::AppContext;
use crate::domain::ReportSink;
use crate::error::{Error, Result};
use crate::report::ReportAssembler;

use super::cron::{has_min_fields, CronSchedule, DEFAULT_CRON_EXPRESSION};

// =============================================================================
// State
// =============================================================================

/// Lifecycle phase of the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DispatcherPhase {
    /// No job registered
    #[default]
    Stopped,
    /// Validating the schedule and building the sink
    Starting,
    /// Job registered and waiting for its next firing
    Running,
    /// Cancellation requested; held while `shutdown` tears the job down
    StopRequested,
}

impl std::fmt::Display for DispatcherPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatcherPhase::Stopped => write!(f, "Stopped"),
            DispatcherPhase::Starting => write!(f, "Starting"),
            DispatcherPhase::Running => write!(f, "Running"),
            DispatcherPhase::StopRequested => write!(f, "StopRequested"),
        }
    }
}

/// Observable dispatcher state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    pub phase: DispatcherPhase,
    /// `true` iff a job is registered
    pub running: bool,
    /// Expression of the registered (or last attempted) schedule
    pub schedule_expression: Option<String>,
    /// Why the last `initialize` did not reach `Running`
    pub last_error: Option<String>,
    /// Identifier of the registered job
    pub job_id: Option<Uuid>,
    /// Sink description (never contains secrets)
    pub sink: Option<String>,
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounts {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Everything one delivery needs
#[derive(Clone)]
struct Delivery {
    assembler: ReportAssembler,
    sink: Arc<dyn ReportSink>,
    stats: Arc<DeliveryStats>,
}

impl Delivery {
    async fn run(&self) -> Result<()> {
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);
        let payload = self.assembler.build_payload();

        match self.sink.send(&payload).await {
            Ok(()) => {
                self.stats.successes.fetch_add(1, Ordering::Relaxed);
                info!("Health report delivered to {}", self.sink.describe());
                Ok(())
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

struct Job {
    id: Uuid,
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    phase: DispatcherPhase,
    job: Option<Job>,
    schedule: Option<String>,
    last_error: Option<String>,
    delivery: Option<Delivery>,
}

impl Inner {
    /// Drop job `id` if it is still the registered one
    fn retire(&mut self, id: Uuid, reason: &str) {
        if self.job.as_ref().map(|job| job.id) != Some(id) {
            return;
        }
        self.job = None;
        self.delivery = None;
        self.last_error = Some(reason.to_string());
        self.phase = DispatcherPhase::Stopped;
    }
}

/// Scheduled health report dispatcher
pub struct Dispatcher {
    inner: Arc<Mutex<Inner>>,
    stats: Arc<DeliveryStats>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    /// (Re)start scheduled delivery to the webhook configured in `ctx`.
    ///
    /// Never fails: problems are logged, recorded in
    /// [`ScheduleState::last_error`] and leave the dispatcher `Stopped`.
    pub fn initialize(&self, ctx: &AppContext) -> ScheduleState {
        self.start(ctx, |ctx| {
            let sink = WebhookSink::new(&ctx.config().webhook())?;
            Ok(Arc::new(sink) as Arc<dyn ReportSink>)
        })
    }

    /// Like [`initialize`](Self::initialize) but delivering to `sink`
    pub fn initialize_with_sink(&self, ctx: &AppContext, sink: Arc<dyn ReportSink>) -> ScheduleState {
        self.start(ctx, move |_| Ok(sink))
    }

    fn start<F>(&self, ctx: &AppContext, make_sink: F) -> ScheduleState
    where
        F: FnOnce(&AppContext) -> Result<Arc<dyn ReportSink>>,
    {
        let mut inner = self.inner.lock();

        if inner.phase != DispatcherPhase::Stopped {
            info!("Dispatcher already running, restarting");
            Self::stop_locked(&mut inner);
        }
        inner.last_error = None;

        let settings = ctx.config().webhook();
        if !settings.is_deliverable() {
            info!("Webhook delivery is disabled, dispatcher not started");
            inner.schedule = None;
            return Self::state_locked(&inner);
        }

        inner.phase = DispatcherPhase::Starting;

        let mut expression = settings.cron_expression.clone();
        if !has_min_fields(&expression) {
            warn!(
                "Schedule '{}' is incomplete, using '{}'",
                expression, DEFAULT_CRON_EXPRESSION
            );
            expression = DEFAULT_CRON_EXPRESSION.to_string();
        }
        inner.schedule = Some(expression.clone());

        let registered = CronSchedule::parse(&expression).and_then(|schedule| {
            if schedule.next_after(&Local::now()).is_none() {
                return Err(Error::invalid_schedule(&expression, "the schedule will never fire"));
            }
            let runtime = ctx
                .runtime()
                .ok_or_else(|| Error::Internal("no async runtime available".to_string()))?;
            let sink = make_sink(ctx)?;
            Ok((schedule, runtime, sink))
        });

        let (schedule, runtime, sink) = match registered {
            Ok(parts) => parts,
            Err(e) => {
                error!("Failed to register webhook schedule: {}", e);
                inner.last_error = Some(e.to_string());
                inner.phase = DispatcherPhase::Stopped;
                return Self::state_locked(&inner);
            }
        };

        let delivery = Delivery {
            assembler: ReportAssembler::new(ctx),
            sink,
            stats: Arc::clone(&self.stats),
        };

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_schedule(
            id,
            schedule,
            delivery.clone(),
            cancel.clone(),
            Arc::downgrade(&self.inner),
        ));

        info!(
            job_id = %id,
            "Webhook schedule '{}' registered, delivering to {}",
            expression,
            delivery.sink.describe()
        );

        inner.job = Some(Job {
            id,
            cancel,
            _handle: handle,
        });
        inner.delivery = Some(delivery);
        inner.phase = DispatcherPhase::Running;

        Self::state_locked(&inner)
    }

    /// Cancel the scheduled job. No-op when already stopped.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if inner.phase == DispatcherPhase::Stopped {
            debug!("Dispatcher already stopped");
            return;
        }
        Self::stop_locked(&mut inner);
    }

    fn stop_locked(inner: &mut Inner) {
        inner.phase = DispatcherPhase::StopRequested;

        if let Some(job) = inner.job.take() {
            job.cancel.cancel();
            info!(job_id = %job.id, "Webhook schedule cancelled");
        }

        inner.delivery = None;
        inner.phase = DispatcherPhase::Stopped;
    }

    /// Current state
    pub fn state(&self) -> ScheduleState {
        Self::state_locked(&self.inner.lock())
    }

    fn state_locked(inner: &Inner) -> ScheduleState {
        ScheduleState {
            phase: inner.phase,
            running: inner.phase == DispatcherPhase::Running,
            schedule_expression: inner.schedule.clone(),
            last_error: inner.last_error.clone(),
            job_id: inner.job.as_ref().map(|job| job.id),
            sink: inner.delivery.as_ref().map(|d| d.sink.describe()),
        }
    }

    /// Delivery counters since construction
    pub fn stats(&self) -> DeliveryCounts {
        self.stats.snapshot()
    }

    /// Build and send one report now, outside the schedule.
    ///
    /// Fails with [`Error::Config`] when no delivery is registered, or with
    /// the delivery error.
    #[instrument(skip(self))]
    pub async fn deliver_now(&self) -> Result<()> {
        let delivery = self
            .inner
            .lock()
            .delivery
            .clone()
            .ok_or_else(|| Error::Config("webhook delivery is not running".to_string()))?;

        delivery.run().await.map_err(|e| {
            error!("Manual webhook delivery failed: {}", e);
            e
        })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(job) = self.inner.lock().job.take() {
            job.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Schedule Loop
// =============================================================================

#[instrument(skip(schedule, delivery, cancel, owner), fields(schedule = %schedule))]
async fn run_schedule(
    job_id: Uuid,
    schedule: CronSchedule,
    delivery: Delivery,
    cancel: CancellationToken,
    owner: Weak<Mutex<Inner>>,
) {
    let mut last_fired = None;

    loop {
        let now = Local::now();
        // Never fire the same instant twice if the timer wakes early
        let base = match last_fired {
            Some(fired) if fired > now => fired,
            _ => now,
        };

        let Some(next) = schedule.next_after(&base) else {
            error!("Schedule has no future firing, stopping job");
            if let Some(inner) = owner.upgrade() {
                inner.lock().retire(job_id, "the schedule has no future firing");
            }
            break;
        };

        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        debug!("Next webhook delivery at {}", next);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Schedule loop cancelled");
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        last_fired = Some(next);

        let delivery = delivery.clone();
        tokio::spawn(async move {
            if let Err(e) = delivery.run().await {
                error!("Scheduled webhook delivery failed: {}", e);
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
