use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Rolling counters updated by the worker loop. Shared across runs of the
/// same worker, so totals accumulate until the process exits.
#[derive(Default, Debug)]
pub struct Telemetry {
    fetches: AtomicU64,
    idle_polls: AtomicU64,
    batches_processed: AtomicU64,
    events_applied: AtomicU64,
    failures: AtomicU64,
}

impl Telemetry {
    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, events: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.events_applied
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn batches_processed(&self) -> u64 {
        self.batches_processed.load(Ordering::Relaxed)
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub fetches: u64,
    pub idle_polls: u64,
    pub batches_processed: u64,
    pub events_applied: u64,
    pub failures: u64,
}

/// Spawns a background task that periodically logs projection throughput until
/// `shutdown` is cancelled. A zero `interval` falls back to
/// [`DEFAULT_METRICS_INTERVAL`].
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    let interval = if interval.is_zero() {
        DEFAULT_METRICS_INTERVAL
    } else {
        interval
    };
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "cursorproj::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    let applied_delta = current
                        .events_applied
                        .saturating_sub(last_snapshot.events_applied);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        applied_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "cursorproj::metrics",
                        throughput = format!("{throughput:.2}"),
                        events_applied = current.events_applied,
                        batches = current.batches_processed,
                        fetches = current.fetches,
                        idle_polls = current.idle_polls,
                        failures = current.failures,
                        "projection metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
