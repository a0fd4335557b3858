use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use cursorproj::{Apply, Cursor, Envelope, MemoryEventLog, RunContext};
use once_cell::sync::Lazy;
use tokio::time::{sleep, Instant};
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn seeded_log(count: usize) -> MemoryEventLog {
    let log = MemoryEventLog::new();
    append_events(&log, 0, count);
    log
}

pub fn append_events(log: &MemoryEventLog, first: usize, count: usize) -> Cursor {
    log.append((first..first + count).map(|n| {
        Envelope::new(
            format!("evt-{n}"),
            "counter.incremented",
            Bytes::from(n.to_string()),
        )
    }))
}

/// Read model plus checkpoint, updated together under one lock the way a
/// database transaction would update both tables.
#[derive(Default)]
pub struct ProjectionState {
    pub rows: BTreeMap<String, u64>,
    pub checkpoint: Option<Cursor>,
    pub apply_calls: usize,
    pub delivered: usize,
    fail_on_call: Option<usize>,
}

#[derive(Clone, Default)]
pub struct RecordingProjection {
    state: Arc<Mutex<ProjectionState>>,
}

impl RecordingProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `call`-th apply (1-based, counted across runs) fail once.
    pub fn fail_on_call(&self, call: usize) {
        self.state.lock().unwrap().fail_on_call = Some(call);
    }

    pub fn checkpoint(&self) -> Option<Cursor> {
        self.state.lock().unwrap().checkpoint.clone()
    }

    pub fn rows(&self) -> BTreeMap<String, u64> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn apply_calls(&self) -> usize {
        self.state.lock().unwrap().apply_calls
    }

    pub fn delivered(&self) -> usize {
        self.state.lock().unwrap().delivered
    }

    pub fn apply_fn(&self) -> impl Apply {
        let state = self.state.clone();
        move |_ctx: RunContext, events: Vec<Envelope>, next: Cursor| {
            let state = state.clone();
            async move { project(&state, &events, next) }
        }
    }
}

fn project(state: &Mutex<ProjectionState>, events: &[Envelope], next: Cursor) -> Result<()> {
    let mut guard = state.lock().unwrap();
    guard.apply_calls += 1;
    if guard.fail_on_call == Some(guard.apply_calls) {
        guard.fail_on_call = None;
        return Err(anyhow!(
            "projection write rejected on call {}",
            guard.apply_calls
        ));
    }

    let mut staged = Vec::with_capacity(events.len());
    for event in events {
        let value = std::str::from_utf8(&event.data)?.parse::<u64>()?;
        staged.push((event.event_id.clone(), value));
    }

    guard.delivered += events.len();
    // Keyed upsert: re-delivery overwrites a row with the same value.
    guard.rows.extend(staged);
    guard.checkpoint = Some(next);
    Ok(())
}

pub async fn wait_for_rows(
    projection: &RecordingProjection,
    target: usize,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = projection.rows().len();
        if current >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(anyhow!(
                "projection did not reach {target} rows within {timeout:?} (rows: {current})"
            ));
        }
        sleep(Duration::from_millis(10)).await;
    }
}
