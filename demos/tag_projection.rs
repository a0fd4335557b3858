//! Projects product-tag events into a tag index kept in memory.
//!
//! The apply step updates the index and the checkpoint under one lock, which
//! stands in for a database transaction. The demo runs twice: the second run
//! resumes from the saved checkpoint and only sees events appended in between.
//!
//! Set `PROJECTOR_TIMEOUT` (seconds) to bound the final run; otherwise it tails
//! the log until Ctrl-C.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use cursorproj::{
    spawn_metrics_reporter, tracing_logger, Apply, Cursor, Envelope, MemoryEventLog, RunContext,
    Runner, Worker, WorkerConfigBuilder, WorkerError, DEFAULT_METRICS_INTERVAL,
};
use serde::{Deserialize, Serialize};

const DEFAULT_LOG_DIRECTIVE: &str = "info";
const TAG_ADDED: &str = "TagAdded";
const TAG_REMOVED: &str = "TagRemoved";

#[derive(Debug, Serialize, Deserialize)]
struct TagChange {
    product_id: String,
    tag: String,
    user_id: String,
}

#[derive(Default)]
struct TagIndex {
    tags: BTreeMap<String, BTreeSet<String>>,
    added_by: BTreeMap<(String, String), String>,
    checkpoint: Option<Cursor>,
}

impl TagIndex {
    fn project(&mut self, event: &Envelope) -> Result<()> {
        let change: TagChange = serde_json::from_slice(&event.data)
            .with_context(|| format!("event {} has a malformed payload", event.event_id))?;

        match event.event_type.as_str() {
            TAG_ADDED => {
                self.tags
                    .entry(change.tag.clone())
                    .or_default()
                    .insert(change.product_id.clone());
                self.added_by
                    .insert((change.product_id, change.tag), change.user_id);
            }
            TAG_REMOVED => {
                if let Some(products) = self.tags.get_mut(&change.tag) {
                    products.remove(&change.product_id);
                    if products.is_empty() {
                        self.tags.remove(&change.tag);
                    }
                }
                self.added_by.remove(&(change.product_id, change.tag));
            }
            // Unknown event types are skipped so new producers do not break the projection.
            _ => {}
        }
        Ok(())
    }
}

fn apply_to(index: Arc<Mutex<TagIndex>>) -> impl Apply {
    move |_ctx: RunContext, events: Vec<Envelope>, next: Cursor| {
        let index = index.clone();
        async move {
            let mut guard = match index.lock() {
                Ok(guard) => guard,
                Err(_) => bail!("tag index lock poisoned"),
            };

            // Stage into a copy so a bad event leaves both the index and the
            // checkpoint untouched.
            let mut staged = TagIndex {
                tags: guard.tags.clone(),
                added_by: guard.added_by.clone(),
                checkpoint: None,
            };
            for event in &events {
                staged.project(event)?;
            }
            staged.checkpoint = Some(next);
            *guard = staged;
            anyhow::Ok(())
        }
    }
}

fn tag_event(kind: &str, product_id: &str, tag: &str, user_id: &str) -> Result<Envelope> {
    let payload = serde_json::to_vec(&TagChange {
        product_id: product_id.to_owned(),
        tag: tag.to_owned(),
        user_id: user_id.to_owned(),
    })?;
    Ok(Envelope::new("", kind, payload)
        .with_stream_id(product_id)
        .with_metadata("user_id", user_id))
}

fn print_index(label: &str, index: &Mutex<TagIndex>) {
    let Ok(guard) = index.lock() else {
        return;
    };
    println!("{label} (checkpoint: {:?})", guard.checkpoint);
    for (tag, products) in &guard.tags {
        let products: Vec<&str> = products.iter().map(String::as_str).collect();
        println!("  {tag}: {}", products.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    cursorproj::init_tracing();

    let log = MemoryEventLog::new();
    log.append([
        tag_event(TAG_ADDED, "laptop-1", "electronics", "alice")?,
        tag_event(TAG_ADDED, "laptop-1", "portable", "alice")?,
        tag_event(TAG_ADDED, "phone-7", "electronics", "bob")?,
        tag_event(TAG_ADDED, "mug-3", "kitchen", "carol")?,
    ]);

    let index = Arc::new(Mutex::new(TagIndex::default()));
    let base = WorkerConfigBuilder::from_env()?.logger(tracing_logger());

    // First pass: drain what is already there, then stop.
    let first = Worker::new(
        log.clone(),
        apply_to(index.clone()),
        base.clone().max_batches(1).build(),
    );
    first.run(&RunContext::new()).await?;
    print_index("after first run", &index);

    log.append([
        tag_event(TAG_REMOVED, "laptop-1", "portable", "alice")?,
        tag_event(TAG_ADDED, "mug-3", "gift", "dave")?,
    ]);

    let resume = index
        .lock()
        .ok()
        .and_then(|guard| guard.checkpoint.clone())
        .unwrap_or_default();
    println!("resuming from checkpoint {resume}");

    let worker = Worker::new(log.clone(), apply_to(index.clone()), base.start(resume).build());
    let mut runner = Runner::new(worker);
    let reporter = spawn_metrics_reporter(
        runner.worker().telemetry(),
        runner.cancellation_token(),
        DEFAULT_METRICS_INTERVAL,
    );
    let ctx = RunContext::from_env_timeout()?;

    let outcome = if ctx.deadline().is_some() {
        runner.run_with(ctx).await
    } else {
        println!("tailing the log; press Ctrl-C to stop");
        runner.run_until_ctrl_c().await
    };

    // The root token is only cancelled by Ctrl-C; stop the reporter either way.
    reporter.abort();

    match outcome {
        Ok(()) | Err(WorkerError::DeadlineExceeded) => {
            print_index("after second run", &index);
            Ok(())
        }
        Err(err) => Err(err).context("projection failed"),
    }
}
