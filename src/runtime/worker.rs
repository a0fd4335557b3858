//! The polling loop: fetch a batch, hand it to the apply function, commit it to
//! the source, advance the cursor, repeat.
//!
//! Every failure ends the run and is returned unchanged; nothing is retried.
//! Because the cursor only advances after both apply and commit succeed, a
//! restarted run refetches the failing batch, which is why apply has to be
//! idempotent.

use crate::runtime::apply::Apply;
use crate::runtime::config::WorkerConfig;
use crate::runtime::context::RunContext;
use crate::runtime::error::WorkerError;
use crate::runtime::logger::transition;
use crate::runtime::telemetry::Telemetry;
use crate::source::{Batch, Cursor, EventSource};
use std::sync::Arc;

pub struct Worker<S, A> {
    source: S,
    apply: A,
    config: WorkerConfig,
    telemetry: Arc<Telemetry>,
}

impl<S: EventSource, A: Apply> Worker<S, A> {
    pub fn new(source: S, apply: A, config: WorkerConfig) -> Self {
        Self {
            source,
            apply,
            config,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    /// Worker starting from the beginning of the stream with default settings.
    pub fn with_defaults(source: S, apply: A) -> Self {
        Self::new(source, apply, WorkerConfig::default())
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Counters accumulated across every run of this worker.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Runs from the configured start cursor until the context stops, a step
    /// fails, or the batch cap is reached (the only `Ok` outcome).
    pub async fn run(&self, ctx: &RunContext) -> Result<(), WorkerError> {
        self.run_from(ctx, self.config.start().clone()).await
    }

    /// Same as [`Worker::run`] but starting from `start` instead of the
    /// configured cursor, e.g. a checkpoint reloaded after a failure.
    pub async fn run_from(&self, ctx: &RunContext, start: Cursor) -> Result<(), WorkerError> {
        let batch_size = self.config.batch_size();
        let idle_sleep = self.config.idle_sleep();
        let max_batches = self.config.max_batches();

        let mut cursor = start;
        let mut processed: usize = 0;

        let logger = self.config.logger();

        transition!(
            logger,
            INFO,
            "runner starting",
            batch_size = batch_size,
            idle_sleep_ms = idle_sleep.as_millis(),
            max_batches = max_batches.unwrap_or(0),
            start = cursor,
        );

        loop {
            if let Some(reason) = ctx.stop_reason() {
                transition!(
                    logger,
                    INFO,
                    "runner stopped due to context cancellation",
                    reason = reason,
                    processed = processed,
                );
                return Err(reason.into());
            }

            if let Some(max) = max_batches {
                if processed >= max {
                    transition!(
                        logger,
                        INFO,
                        "runner stopped after reaching MaxBatches",
                        max_batches = max,
                        processed = processed,
                    );
                    return Ok(());
                }
            }

            self.telemetry.record_fetch();
            let Batch { events, next } = match self.source.fetch(ctx, &cursor, batch_size).await {
                Ok(batch) => batch,
                Err(err) => {
                    self.telemetry.record_failure();
                    let error = format!("{err:#}");
                    transition!(logger, ERROR, "fetch error", error = error, cursor = cursor);
                    return Err(WorkerError::Fetch(err));
                }
            };

            if events.is_empty() {
                self.telemetry.record_idle_poll();
                transition!(
                    logger,
                    DEBUG,
                    "no events fetched, sleeping",
                    idle_sleep_ms = idle_sleep.as_millis(),
                );
                if let Err(reason) = ctx.sleep(idle_sleep).await {
                    transition!(
                        logger,
                        INFO,
                        "runner stopped due to context cancellation during idle sleep",
                        reason = reason,
                        processed = processed,
                    );
                    return Err(reason.into());
                }
                continue;
            }

            let event_count = events.len();
            transition!(
                logger,
                DEBUG,
                "fetched batch",
                event_count = event_count,
                next = next,
            );

            if let Err(err) = self.apply.apply(ctx.clone(), events, next.clone()).await {
                self.telemetry.record_failure();
                let error = format!("{err:#}");
                transition!(
                    logger,
                    ERROR,
                    "apply error",
                    error = error,
                    event_count = event_count,
                );
                return Err(WorkerError::Apply(err));
            }

            transition!(
                logger,
                DEBUG,
                "applied batch successfully",
                event_count = event_count,
            );

            if let Err(err) = self.source.commit(ctx, &next).await {
                self.telemetry.record_failure();
                let error = format!("{err:#}");
                transition!(logger, ERROR, "commit error", error = error, next = next);
                return Err(WorkerError::Commit(err));
            }

            cursor = next;
            processed += 1;
            self.telemetry.record_batch(event_count);

            transition!(
                logger,
                DEBUG,
                "batch processed",
                batch_count = processed,
                cursor = cursor,
            );
        }
    }
}
