//! Cursor-driven event projection.
//!
//! A [`Worker`] pulls batches from an [`EventSource`], hands each one to a
//! caller-supplied [`Apply`] function together with the cursor that follows
//! it, commits that cursor back to the source, and only then advances.
//! Storage, checkpoint persistence, and atomicity belong to the caller.
//! Delivery is at-least-once, so apply functions must be idempotent.

pub mod runtime;
pub mod source;

pub use runtime::apply::{Apply, ApplyFuture};
pub use runtime::config::{
    WorkerConfig, WorkerConfigBuilder, DEFAULT_BATCH_SIZE, DEFAULT_IDLE_SLEEP,
};
pub use runtime::context::{RunContext, StopReason};
pub use runtime::error::{WorkerError, WorkerStage};
pub use runtime::logger::{logger_fn, tracing_logger, Field, Logger};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{
    init_tracing, spawn_metrics_reporter, Telemetry, TelemetrySnapshot, DEFAULT_METRICS_INTERVAL,
};
pub use runtime::worker::Worker;
pub use source::{Batch, Cursor, Envelope, EventSource, MemoryEventLog, SourceFuture};
