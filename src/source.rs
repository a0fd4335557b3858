//! Event source contract plus the value types that cross it: cursors,
//! envelopes, and fetched batches. `memory` provides an in-process log.

pub mod cursor;
pub mod envelope;
pub mod memory;

pub use cursor::Cursor;
pub use envelope::{Batch, Envelope};
pub use memory::MemoryEventLog;

use crate::runtime::context::RunContext;
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

pub type SourceFuture<'a, T> = BoxFuture<'a, Result<T>>;

/// Ordered, cursor-addressable event store consumed by the worker.
///
/// Implementations receive the run context so long-running I/O can observe
/// cancellation; the worker does not interrupt these calls itself.
pub trait EventSource: Send + Sync {
    /// Returns up to `limit` envelopes strictly after `cursor`, in stream order,
    /// together with the cursor positioned after the last one returned.
    ///
    /// Must return an empty batch rather than an error when nothing new exists,
    /// and must not change durable state: the same cursor may be fetched again.
    fn fetch<'a>(
        &'a self,
        ctx: &'a RunContext,
        cursor: &'a Cursor,
        limit: usize,
    ) -> SourceFuture<'a, Batch>;

    /// Tells the source everything up to `cursor` has been applied downstream.
    /// Sources whose events are already durable can treat this as a no-op.
    fn commit<'a>(&'a self, ctx: &'a RunContext, cursor: &'a Cursor) -> SourceFuture<'a, ()>;
}

impl<S: EventSource + ?Sized> EventSource for Arc<S> {
    fn fetch<'a>(
        &'a self,
        ctx: &'a RunContext,
        cursor: &'a Cursor,
        limit: usize,
    ) -> SourceFuture<'a, Batch> {
        (**self).fetch(ctx, cursor, limit)
    }

    fn commit<'a>(&'a self, ctx: &'a RunContext, cursor: &'a Cursor) -> SourceFuture<'a, ()> {
        (**self).commit(ctx, cursor)
    }
}
