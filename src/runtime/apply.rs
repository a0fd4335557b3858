use crate::runtime::context::RunContext;
use crate::source::{Cursor, Envelope};
use anyhow::Result;
use core::future::Future;
use futures::future::{BoxFuture, FutureExt};

pub type ApplyFuture<'a> = BoxFuture<'a, Result<()>>;

/// Caller-owned projection step.
///
/// Receives one fetched batch and the cursor positioned after it. It is the
/// only place where read-model writes and the caller's own checkpoint should
/// be persisted, ideally in one atomic unit. Delivery is at-least-once, so
/// applying the same batch twice must leave the read model unchanged.
///
/// Any `Fn(RunContext, Vec<Envelope>, Cursor) -> impl Future<Output = Result<()>>`
/// closure implements this trait.
pub trait Apply: Send + Sync {
    fn apply(&self, ctx: RunContext, events: Vec<Envelope>, next: Cursor) -> ApplyFuture<'_>;
}

impl<F, Fut> Apply for F
where
    F: Fn(RunContext, Vec<Envelope>, Cursor) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn apply(&self, ctx: RunContext, events: Vec<Envelope>, next: Cursor) -> ApplyFuture<'_> {
        self(ctx, events, next).boxed()
    }
}
