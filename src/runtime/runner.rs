use crate::runtime::apply::Apply;
use crate::runtime::context::{RunContext, StopReason};
use crate::runtime::error::WorkerError;
use crate::runtime::worker::Worker;
use crate::source::EventSource;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Drives a [`Worker`] under a root [`CancellationToken`] and translates OS
/// signals into graceful shutdowns.
pub struct Runner<S, A> {
    worker: Worker<S, A>,
    shutdown: CancellationToken,
}

impl<S: EventSource, A: Apply> Runner<S, A> {
    pub fn new(worker: Worker<S, A>) -> Self {
        Self {
            worker,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn worker(&self) -> &Worker<S, A> {
        &self.worker
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the worker until it returns. Cancelling the root token surfaces as
    /// [`WorkerError::Cancelled`].
    pub async fn run(&mut self) -> Result<(), WorkerError> {
        self.run_with(RunContext::new()).await
    }

    /// Same as [`Runner::run`] but also bounded by the caller's context: its
    /// cancellation and its deadline both stop the worker.
    pub async fn run_with(&mut self, ctx: RunContext) -> Result<(), WorkerError> {
        let bound = RunContext::with_token(self.shutdown.child_token());
        let bound = match ctx.deadline() {
            Some(deadline) => bound.with_deadline(deadline),
            None => bound,
        };

        let outcome = {
            let run = self.worker.run(&bound);
            tokio::pin!(run);
            tokio::select! {
                outcome = &mut run => outcome,
                reason = ctx.stopped() => {
                    // The bound context already carries the deadline, so only an
                    // explicit cancel needs forwarding.
                    if reason == StopReason::Cancelled {
                        bound.cancel();
                    }
                    run.await
                }
            }
        };

        self.reinitialize_if_cancelled();
        outcome
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    ///
    /// A stop requested that way counts as a clean exit; worker failures, the
    /// batch cap, and deadline expiry are reported as-is.
    pub async fn run_until_ctrl_c(&mut self) -> Result<(), WorkerError> {
        let ctx = RunContext::with_token(self.shutdown.child_token());
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        let outcome = {
            let run = self.worker.run(&ctx);
            tokio::pin!(run);
            tokio::select! {
                outcome = &mut run => outcome,
                _ = signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received; shutting down runner");
                    self.shutdown.cancel();
                    run.await
                }
            }
        };

        self.reinitialize_if_cancelled();
        match outcome {
            Err(WorkerError::Cancelled) => {
                tracing::info!("runner shutdown token cancelled; worker stopped");
                Ok(())
            }
            other => other,
        }
    }

    fn reinitialize_if_cancelled(&mut self) {
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }
    }
}
