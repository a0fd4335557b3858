use crate::runtime::config::{read_env_parsed, ENV_TIMEOUT_SECS};
use anyhow::Result;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a [`RunContext`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("context cancelled"),
            StopReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Cooperative cancellation scope handed to a worker run and to every
/// collaborator call it makes.
///
/// Stops when its token is cancelled (explicitly or through a parent) or when
/// its optional deadline passes. The first stop reason observed is latched and
/// reported from then on. Cloning shares the token, deadline, and latched reason.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    reason: Arc<OnceLock<StopReason>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token so external shutdown logic can drive the run.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            reason: Arc::default(),
        }
    }

    /// Adds a deadline `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Adds an absolute deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self.reason = self.detached_reason();
        self
    }

    /// Builds a context bounded by `PROJECTOR_TIMEOUT` (whole seconds) when set.
    /// Zero or an absent variable means no deadline.
    pub fn from_env_timeout() -> Result<Self> {
        let ctx = Self::new();
        match read_env_parsed::<u64>(ENV_TIMEOUT_SECS)? {
            Some(secs) if secs > 0 => Ok(ctx.with_timeout(Duration::from_secs(secs))),
            _ => Ok(ctx),
        }
    }

    /// Derives a context that stops with this one but can also be cancelled on
    /// its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            reason: self.detached_reason(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels the token. A deadline that already passed stays the reported
    /// reason.
    pub fn cancel(&self) {
        if self.deadline_passed() {
            self.latch(StopReason::DeadlineExceeded);
        } else {
            self.latch(StopReason::Cancelled);
        }
        self.token.cancel();
    }

    /// Non-blocking check. Returns the latched reason if one was observed;
    /// otherwise a cancelled token is reported ahead of an expired deadline
    /// (the order cannot be recovered for a cancel that came through a parent).
    pub fn stop_reason(&self) -> Option<StopReason> {
        if let Some(latched) = self.reason.get() {
            return Some(*latched);
        }
        if self.token.is_cancelled() {
            return Some(self.latch(StopReason::Cancelled));
        }
        if self.deadline_passed() {
            return Some(self.latch(StopReason::DeadlineExceeded));
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.stop_reason().is_some()
    }

    /// Resolves once the context stops.
    pub async fn stopped(&self) -> StopReason {
        if let Some(reason) = self.stop_reason() {
            return reason;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => self.latch(StopReason::Cancelled),
                    _ = sleep_until(deadline) => self.latch(StopReason::DeadlineExceeded),
                }
            }
            None => {
                self.token.cancelled().await;
                self.latch(StopReason::Cancelled)
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    // Fresh latch seeded with whatever this context already observed.
    fn detached_reason(&self) -> Arc<OnceLock<StopReason>> {
        let reason = OnceLock::new();
        if let Some(latched) = self.reason.get() {
            let _ = reason.set(*latched);
        }
        Arc::new(reason)
    }

    fn latch(&self, reason: StopReason) -> StopReason {
        *self.reason.get_or_init(|| reason)
    }

    /// Sleeps for `delay` unless the context stops first.
    pub async fn sleep(&self, delay: Duration) -> Result<(), StopReason> {
        if delay.is_zero() {
            yield_now().await;
            return match self.stop_reason() {
                Some(reason) => Err(reason),
                None => Ok(()),
            };
        }

        tokio::select! {
            biased;
            reason = self.stopped() => Err(reason),
            _ = sleep(delay) => Ok(()),
        }
    }
}
