use crate::runtime::context::StopReason;
use anyhow::Error as AnyError;
use std::fmt;

/// Loop step at which a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStage {
    Fetch,
    Apply,
    Commit,
    Cancellation,
}

/// Terminal outcome of a failed run.
///
/// Collaborator failures are carried verbatim: `into_source` hands back the
/// exact error the source or apply function returned, so callers can
/// `downcast` it to their own type. Cancellation keeps the context's reason.
#[derive(Debug)]
pub enum WorkerError {
    Fetch(AnyError),
    Apply(AnyError),
    Commit(AnyError),
    Cancelled,
    DeadlineExceeded,
}

impl WorkerError {
    pub fn stage(&self) -> WorkerStage {
        match self {
            WorkerError::Fetch(_) => WorkerStage::Fetch,
            WorkerError::Apply(_) => WorkerStage::Apply,
            WorkerError::Commit(_) => WorkerStage::Commit,
            WorkerError::Cancelled | WorkerError::DeadlineExceeded => WorkerStage::Cancellation,
        }
    }

    /// `true` for both explicit cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        self.stop_reason().is_some()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            WorkerError::Cancelled => Some(StopReason::Cancelled),
            WorkerError::DeadlineExceeded => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Borrow the collaborator error, if this is not a cancellation.
    pub fn source_error(&self) -> Option<&AnyError> {
        match self {
            WorkerError::Fetch(err) | WorkerError::Apply(err) | WorkerError::Commit(err) => {
                Some(err)
            }
            _ => None,
        }
    }

    /// Take the collaborator error, if this is not a cancellation.
    pub fn into_source(self) -> Option<AnyError> {
        match self {
            WorkerError::Fetch(err) | WorkerError::Apply(err) | WorkerError::Commit(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

impl From<StopReason> for WorkerError {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Cancelled => WorkerError::Cancelled,
            StopReason::DeadlineExceeded => WorkerError::DeadlineExceeded,
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Fetch(err) => write!(f, "fetch failed: {err}"),
            WorkerError::Apply(err) => write!(f, "apply failed: {err}"),
            WorkerError::Commit(err) => write!(f, "commit failed: {err}"),
            WorkerError::Cancelled => fmt::Display::fmt(&StopReason::Cancelled, f),
            WorkerError::DeadlineExceeded => fmt::Display::fmt(&StopReason::DeadlineExceeded, f),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.source_error() {
            Some(err) => Some(err.as_ref()),
            None => None,
        }
    }
}
