use crate::runtime::logger::Logger;
use crate::source::Cursor;
use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 512;
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(200);

pub(crate) const ENV_BATCH_SIZE: &str = "PROJECTOR_BATCH_SIZE";
pub(crate) const ENV_IDLE_SLEEP_MS: &str = "PROJECTOR_IDLE_SLEEP_MS";
pub(crate) const ENV_MAX_BATCHES: &str = "PROJECTOR_MAX_BATCHES";
pub(crate) const ENV_TIMEOUT_SECS: &str = "PROJECTOR_TIMEOUT";

/// Worker settings.
///
/// Out-of-range values are normalized rather than rejected: a zero batch size
/// becomes [`DEFAULT_BATCH_SIZE`], a zero idle sleep becomes
/// [`DEFAULT_IDLE_SLEEP`], and a zero batch cap means "unlimited".
#[derive(Clone)]
pub struct WorkerConfig {
    batch_size: usize,
    idle_sleep: Duration,
    max_batches: Option<usize>,
    start: Cursor,
    logger: Option<Logger>,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Maximum envelopes requested per fetch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Wait after an empty fetch before polling again.
    pub fn idle_sleep(&self) -> Duration {
        self.idle_sleep
    }

    /// Number of non-empty batches after which a run stops successfully.
    pub fn max_batches(&self) -> Option<usize> {
        self.max_batches
    }

    /// Cursor the first fetch of every run starts from.
    pub fn start(&self) -> &Cursor {
        &self.start
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    /// Returns a copy positioned at a different start cursor, typically the
    /// checkpoint the caller reloaded after a failed run.
    pub fn with_start(&self, start: Cursor) -> Self {
        Self {
            start,
            ..self.clone()
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfigBuilder::default().build()
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("batch_size", &self.batch_size)
            .field("idle_sleep", &self.idle_sleep)
            .field("max_batches", &self.max_batches)
            .field("start", &self.start)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[derive(Default, Clone)]
pub struct WorkerConfigBuilder {
    batch_size: Option<usize>,
    idle_sleep: Option<Duration>,
    max_batches: Option<usize>,
    start: Option<Cursor>,
    logger: Option<Logger>,
}

impl WorkerConfigBuilder {
    /// Seeds a builder from `PROJECTOR_BATCH_SIZE`, `PROJECTOR_IDLE_SLEEP_MS`
    /// and `PROJECTOR_MAX_BATCHES`. Unset variables keep their defaults;
    /// unparseable ones are an error.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::default();
        if let Some(size) = read_env_parsed::<usize>(ENV_BATCH_SIZE)? {
            builder = builder.batch_size(size);
        }
        if let Some(ms) = read_env_parsed::<u64>(ENV_IDLE_SLEEP_MS)? {
            builder = builder.idle_sleep(Duration::from_millis(ms));
        }
        if let Some(max) = read_env_parsed::<usize>(ENV_MAX_BATCHES)? {
            builder = builder.max_batches(max);
        }
        Ok(builder)
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep = Some(sleep);
        self
    }

    pub fn max_batches(mut self, max: usize) -> Self {
        self.max_batches = Some(max);
        self
    }

    pub fn start(mut self, cursor: impl Into<Cursor>) -> Self {
        self.start = Some(cursor.into());
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self
                .batch_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            idle_sleep: self
                .idle_sleep
                .filter(|sleep| !sleep.is_zero())
                .unwrap_or(DEFAULT_IDLE_SLEEP),
            max_batches: self.max_batches.filter(|max| *max > 0),
            start: self.start.unwrap_or_default(),
            logger: self.logger,
        }
    }
}

pub(crate) fn read_env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("invalid {name} value '{trimmed}'"))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {name}")),
    }
}
