//! Append-only in-process event log.
//!
//! Cursors are decimal offsets ("3" means three events have been consumed);
//! the empty cursor is offset zero. Useful for tests, demos, and wiring a
//! projection before a real store exists.

use super::{Batch, Cursor, Envelope, EventSource, SourceFuture};
use crate::runtime::context::RunContext;
use anyhow::{anyhow, Context, Error as AnyError, Result};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

#[derive(Clone, Default)]
pub struct MemoryEventLog {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    events: Vec<Envelope>,
    committed: Option<Cursor>,
    commit_count: usize,
    fail_next_fetch: Option<AnyError>,
    fail_next_commit: Option<AnyError>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends events in order and returns the cursor positioned after them.
    /// Envelopes with an empty id get their offset as id; missing timestamps
    /// are filled with the append time.
    pub fn append(&self, events: impl IntoIterator<Item = Envelope>) -> Cursor {
        let mut state = self.write_state();
        for mut event in events {
            let offset = state.events.len() + 1;
            if event.event_id.is_empty() {
                event.event_id = offset.to_string();
            }
            if event.recorded_at.is_none() {
                event.recorded_at = Some(SystemTime::now());
            }
            state.events.push(event);
        }
        Self::encode(state.events.len())
    }

    pub fn len(&self) -> usize {
        self.read_state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursor positioned after the last appended event.
    pub fn head(&self) -> Cursor {
        Self::encode(self.len())
    }

    /// Last cursor passed to a successful commit.
    pub fn committed(&self) -> Option<Cursor> {
        self.read_state().committed.clone()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.read_state().commit_count
    }

    /// Makes the next fetch fail with `error`.
    pub fn fail_next_fetch(&self, error: AnyError) {
        self.write_state().fail_next_fetch = Some(error);
    }

    /// Makes the next commit fail with `error`.
    pub fn fail_next_commit(&self, error: AnyError) {
        self.write_state().fail_next_commit = Some(error);
    }

    /// Decodes a cursor produced by this log into an offset.
    pub fn decode(cursor: &Cursor) -> Result<usize> {
        if cursor.is_beginning() {
            return Ok(0);
        }
        let text = cursor
            .as_str()
            .ok_or_else(|| anyhow!("cursor {cursor} is not valid UTF-8"))?;
        text.parse::<usize>()
            .with_context(|| format!("cursor '{text}' is not a memory log offset"))
    }

    pub fn encode(offset: usize) -> Cursor {
        Cursor::from(offset.to_string())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_batch(&self, cursor: &Cursor, limit: usize) -> Result<Batch> {
        if let Some(err) = self.write_state().fail_next_fetch.take() {
            return Err(err);
        }

        let offset = Self::decode(cursor)?;
        let state = self.read_state();
        if offset > state.events.len() {
            return Err(anyhow!(
                "cursor offset {offset} is beyond the end of the log ({})",
                state.events.len()
            ));
        }

        let end = offset.saturating_add(limit).min(state.events.len());
        let events = state.events[offset..end].to_vec();
        if events.is_empty() {
            return Ok(Batch::empty(cursor.clone()));
        }
        Ok(Batch::new(events, Self::encode(end)))
    }

    fn record_commit(&self, cursor: &Cursor) -> Result<()> {
        let mut state = self.write_state();
        if let Some(err) = state.fail_next_commit.take() {
            return Err(err);
        }
        state.committed = Some(cursor.clone());
        state.commit_count += 1;
        Ok(())
    }
}

impl EventSource for MemoryEventLog {
    fn fetch<'a>(
        &'a self,
        _ctx: &'a RunContext,
        cursor: &'a Cursor,
        limit: usize,
    ) -> SourceFuture<'a, Batch> {
        Box::pin(async move { self.read_batch(cursor, limit) })
    }

    fn commit<'a>(&'a self, _ctx: &'a RunContext, cursor: &'a Cursor) -> SourceFuture<'a, ()> {
        Box::pin(async move { self.record_commit(cursor) })
    }
}
