use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// One delivered event.
///
/// The worker never looks inside; only the apply function interprets `event_type`
/// and `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub event_id: String,
    pub event_type: String,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<SystemTime>,
}

impl Envelope {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            data: data.into(),
            metadata: BTreeMap::new(),
            stream_id: None,
            recorded_at: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn with_recorded_at(mut self, at: SystemTime) -> Self {
        self.recorded_at = Some(at);
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Events returned by a single fetch, plus the cursor positioned right after them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub events: Vec<Envelope>,
    pub next: super::Cursor,
}

impl Batch {
    pub fn new(events: Vec<Envelope>, next: super::Cursor) -> Self {
        Self { events, next }
    }

    /// An empty batch. `next` is whatever the source reports; the worker discards it.
    pub fn empty(next: super::Cursor) -> Self {
        Self {
            events: Vec::new(),
            next,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
