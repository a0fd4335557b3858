use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position in an event stream.
///
/// Only the source that produced a cursor knows how to interpret it. Everything
/// else, the worker included, treats it as a byte string that is compared by
/// equality and threaded through calls unchanged. The empty cursor means
/// "beginning of the stream".
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(Bytes);

impl Cursor {
    /// The empty cursor, positioned before the first event.
    pub fn beginning() -> Self {
        Self(Bytes::new())
    }

    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn is_beginning(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// UTF-8 view of the token, when the source happens to use textual cursors.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<&'static str> for Cursor {
    fn from(value: &'static str) -> Self {
        Self(Bytes::from_static(value.as_bytes()))
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<Vec<u8>> for Cursor {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<Bytes> for Cursor {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "Cursor({text:?})"),
            None => write!(f, "Cursor({:?})", self.0),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => f.write_str(text),
            None => {
                for byte in self.0.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}
