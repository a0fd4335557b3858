//! Optional diagnostic side channel.
//!
//! A [`Logger`] receives a message and key/value pairs at every worker
//! transition. It must return quickly and must not panic; when absent nothing
//! is called. Worker transitions are also emitted as structured `tracing`
//! events regardless of whether a logger is installed.

use std::fmt::Write as _;
use std::sync::Arc;

pub type Field = (&'static str, String);

pub type Logger = Arc<dyn Fn(&str, &[Field]) + Send + Sync>;

/// Wraps a closure as a [`Logger`].
pub fn logger_fn<F>(f: F) -> Logger
where
    F: Fn(&str, &[Field]) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Logger that re-emits every call as an `info` event on the
/// `cursorproj::diagnostics` target.
pub fn tracing_logger() -> Logger {
    logger_fn(|msg, fields| {
        tracing::info!(
            target: "cursorproj::diagnostics",
            fields = %render_fields(fields),
            "{msg}"
        );
    })
}

/// Renders fields as `key=value` pairs separated by spaces.
pub fn render_fields(fields: &[Field]) -> String {
    let mut out = String::new();
    for (idx, (key, value)) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{key}={value}");
    }
    out
}

/// Emits a worker transition on the `cursorproj::worker` target with each key
/// as its own field, then hands the same message and fields to the logger if
/// one is installed. Values only need `Display`; they are rendered to strings
/// for the logger alone.
macro_rules! transition {
    ($logger:expr, $level:ident, $msg:literal $(, $key:ident = $value:expr)* $(,)?) => {{
        ::tracing::event!(
            target: "cursorproj::worker",
            ::tracing::Level::$level,
            $($key = %$value,)*
            $msg
        );
        if let Some(logger) = $logger {
            logger($msg, &[$((stringify!($key), $value.to_string())),*]);
        }
    }};
}

pub(crate) use transition;
