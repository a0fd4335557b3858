//! Runtime pieces around the projection loop: configuration, cancellation
//! context, the apply contract, diagnostics, telemetry, the worker itself, and
//! the signal-aware runner.

pub mod apply;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod runner;
pub mod telemetry;
pub mod worker;
