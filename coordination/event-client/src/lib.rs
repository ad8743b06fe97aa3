//! Client side of the coordination protocol: the HTTP client used by
//! instrumented nodes and test drivers, and the runtime that executes
//! compiled instrumentation operations.

pub mod client;
pub mod error;
pub mod runtime;

pub use client::{CoordinationClient, DEFAULT_POLL_INTERVAL};
pub use error::ClientError;
pub use runtime::{Collector, Frame, InstrumentedRuntime, LoggingCollector};
