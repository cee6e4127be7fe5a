//! Observability for the bridge: structured logging
//!
//! Tick outcomes are counted by the poller itself and reported in its
//! shutdown summary; there is no metrics endpoint.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{mqtt_span, poll_span};
