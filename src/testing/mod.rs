//! Testing utilities and mock implementations
//!
//! Lets the poll loop run without an MQTT broker.

pub mod mocks;

pub use mocks::*;
