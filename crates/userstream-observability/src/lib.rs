//! # userstream-observability
//!
//! Structured logging for UserStream binaries.
//!
//! The library crates only emit `tracing` events; a binary calls
//! [`init_tracing`] once at startup to decide where they go.
//!
//! ## Structured logging
//! Text output for terminals, JSON lines for log shippers (ELK, Loki,
//! CloudWatch). Levels are configurable globally and per component.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
