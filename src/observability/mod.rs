//! # Observability Infrastructure
//!
//! Structured logging for the edgeplane compiler. There are no metrics or
//! distributed traces here: the compiler is a short-lived build step, so
//! everything it has to say goes through `tracing` events and spans.

pub mod logging;

pub use logging::{init_logging, log_config_info};
