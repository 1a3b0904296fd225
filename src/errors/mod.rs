//! # Error Handling
//!
//! Error types for the edgeplane rule compiler. Every error raised here is a
//! configuration-time failure: nothing in this crate runs at request time, so
//! none of them are retryable.

pub mod types;

pub use types::{EdgeplaneError, Result};
