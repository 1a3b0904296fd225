//! Path pattern batching
//!
//! A listener rule condition accepts at most five values, so a service that
//! owns more path patterns needs several rules. Batching is order
//! preserving: the first batch holds the first patterns.

use crate::errors::{EdgeplaneError, Result};

/// Values a single path-pattern condition may hold
pub const MAX_CONDITION_VALUES: usize = 5;

/// Split `patterns` into contiguous groups of `max_size`, the last group
/// holding the remainder. An empty input yields no batches.
pub fn batch<T: Clone>(patterns: &[T], max_size: usize) -> Result<Vec<Vec<T>>> {
    if max_size == 0 {
        return Err(EdgeplaneError::validation_field("batch size must be at least 1", "max_size"));
    }
    Ok(patterns.chunks(max_size).map(<[T]>::to_vec).collect())
}

/// Number of batches `batch` yields for `len` patterns
pub fn batch_count(len: usize, max_size: usize) -> usize {
    len.div_ceil(max_size.max(1))
}
