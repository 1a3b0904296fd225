//! Listener rule priorities
//!
//! The load balancer evaluates rules in ascending priority and requires
//! every priority on a listener to be unique. Equal-specificity patterns are
//! told apart only by that order, so priorities are issued strictly in
//! registration order by a counter owned by exactly one listener.

use serde::Serialize;
use std::fmt;

use crate::errors::{EdgeplaneError, Result};

/// Highest priority a listener rule may carry
pub const MAX_RULE_PRIORITY: u32 = 50_000;

/// A listener rule priority; lower is evaluated first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Priority(u32);

impl Priority {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Issues 1, 2, 3, ... for one listener. Not `Clone`: one counter per listener.
#[derive(Debug)]
pub struct PriorityAllocator {
    next: u32,
}

impl Default for PriorityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next priority
    pub fn next(&mut self) -> Result<Priority> {
        if self.next > MAX_RULE_PRIORITY {
            return Err(EdgeplaneError::constraint(format!(
                "listener rule priorities exhausted (maximum {})",
                MAX_RULE_PRIORITY
            )));
        }
        let priority = Priority(self.next);
        self.next += 1;
        tracing::trace!(priority = priority.get(), "allocated listener rule priority");
        Ok(priority)
    }

    /// How many priorities have been issued so far
    pub fn issued(&self) -> u32 {
        self.next - 1
    }

    /// Priorities still available
    pub fn remaining(&self) -> u32 {
        MAX_RULE_PRIORITY + 1 - self.next
    }
}
