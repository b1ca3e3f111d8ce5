//! Connection identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-local identifier for a live client connection.
///
/// Ids are never reused within a process lifetime, so a stale id in a log
/// line always denotes exactly one past connection.
pub type ConnId = u64;

/// Generates unique connection ids from a monotonically increasing counter.
pub struct ConnIdGenerator {
    counter: AtomicU64,
}

impl ConnIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next unique connection id.
    pub fn next(&self) -> ConnId {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ConnIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
