use crate::commit::LogicalTime;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of logical times for new commits
///
/// Injected into each replica. Replicas that reconcile with each other must
/// draw from the same authority so that every commit gets a distinct,
/// totally ordered tag.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Next logical time, strictly greater than any returned before
    fn tick(&self) -> LogicalTime;

    /// Last time handed out, 0 before the first tick
    fn now(&self) -> LogicalTime;
}

/// Counter shared by every clone
#[derive(Debug, Clone, Default)]
pub struct SharedClock {
    counter: Arc<AtomicU64>,
}

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume counting after `time`
    pub fn starting_at(time: LogicalTime) -> Self {
        SharedClock {
            counter: Arc::new(AtomicU64::new(time)),
        }
    }
}

impl Clock for SharedClock {
    fn tick(&self) -> LogicalTime {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn now(&self) -> LogicalTime {
        self.counter.load(Ordering::SeqCst)
    }
}
