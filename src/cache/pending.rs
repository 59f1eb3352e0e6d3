use crate::cache::CacheError;
use crate::table::Table;
use parking_lot::Condvar;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

pub(crate) type BuildResult = Result<Arc<Table>, CacheError>;

/// Slot through which the single builder of a key hands its result to the
/// callers waiting on it.
#[derive(Debug, Default)]
pub(crate) struct PendingBuild {
    result: Mutex<Option<BuildResult>>,
    ready: Condvar,
}

impl PendingBuild {
    pub(crate) fn new() -> Arc<PendingBuild> {
        Arc::new(PendingBuild::default())
    }

    /// Stores the result and wakes every waiter. Only the first result counts.
    pub(crate) fn publish(&self, result: BuildResult) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
        self.ready.notify_all();
    }

    /// Blocks until a result is published, or returns `None` once `deadline`
    /// passes first.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> Option<BuildResult> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return Some(result.clone());
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut slot, deadline).timed_out() {
                        return slot.clone();
                    }
                }
                None => self.ready.wait(&mut slot),
            }
        }
    }
}
