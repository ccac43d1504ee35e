use ahash::AHashMap;
use parking_lot::Mutex;

use crate::errors::{FederationError, FederationResult};

/// Places inside a mutation where a failure can be forced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    FacultyDeleteBeforeCommit,
    FacultyRestoreBeforeCommit,
    KeywordDeleteBeforeCommit,
    KeywordRestoreBeforeCommit,
}

/// Fault registry owned by one store, so forced failures never leak into
/// another store instance.
#[derive(Default)]
pub struct FaultInjector {
    remaining: Mutex<AHashMap<FaultPoint, usize>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `failures` passes through `point` fail.
    pub fn configure(&self, point: FaultPoint, failures: usize) {
        let mut guard = self.remaining.lock();
        if failures == 0 {
            guard.remove(&point);
        } else {
            guard.insert(point, failures);
        }
    }

    pub fn reset(&self) {
        self.remaining.lock().clear();
    }

    pub(crate) fn check(&self, point: FaultPoint) -> FederationResult<()> {
        let mut guard = self.remaining.lock();
        if let Some(remaining) = guard.get_mut(&point)
            && *remaining > 0
        {
            *remaining -= 1;
            if *remaining == 0 {
                guard.remove(&point);
            }
            return Err(FederationError::transaction(format!(
                "fault injected at {point:?}"
            )));
        }
        Ok(())
    }
}
