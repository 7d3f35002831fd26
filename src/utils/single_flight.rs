use crate::models::Operation;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Allows at most one in-flight call per operation kind.
///
/// Unlike a plain keyed mutex, a second caller is not queued: `try_acquire`
/// returns `None` while the first permit is alive.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    slots: Arc<DashMap<Operation, Arc<Semaphore>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    fn slot(&self, op: Operation) -> Arc<Semaphore> {
        self.slots
            .entry(op)
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .value()
            .clone()
    }

    /// Claims the slot for `op`. The slot is released when the permit drops.
    pub fn try_acquire(&self, op: Operation) -> Option<OwnedSemaphorePermit> {
        self.slot(op).try_acquire_owned().ok()
    }

    /// Reads the slot without claiming it.
    pub fn is_in_flight(&self, op: Operation) -> bool {
        self.slots
            .get(&op)
            .map(|slot| slot.available_permits() == 0)
            .unwrap_or(false)
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_rejected() {
        let flights = SingleFlight::new();
        let permit = flights.try_acquire(Operation::Upload);
        assert!(permit.is_some());
        assert!(flights.is_in_flight(Operation::Upload));
        assert!(flights.try_acquire(Operation::Upload).is_none());

        drop(permit);
        assert!(!flights.is_in_flight(Operation::Upload));
        assert!(flights.try_acquire(Operation::Upload).is_some());
    }

    #[test]
    fn test_kinds_are_independent() {
        let flights = SingleFlight::new();
        let _media = flights.try_acquire(Operation::RequestMedia).unwrap();
        assert!(!flights.is_in_flight(Operation::Upload));
        assert!(flights.try_acquire(Operation::RequestLocation).is_some());
        assert!(flights.try_acquire(Operation::Upload).is_some());
    }

    #[test]
    fn test_checking_does_not_claim() {
        let flights = SingleFlight::new();
        assert!(!flights.is_in_flight(Operation::SaveToAlbum));
        assert!(flights.try_acquire(Operation::SaveToAlbum).is_some());
    }
}
