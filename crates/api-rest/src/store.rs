//! In-memory registry backing the REST surface.
//!
//! The core computes over values it is handed; this store owns those values
//! between requests. A single `RwLock` guards the whole world so multi-entity
//! operations (recollection repoints tests and creates a sample) apply
//! atomically from the point of view of other requests.

use lis_core::{Order, PatientDemographics, Sample};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// Everything the API persists between requests.
#[derive(Debug, Default)]
pub struct World {
    pub orders: BTreeMap<String, Order>,
    pub samples: BTreeMap<String, Sample>,
    pub patients: BTreeMap<String, PatientDemographics>,
}

/// Shared handle to the registry plus the per-row in-flight set.
#[derive(Clone, Default)]
pub struct LabStore {
    world: Arc<RwLock<World>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl LabStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the world. Panics only if a writer panicked while
    /// holding the lock, which is unrecoverable for this process anyway.
    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, World> {
        self.world.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write access to the world.
    pub fn write(&self) -> std::sync::RwLockWriteGuard<'_, World> {
        self.world.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Try to claim the per-row busy flag for `order_id` + `test_code`.
    ///
    /// Returns `None` while another validate/reject request for the same row
    /// is still being applied. The returned lease releases the flag on drop.
    /// This is advisory debouncing per row; the store's write lock remains
    /// the true serialization point.
    pub fn try_claim_row(&self, order_id: &str, test_code: &str) -> Option<RowLease> {
        let key = format!("{order_id}:{test_code}");
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(RowLease {
            in_flight: self.in_flight.clone(),
            key,
        })
    }
}

/// Releases the busy flag for one row when dropped.
pub struct RowLease {
    in_flight: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for RowLease {
    fn drop(&mut self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_claim_is_exclusive_until_dropped() {
        let store = LabStore::new();

        let lease = store.try_claim_row("ord-1", "K").expect("first claim");
        assert!(store.try_claim_row("ord-1", "K").is_none());
        // A different row is unaffected.
        assert!(store.try_claim_row("ord-1", "NA").is_some());

        drop(lease);
        assert!(store.try_claim_row("ord-1", "K").is_some());
    }
}
