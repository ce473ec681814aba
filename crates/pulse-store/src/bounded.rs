use std::collections::VecDeque;
use std::fmt::Display;

use parking_lot::Mutex;

use pulse_core::events::{DeviceScan, Event};
use pulse_core::ids::{EventId, ScanId};

use crate::error::StoreError;

/// A record that can live in a [`BoundedStore`].
pub trait Record: Clone {
    type Id: Clone + PartialEq + Display;

    fn id(&self) -> &Self::Id;
}

impl Record for Event {
    type Id = EventId;

    fn id(&self) -> &EventId {
        &self.id
    }
}

impl Record for DeviceScan {
    type Id = ScanId;

    fn id(&self) -> &ScanId {
        &self.id
    }
}

/// Append-only, capacity-bounded ring of records, newest first.
///
/// Appending beyond capacity evicts from the tail (oldest records first).
/// All access goes through the store's own methods; no iterator escapes
/// the lock.
pub struct BoundedStore<T: Record> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Record> BoundedStore<T> {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "store capacity must be non-zero");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Insert at the head, evicting from the tail when over capacity.
    pub fn append(&self, item: T) -> T::Id {
        let id = item.id().clone();
        let mut items = self.items.lock();
        items.push_front(item);
        items.truncate(self.capacity);
        id
    }

    /// Snapshot in strict reverse-insertion order (newest first).
    pub fn list(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn get(&self, id: &T::Id) -> Result<T, StoreError> {
        self.items
            .lock()
            .iter()
            .find(|item| item.id() == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Most recently appended record, or `None` when the store is empty.
    pub fn latest(&self) -> Option<T> {
        self.items.lock().front().cloned()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
