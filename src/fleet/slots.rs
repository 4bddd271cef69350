use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Map from vehicle id to an independently locked slot.
///
/// The shard lock inside the map is only held long enough to clone the
/// slot's `Arc`; all reads and writes of a vehicle's state happen under that
/// vehicle's own mutex, so work on one vehicle never waits on another.
#[derive(Debug)]
pub struct VehicleSlots<T> {
    slots: DashMap<String, Arc<Mutex<T>>>,
}

impl<T> Default for VehicleSlots<T> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<T> VehicleSlots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, vehicle_id: &str) -> Option<Arc<Mutex<T>>> {
        self.slots.get(vehicle_id).map(|slot| slot.value().clone())
    }

    /// Returns the slot for `vehicle_id`, creating it with `init` if unseen.
    /// The bool is true when the slot was created by this call.
    pub fn get_or_insert_with(
        &self,
        vehicle_id: &str,
        init: impl FnOnce() -> T,
    ) -> (Arc<Mutex<T>>, bool) {
        if let Some(slot) = self.get(vehicle_id) {
            return (slot, false);
        }

        let mut created = false;
        let slot = self
            .slots
            .entry(vehicle_id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(init()))
            })
            .value()
            .clone();
        (slot, created)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clones out every (id, slot) pair without holding any slot lock.
    pub fn entries(&self) -> Vec<(String, Arc<Mutex<T>>)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
