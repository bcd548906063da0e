//! Shared bin-to-vehicle assignment registry
//!
//! The one structure shared across all vehicle decision processes. It maps
//! each bin to the single vehicle currently committed to servicing it, and
//! its operations are atomic with respect to each other, so no two vehicles
//! can ever simultaneously believe they own the same bin — regardless of
//! the order vehicles are stepped within a tick.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::types::{BinId, VehicleId};

/// Mutex-guarded claim map exposing only atomic claim/release/query ops
///
/// Constructed once by the world and handed to every vehicle by reference;
/// the raw map is never exposed.
#[derive(Debug, Default)]
pub struct AssignmentRegistry {
    assignments: Mutex<HashMap<BinId, VehicleId>>,
}

impl AssignmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BinId, VehicleId>> {
        // A panicked holder must not wedge the rest of the fleet
        self.assignments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `bin_id` for `vehicle_id`
    ///
    /// Succeeds when the bin is unclaimed, or when the existing claim
    /// already belongs to `vehicle_id` (idempotent re-claim). Fails when
    /// another vehicle holds the claim.
    pub fn try_claim(&self, bin_id: BinId, vehicle_id: VehicleId) -> bool {
        let mut map = self.lock();
        match map.get(&bin_id) {
            Some(owner) => *owner == vehicle_id,
            None => {
                map.insert(bin_id, vehicle_id);
                true
            }
        }
    }

    /// Release `bin_id` iff it is currently claimed by `vehicle_id`
    ///
    /// A release by any other vehicle is a no-op, so nobody can drop a
    /// claim they do not hold.
    pub fn release(&self, bin_id: BinId, vehicle_id: VehicleId) {
        let mut map = self.lock();
        if map.get(&bin_id) == Some(&vehicle_id) {
            map.remove(&bin_id);
        }
    }

    pub fn is_claimed(&self, bin_id: BinId) -> bool {
        self.lock().contains_key(&bin_id)
    }

    pub fn is_claimed_by(&self, bin_id: BinId, vehicle_id: VehicleId) -> bool {
        self.lock().get(&bin_id) == Some(&vehicle_id)
    }

    /// The vehicle currently holding `bin_id`, if any
    pub fn claimant(&self, bin_id: BinId) -> Option<VehicleId> {
        self.lock().get(&bin_id).copied()
    }

    /// Number of live claims
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
