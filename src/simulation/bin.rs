//! Garbage bin state for the fleet simulation
//!
//! Bins accumulate garbage every tick at an area-dependent rate and are
//! emptied (fully or partially) by servicing vehicles.

use rand::rngs::StdRng;
use rand::Rng;

use super::types::{BinId, GridCoord};

/// Kind of area a bin serves, which determines how fast it fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaType {
    Commercial,
    Residential,
    LowDensity,
}

impl AreaType {
    /// Garbage accumulated per tick before jitter
    pub fn fill_rate(self) -> f64 {
        match self {
            AreaType::Commercial => 2.0,
            AreaType::Residential => 1.0,
            AreaType::LowDensity => 0.5,
        }
    }
}

/// A garbage bin placed on a road cell
#[derive(Debug, Clone)]
pub struct SimBin {
    pub id: BinId,
    pub position: GridCoord,
    capacity: f64,
    current_fill: f64,
    area_type: AreaType,
    fill_rate: f64,
    being_serviced: bool,
}

impl SimBin {
    /// Create a bin with a random initial fill of at most half capacity
    pub fn new(
        id: BinId,
        position: GridCoord,
        capacity: f64,
        area_type: AreaType,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            id,
            position,
            capacity,
            current_fill: rng.random_range(0.0..=capacity * 0.5),
            area_type,
            fill_rate: area_type.fill_rate(),
            being_serviced: false,
        }
    }

    /// Accumulate one tick of garbage, with a ±20% jitter, clamped to
    /// capacity. Accumulation pauses while the bin is being serviced.
    pub fn step(&mut self, rng: &mut StdRng) {
        if self.being_serviced {
            return;
        }
        let actual_rate = self.fill_rate * rng.random_range(0.8..=1.2);
        self.current_fill = (self.current_fill + actual_rate).min(self.capacity);
    }

    /// Empty the bin completely, returning the amount collected
    pub fn empty(&mut self) -> f64 {
        let collected = self.current_fill;
        self.current_fill = 0.0;
        self.being_serviced = false;
        collected
    }

    /// Remove up to `amount` from the bin, returning the amount actually
    /// removed. Supports partial pickup when a vehicle lacks full capacity.
    pub fn reduce_by(&mut self, amount: f64) -> f64 {
        let removed = self.current_fill.min(amount);
        self.current_fill -= removed;
        self.being_serviced = false;
        removed
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn current_fill(&self) -> f64 {
        self.current_fill
    }

    /// Overwrite the fill level, clamped to `[0, capacity]`
    pub fn set_fill(&mut self, amount: f64) {
        self.current_fill = amount.clamp(0.0, self.capacity);
    }

    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    /// Fill level as a percentage of capacity
    pub fn fill_percentage(&self) -> f64 {
        (self.current_fill / self.capacity) * 100.0
    }

    pub fn mark_serviced(&mut self) {
        self.being_serviced = true;
    }

    pub fn clear_serviced(&mut self) {
        self.being_serviced = false;
    }

    pub fn is_being_serviced(&self) -> bool {
        self.being_serviced
    }

    /// Bucketed fill label for console display
    pub fn fill_label(&self) -> &'static str {
        let pct = self.fill_percentage();
        if self.being_serviced {
            "servicing"
        } else if pct >= 90.0 {
            "full"
        } else if pct >= 70.0 {
            "high"
        } else if pct >= 40.0 {
            "medium"
        } else if pct >= 10.0 {
            "low"
        } else {
            "empty"
        }
    }

    /// One-line human-readable status
    pub fn describe(&self) -> String {
        format!(
            "Bin {:?} ({:?}): {:.1}% full",
            self.id.0, self.area_type, self.fill_percentage()
        )
    }
}
