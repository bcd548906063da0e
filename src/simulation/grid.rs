//! Toroidal grid environment
//!
//! The grid wraps on both axes and keeps typed per-cell indices: what road
//! is at a cell, which bin sits there, which vehicle occupies it. Roads,
//! signals, and bins coexist with a vehicle in the same cell, so vehicle
//! exclusivity is a property of move validation, not of cell storage.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;

use super::road::SimRoad;
use super::types::{BinId, Direction, GridCoord, VehicleId};

/// The toroidal cell grid with typed lookups per coordinate
#[derive(Debug, Default)]
pub struct SimGrid {
    width: i32,
    height: i32,
    roads: HashMap<GridCoord, SimRoad>,
    bin_index: HashMap<GridCoord, BinId>,
    vehicle_index: HashMap<GridCoord, VehicleId>,
    vehicle_positions: HashMap<VehicleId, GridCoord>,
}

impl SimGrid {
    pub fn new(width: i32, height: i32) -> Self {
        debug_assert!(width > 0 && height > 0);
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Wrap a coordinate onto the torus on both axes
    pub fn normalize(&self, coord: GridCoord) -> GridCoord {
        GridCoord::new(coord.x.rem_euclid(self.width), coord.y.rem_euclid(self.height))
    }

    /// The cell one step from `coord` in `direction`, wrapped
    pub fn step(&self, coord: GridCoord, direction: Direction) -> GridCoord {
        let (dx, dy) = direction.delta();
        self.normalize(GridCoord::new(coord.x + dx, coord.y + dy))
    }

    fn axis_delta(from: i32, to: i32, size: i32) -> i32 {
        // Shortest signed delta on a wrapped axis; ties go to the positive way
        let mut d = (to - from).rem_euclid(size);
        if d > size / 2 {
            d -= size;
        }
        d
    }

    /// Per-axis shortest signed deltas from `from` to `to` on the torus
    pub fn toroidal_delta(&self, from: GridCoord, to: GridCoord) -> (i32, i32) {
        let from = self.normalize(from);
        let to = self.normalize(to);
        (
            Self::axis_delta(from.x, to.x, self.width),
            Self::axis_delta(from.y, to.y, self.height),
        )
    }

    /// Euclidean distance between two cells measured across the torus
    pub fn distance(&self, from: GridCoord, to: GridCoord) -> f64 {
        let (dx, dy) = self.toroidal_delta(from, to);
        ((dx * dx + dy * dy) as f64).sqrt()
    }

    pub fn insert_road(&mut self, coord: GridCoord, road: SimRoad) {
        let coord = self.normalize(coord);
        self.roads.insert(coord, road);
    }

    pub fn road_at(&self, coord: GridCoord) -> Option<&SimRoad> {
        self.roads.get(&self.normalize(coord))
    }

    pub fn is_intersection(&self, coord: GridCoord) -> bool {
        self.road_at(coord).is_some_and(|r| r.is_intersection())
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn register_bin(&mut self, coord: GridCoord, bin_id: BinId) {
        let coord = self.normalize(coord);
        self.bin_index.insert(coord, bin_id);
    }

    pub fn bin_at(&self, coord: GridCoord) -> Option<BinId> {
        self.bin_index.get(&self.normalize(coord)).copied()
    }

    /// Put a vehicle onto the grid for the first time
    pub fn place_vehicle(&mut self, vehicle_id: VehicleId, coord: GridCoord) -> Result<()> {
        let coord = self.normalize(coord);
        if let Some(other) = self.vehicle_index.get(&coord) {
            bail!("cell ({}, {}) already holds vehicle {:?}", coord.x, coord.y, other);
        }
        if self.vehicle_positions.contains_key(&vehicle_id) {
            bail!("vehicle {:?} is already placed", vehicle_id);
        }
        self.vehicle_index.insert(coord, vehicle_id);
        self.vehicle_positions.insert(vehicle_id, coord);
        Ok(())
    }

    /// Relocate a registered vehicle to `dest`
    ///
    /// Single mover per call; the destination must not hold another vehicle.
    pub fn move_vehicle(&mut self, vehicle_id: VehicleId, dest: GridCoord) -> Result<()> {
        let dest = self.normalize(dest);
        let current = *self
            .vehicle_positions
            .get(&vehicle_id)
            .context("vehicle handle is not registered on the grid")?;
        if let Some(other) = self.vehicle_index.get(&dest) {
            if *other != vehicle_id {
                bail!(
                    "vehicle {:?} cannot enter ({}, {}): occupied by {:?}",
                    vehicle_id, dest.x, dest.y, other
                );
            }
        }
        self.vehicle_index.remove(&current);
        self.vehicle_index.insert(dest, vehicle_id);
        self.vehicle_positions.insert(vehicle_id, dest);
        Ok(())
    }

    pub fn vehicle_at(&self, coord: GridCoord) -> Option<VehicleId> {
        self.vehicle_index.get(&self.normalize(coord)).copied()
    }

    pub fn vehicle_position(&self, vehicle_id: VehicleId) -> Option<GridCoord> {
        self.vehicle_positions.get(&vehicle_id).copied()
    }
}
