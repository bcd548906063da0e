//! Main simulation world that ties everything together
//!
//! This is the entry point for running the garbage fleet simulation from
//! the console: it owns the grid, signals, bins, vehicles, the shared
//! assignment registry, and the tick driver.

use anyhow::{bail, Context, Result};
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

use super::bin::{AreaType, SimBin};
use super::grid::SimGrid;
use super::registry::AssignmentRegistry;
use super::road::{RoadKind, SimRoad, TravelRule};
use super::signal::{SignalPhase, SimSignal};
use super::stats::FleetStats;
use super::types::{BinId, GridCoord, SimId, VehicleId};
use super::vehicle::{SimVehicle, VehicleStepResult, COLLECTION_WORTHY_PCT, URGENT_PCT};

/// Default capacity of a garbage bin
pub const DEFAULT_BIN_CAPACITY: f64 = 100.0;
/// Default capacity of a collection vehicle
pub const DEFAULT_VEHICLE_CAPACITY: f64 = 150.0;

/// The main simulation world
pub struct SimWorld {
    /// Toroidal grid with the typed per-cell indices
    pub grid: SimGrid,

    /// One signal per intersection cell
    pub signals: HashMap<GridCoord, SimSignal>,

    /// All garbage bins
    pub bins: HashMap<BinId, SimBin>,

    /// All vehicles
    pub vehicles: HashMap<VehicleId, SimVehicle>,

    /// The one shared bin-assignment registry, passed to every vehicle
    pub registry: Arc<AssignmentRegistry>,

    /// Aggregate fleet counters
    pub stats: FleetStats,

    /// Ticks elapsed since construction
    pub tick_count: u64,

    /// Unload destination at the grid's geometric center
    pub depot: GridCoord,

    /// Next ID to assign
    next_id: usize,

    /// Seedable RNG driving every stochastic decision
    rng: StdRng,
}

impl SimWorld {
    fn new_internal(width: i32, height: i32, rng: StdRng) -> Self {
        Self {
            grid: SimGrid::new(width, height),
            signals: HashMap::new(),
            bins: HashMap::new(),
            vehicles: HashMap::new(),
            registry: Arc::new(AssignmentRegistry::new()),
            stats: FleetStats::new(),
            tick_count: 0,
            depot: GridCoord::new(width / 2, height / 2),
            next_id: 0,
            rng,
        }
    }

    pub fn new(width: i32, height: i32) -> Self {
        Self::new_internal(width, height, StdRng::from_os_rng())
    }

    /// Create a world with a seeded RNG for reproducible simulations
    pub fn new_with_seed(width: i32, height: i32, seed: u64) -> Self {
        Self::new_internal(width, height, StdRng::seed_from_u64(seed))
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Lay a road cell; intersections are coerced to permit all directions
    pub fn add_road(&mut self, coord: GridCoord, kind: RoadKind, permitted: TravelRule) {
        self.grid.insert_road(coord, SimRoad::new(kind, permitted));
    }

    /// Install a desynchronized signal at `coord`
    pub fn add_signal(&mut self, coord: GridCoord) {
        let coord = self.grid.normalize(coord);
        let signal = SimSignal::new_desynced(&mut self.rng);
        self.signals.insert(coord, signal);
    }

    /// Install a signal with a chosen initial phase at `coord`
    pub fn add_signal_with_phase(&mut self, coord: GridCoord, phase: SignalPhase) {
        let coord = self.grid.normalize(coord);
        self.signals.insert(coord, SimSignal::new(phase));
    }

    /// Place a bin on a road cell
    pub fn add_bin(
        &mut self,
        coord: GridCoord,
        capacity: f64,
        area_type: AreaType,
    ) -> Result<BinId> {
        let coord = self.grid.normalize(coord);
        if self.grid.road_at(coord).is_none() {
            bail!("no road at ({}, {}) to place a bin on", coord.x, coord.y);
        }
        let id = BinId(self.next_sim_id());
        let bin = SimBin::new(id, coord, capacity, area_type, &mut self.rng);
        self.bins.insert(id, bin);
        self.grid.register_bin(coord, id);
        Ok(id)
    }

    /// Place a vehicle on a free road cell, facing the way the road runs
    pub fn add_vehicle(&mut self, coord: GridCoord, capacity: f64) -> Result<VehicleId> {
        let coord = self.grid.normalize(coord);
        let road = *self
            .grid
            .road_at(coord)
            .with_context(|| format!("no road at ({}, {}) to place a vehicle on", coord.x, coord.y))?;
        if self.grid.vehicle_at(coord).is_some() {
            bail!("cell ({}, {}) already holds a vehicle", coord.x, coord.y);
        }

        let consistent = road.consistent_directions();
        let direction = consistent[self.rng.random_range(0..consistent.len())];

        let id = VehicleId(self.next_sim_id());
        self.grid.place_vehicle(id, coord)?;
        let vehicle = SimVehicle::new(id, coord, direction, capacity, self.depot);
        self.vehicles.insert(id, vehicle);
        Ok(id)
    }

    /// Main simulation tick
    ///
    /// Signals and bins step first (independent of each other and of
    /// ordering); vehicles step afterwards, in id order so a seeded run
    /// replays identically. Nothing in the vehicle logic depends on that
    /// order for correctness.
    pub fn tick(&mut self) {
        self.tick_count += 1;

        for signal in self.signals.values_mut() {
            signal.step();
        }

        for bin in self.bins.values_mut() {
            bin.step(&mut self.rng);
        }

        let mut ids: Vec<VehicleId> = self.vehicles.keys().copied().collect();
        ids.sort();

        for id in ids {
            if let Some(mut vehicle) = self.vehicles.remove(&id) {
                let result = vehicle.step(
                    self.tick_count,
                    &mut self.grid,
                    &self.signals,
                    &mut self.bins,
                    &self.registry,
                    &mut self.rng,
                );
                match result {
                    Ok(VehicleStepResult::Continue) => {}
                    Ok(VehicleStepResult::Blocked) => {
                        self.stats.blocked_ticks += 1;
                    }
                    Ok(VehicleStepResult::Yielded) => {
                        self.stats.blocked_ticks += 1;
                        self.stats.yields += 1;
                    }
                    Ok(VehicleStepResult::Teleported) => {
                        self.stats.blocked_ticks += 1;
                        self.stats.teleports += 1;
                    }
                    Ok(VehicleStepResult::Collected(amount)) => {
                        self.stats.collections_completed += 1;
                        self.stats.total_collected += amount;
                    }
                    Ok(VehicleStepResult::Unloaded(amount)) => {
                        self.stats.unload_trips += 1;
                        self.stats.total_unloaded += amount;
                    }
                    Err(e) => {
                        warn!("vehicle {:?} step failed: {:#}; continuing", id, e);
                    }
                }
                self.vehicles.insert(id, vehicle);
            }
        }
    }

    /// Create the default city world: a 50×50 torus with a lattice of
    /// alternating one-way roads, signalized intersections, bins along the
    /// roads, and `vehicle_count` vehicles.
    pub fn create_city_world(vehicle_count: usize) -> Result<Self> {
        Self::build_city_world(Self::new(50, 50), vehicle_count)
    }

    /// Create the default city world with a seeded RNG
    pub fn create_city_world_with_seed(vehicle_count: usize, seed: u64) -> Result<Self> {
        Self::build_city_world(Self::new_with_seed(50, 50, seed), vehicle_count)
    }

    /// Internal helper that lays out the city on an empty world
    pub fn build_city_world(mut world: SimWorld, vehicle_count: usize) -> Result<Self> {
        let lanes = [5, 15, 25, 35, 45];
        let width = world.grid.width();
        let height = world.grid.height();

        // Horizontal roads with alternating directions
        for (i, &y) in lanes.iter().enumerate() {
            let rule = if i % 2 == 0 {
                TravelRule::EastOnly
            } else {
                TravelRule::WestOnly
            };
            for x in 0..width {
                let coord = GridCoord::new(x, y);
                if lanes.contains(&x) {
                    world.add_road(coord, RoadKind::Intersection, TravelRule::All);
                } else {
                    world.add_road(coord, RoadKind::Horizontal, rule);
                }
            }
        }

        // Vertical roads with alternating directions, skipping the
        // intersections laid above
        for (i, &x) in lanes.iter().enumerate() {
            let rule = if i % 2 == 0 {
                TravelRule::NorthOnly
            } else {
                TravelRule::SouthOnly
            };
            for y in 0..height {
                if lanes.contains(&y) {
                    continue;
                }
                world.add_road(GridCoord::new(x, y), RoadKind::Vertical, rule);
            }
        }

        // One signal per intersection, desynchronized
        for &x in &lanes {
            for &y in &lanes {
                world.add_signal(GridCoord::new(x, y));
            }
        }

        // Bins along the horizontal roads; area type follows distance from
        // the center (commercial core, residential ring, low-density edge)
        for &y in &lanes {
            let mut x = 2;
            while x < width {
                let coord = GridCoord::new(x, y);
                if !lanes.contains(&x) {
                    let d = world.grid.distance(coord, world.depot);
                    let area = if d <= 12.0 {
                        AreaType::Commercial
                    } else if d <= 22.0 {
                        AreaType::Residential
                    } else {
                        AreaType::LowDensity
                    };
                    world.add_bin(coord, DEFAULT_BIN_CAPACITY, area)?;
                }
                x += 6;
            }
        }

        // Vehicles on random free non-intersection road cells
        let mut placed = 0;
        let mut attempts = 0;
        while placed < vehicle_count && attempts < vehicle_count * 200 {
            attempts += 1;
            let horizontal = world.rng.random_range(0..2) == 0;
            let lane = lanes[world.rng.random_range(0..lanes.len())];
            let along = world.rng.random_range(0..width.max(height));
            let coord = if horizontal {
                GridCoord::new(along, lane)
            } else {
                GridCoord::new(lane, along)
            };
            if world.grid.is_intersection(coord)
                || world.grid.road_at(coord).is_none()
                || world.grid.vehicle_at(coord).is_some()
            {
                continue;
            }
            world.add_vehicle(coord, DEFAULT_VEHICLE_CAPACITY)?;
            placed += 1;
        }
        if placed < vehicle_count {
            bail!("could only place {placed} of {vehicle_count} vehicles on free road cells");
        }

        Ok(world)
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Garbage Fleet Summary ===");
        println!("Tick: {}", self.tick_count);
        println!(
            "Roads: {}, Signals: {}, Bins: {}, Vehicles: {}",
            self.grid.road_count(),
            self.signals.len(),
            self.bins.len(),
            self.vehicles.len()
        );
        println!("{}", self.stats.summary());
        println!("Open claims: {}", self.registry.len());

        let worthy = self
            .bins
            .values()
            .filter(|b| b.fill_percentage() >= COLLECTION_WORTHY_PCT)
            .count();
        let urgent = self
            .bins
            .values()
            .filter(|b| b.fill_percentage() >= URGENT_PCT)
            .count();
        println!(
            "Bins worth collecting: {} (urgent: {})",
            worthy, urgent
        );

        println!("--- Vehicles ---");
        let mut ids: Vec<VehicleId> = self.vehicles.keys().copied().collect();
        ids.sort();
        for id in ids {
            let v = &self.vehicles[&id];
            println!(
                "  Vehicle {:?}: pos=({}, {}), dir={:?}, status={:?}, load={:.0}%",
                v.id.0,
                v.position.x,
                v.position.y,
                v.direction,
                v.status,
                v.load_percentage()
            );
        }
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        let width = self.grid.width();
        let height = self.grid.height();
        let mut rows = vec![vec![' '; width as usize]; height as usize];

        for y in 0..height {
            for x in 0..width {
                let coord = GridCoord::new(x, y);
                let Some(road) = self.grid.road_at(coord) else {
                    continue;
                };
                rows[y as usize][x as usize] = match road.kind() {
                    RoadKind::Horizontal => '-',
                    RoadKind::Vertical => '|',
                    RoadKind::Intersection => '+',
                };

                if let Some(signal) = self.signals.get(&coord) {
                    rows[y as usize][x as usize] = match signal.phase() {
                        SignalPhase::Green => 'G',
                        SignalPhase::Yellow => 'Y',
                        SignalPhase::Red => 'R',
                    };
                }
                if let Some(bin_id) = self.grid.bin_at(coord) {
                    if let Some(bin) = self.bins.get(&bin_id) {
                        rows[y as usize][x as usize] =
                            if bin.fill_percentage() >= COLLECTION_WORTHY_PCT {
                                'O'
                            } else {
                                'o'
                            };
                    }
                }
                if coord == self.depot {
                    rows[y as usize][x as usize] = 'D';
                }
                if self.grid.vehicle_at(coord).is_some() {
                    rows[y as usize][x as usize] = 'V';
                }
            }
        }

        println!("\n=== World Map ===");
        println!("Legend: V=Vehicle, D=Depot, o/O=Bin (O needs collection), G/Y/R=Signal, -|+=Road");
        println!();
        for row in &rows {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}
