//! Vehicle agent decision engine
//!
//! Each vehicle runs a per-tick state machine: it navigates the road grid
//! (following its heading on plain roads, steering by dominant axis toward
//! an explicit target), scans its surroundings for collection-worthy bins,
//! competes for exclusive bin assignments through the shared registry,
//! services bins, and hauls its load back to the depot. Blocked vehicles
//! escalate from waiting, to yielding (backing up or pivoting), to
//! teleporting onto a free road cell as the circuit-breaker against
//! unrecoverable gridlock.

use std::collections::HashMap;

use anyhow::Result;
use log::warn;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::bin::{AreaType, SimBin};
use super::grid::SimGrid;
use super::history::PositionHistory;
use super::registry::AssignmentRegistry;
use super::signal::SimSignal;
use super::types::{BinId, Direction, GridCoord, VehicleId};

/// Load fraction at which a vehicle breaks off and returns to the depot
pub const RETURN_LOAD_FRACTION: f64 = 0.9;
/// Fill percentage at which a bin becomes worth collecting
pub const COLLECTION_WORTHY_PCT: f64 = 70.0;
/// Fill percentage at which a bin counts as urgent
pub const URGENT_PCT: f64 = 90.0;
/// Ticks a collection takes once the vehicle has reached the bin
pub const COLLECTION_DURATION_TICKS: u32 = 5;
/// Ticks an unload takes once the vehicle has reached the depot
pub const UNLOAD_DURATION_TICKS: u32 = 3;
/// Chebyshev radius of the per-tick bin scan window
pub const SCAN_RADIUS: i32 = 8;
/// Ticks after which a cached bin observation is discarded
pub const SNAPSHOT_STALE_TICKS: u64 = 30;
/// Ticks a just-serviced bin stays off the vehicle's candidate list
pub const BIN_COOLDOWN_TICKS: u64 = 60;
/// Recent-position window used for loop avoidance
pub const RECENT_POSITION_WINDOW: usize = 8;
/// Blocked-position window used for deadlock avoidance
pub const BLOCKED_POSITION_WINDOW: usize = 4;
/// Consecutive fully blocked ticks before a yield is attempted
pub const MAX_BLOCKED_TICKS: u32 = 3;
/// Failed yields before the vehicle teleports out of the jam
pub const MAX_YIELD_ATTEMPTS: u32 = 10;
/// Random probes when searching for a teleport destination
pub const TELEPORT_SEARCH_ATTEMPTS: u32 = 100;
/// Toroidal distance at which a target counts as reached
pub const ARRIVAL_TOLERANCE: f64 = 1.0;
/// Chance of going straight through an intersection when possible
pub const STRAIGHT_THROUGH_PROBABILITY: f64 = 0.7;

/// What a vehicle is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleStatus {
    /// Freshly placed, no decision made yet
    Idle,
    /// Cruising the network looking for work
    Seeking,
    /// Driving toward a claimed bin
    EnRouteToBin,
    /// Parked at a bin, transferring garbage
    Collecting,
    /// Driving toward the depot to unload
    EnRouteToDepot,
    /// Parked at the depot, dropping the load
    Unloading,
}

/// Notable outcome of one vehicle step, consumed by the world for stats
#[derive(Debug, Clone, Copy)]
pub enum VehicleStepResult {
    /// Navigated, idled, or kept working a timed sub-state
    Continue,
    /// No valid move existed this tick
    Blocked,
    /// Performed a deadlock yield (backed up or pivoted in place)
    Yielded,
    /// Performed a deadlock teleport to a free road cell
    Teleported,
    /// Finished a collection; amount transferred from the bin
    Collected(f64),
    /// Finished unloading at the depot; amount dropped off
    Unloaded(f64),
}

/// A vehicle's cached, possibly stale view of one bin
#[derive(Debug, Clone, Copy)]
pub struct BinSnapshot {
    pub bin_id: BinId,
    pub position: GridCoord,
    pub fill_level: f64,
    pub capacity: f64,
    pub area_type: AreaType,
    pub urgent: bool,
    pub observed_at: u64,
}

/// A garbage collection vehicle
#[derive(Debug)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub capacity: f64,
    pub current_load: f64,
    pub direction: Direction,
    pub position: GridCoord,
    pub status: VehicleStatus,
    /// Bin this vehicle currently holds a claim on
    pub target_bin: Option<BinId>,
    /// Cell the vehicle is steering toward (bin cell or depot)
    pub target_position: Option<GridCoord>,
    /// Completed pickups over the vehicle's lifetime
    pub collections_completed: usize,
    /// Cells traveled over the vehicle's lifetime
    pub distance_traveled: f64,
    depot: GridCoord,
    known_bins: HashMap<BinId, BinSnapshot>,
    cooldowns: HashMap<BinId, u64>,
    recent_positions: PositionHistory,
    blocked_positions: PositionHistory,
    consecutive_blocked_ticks: u32,
    yield_attempts: u32,
    collect_timer: u32,
    unload_timer: u32,
    last_position: Option<GridCoord>,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        position: GridCoord,
        direction: Direction,
        capacity: f64,
        depot: GridCoord,
    ) -> Self {
        Self {
            id,
            capacity,
            current_load: 0.0,
            direction,
            position,
            status: VehicleStatus::Idle,
            target_bin: None,
            target_position: None,
            collections_completed: 0,
            distance_traveled: 0.0,
            depot,
            known_bins: HashMap::new(),
            cooldowns: HashMap::new(),
            recent_positions: PositionHistory::new(RECENT_POSITION_WINDOW),
            blocked_positions: PositionHistory::new(BLOCKED_POSITION_WINDOW),
            consecutive_blocked_ticks: 0,
            yield_attempts: 0,
            collect_timer: 0,
            unload_timer: 0,
            last_position: None,
        }
    }

    pub fn remaining_capacity(&self) -> f64 {
        (self.capacity - self.current_load).max(0.0)
    }

    pub fn load_percentage(&self) -> f64 {
        (self.current_load / self.capacity) * 100.0
    }

    pub fn depot(&self) -> GridCoord {
        self.depot
    }

    pub fn known_bin_count(&self) -> usize {
        self.known_bins.len()
    }

    pub fn consecutive_blocked_ticks(&self) -> u32 {
        self.consecutive_blocked_ticks
    }

    pub fn yield_attempts(&self) -> u32 {
        self.yield_attempts
    }

    /// Run one tick of the decision engine
    pub fn step(
        &mut self,
        tick: u64,
        grid: &mut SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        bins: &mut HashMap<BinId, SimBin>,
        registry: &AssignmentRegistry,
        rng: &mut StdRng,
    ) -> Result<VehicleStepResult> {
        // Track where we have been and how far we have come
        if let Some(prev) = self.last_position {
            self.distance_traveled += grid.distance(prev, self.position);
        }
        self.last_position = Some(self.position);
        self.recent_positions.record(self.position);

        // Timed sub-states suspend navigation entirely
        if self.status == VehicleStatus::Collecting {
            self.collect_timer += 1;
            if self.collect_timer >= COLLECTION_DURATION_TICKS {
                return Ok(self.finish_collection(tick, grid, bins, registry));
            }
            return Ok(VehicleStepResult::Continue);
        }
        if self.status == VehicleStatus::Unloading {
            self.unload_timer += 1;
            if self.unload_timer >= UNLOAD_DURATION_TICKS {
                return Ok(self.finish_unload(grid, registry));
            }
            return Ok(VehicleStepResult::Continue);
        }

        // Nearly full: drop everything and head for the depot
        if self.status != VehicleStatus::EnRouteToDepot
            && self.current_load >= RETURN_LOAD_FRACTION * self.capacity
        {
            self.begin_depot_return(registry);
        }

        if self.status == VehicleStatus::EnRouteToDepot {
            if grid.distance(self.position, self.depot) <= ARRIVAL_TOLERANCE {
                self.status = VehicleStatus::Unloading;
                self.unload_timer = 0;
                self.clear_movement_history();
                return Ok(VehicleStepResult::Continue);
            }
        } else if let Some(target_pos) = self.target_position {
            if self.target_bin.is_some()
                && grid.distance(self.position, target_pos) <= ARRIVAL_TOLERANCE
            {
                self.status = VehicleStatus::Collecting;
                self.collect_timer = 0;
                if let Some(bin) = self.target_bin.and_then(|id| bins.get_mut(&id)) {
                    bin.mark_serviced();
                }
                self.clear_movement_history();
                return Ok(VehicleStepResult::Continue);
            }
        }

        if self.status == VehicleStatus::Idle {
            self.status = VehicleStatus::Seeking;
        }

        // Navigate, then look around and commit to new work
        let outcome = self.navigate(grid, signals, rng)?;
        self.observe_bins(tick, grid, bins);
        self.purge_stale(tick);
        if self.target_bin.is_none() && self.status != VehicleStatus::EnRouteToDepot {
            self.try_select_target(grid, registry);
        }
        Ok(outcome)
    }

    /// Release any held claim and start the trip back to the depot
    fn begin_depot_return(&mut self, registry: &AssignmentRegistry) {
        if let Some(bin_id) = self.target_bin.take() {
            registry.release(bin_id, self.id);
        }
        self.status = VehicleStatus::EnRouteToDepot;
        self.target_position = Some(self.depot);
        self.clear_movement_history();
    }

    /// Complete a finished collection: transfer garbage, release the claim,
    /// and pick the next thing to do.
    fn finish_collection(
        &mut self,
        tick: u64,
        grid: &SimGrid,
        bins: &mut HashMap<BinId, SimBin>,
        registry: &AssignmentRegistry,
    ) -> VehicleStepResult {
        let Some(bin_id) = self.target_bin.take() else {
            // Collection finished with nothing on record; reset and re-seek
            warn!(
                "vehicle {:?} completed a collection with no target bin; re-seeking",
                self.id
            );
            self.status = VehicleStatus::Seeking;
            self.target_position = None;
            return VehicleStepResult::Continue;
        };
        self.target_position = None;

        let transferred = match bins.get_mut(&bin_id) {
            Some(bin) => {
                let remaining = self.remaining_capacity();
                if bin.current_fill() <= remaining {
                    bin.empty()
                } else {
                    bin.reduce_by(remaining)
                }
            }
            None => {
                warn!(
                    "vehicle {:?} target bin {:?} is gone; skipping transfer",
                    self.id, bin_id
                );
                0.0
            }
        };
        self.current_load = (self.current_load + transferred).min(self.capacity);
        self.collections_completed += 1;
        self.cooldowns.insert(bin_id, tick);
        registry.release(bin_id, self.id);

        if self.current_load >= RETURN_LOAD_FRACTION * self.capacity {
            self.begin_depot_return(registry);
        } else {
            self.status = VehicleStatus::Seeking;
            self.try_select_target(grid, registry);
        }
        VehicleStepResult::Collected(transferred)
    }

    /// Complete a finished depot unload and look for new work
    fn finish_unload(&mut self, grid: &SimGrid, registry: &AssignmentRegistry) -> VehicleStepResult {
        let dropped = self.current_load;
        self.current_load = 0.0;
        self.status = VehicleStatus::Seeking;
        self.target_position = None;
        self.clear_movement_history();
        self.try_select_target(grid, registry);
        VehicleStepResult::Unloaded(dropped)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    fn current_goal(&self) -> Option<GridCoord> {
        match self.status {
            VehicleStatus::EnRouteToDepot => Some(self.depot),
            VehicleStatus::EnRouteToBin => self.target_position,
            _ => None,
        }
    }

    fn navigate(
        &mut self,
        grid: &mut SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        rng: &mut StdRng,
    ) -> Result<VehicleStepResult> {
        match self.current_goal() {
            Some(goal) => self.navigate_directed(goal, grid, signals, rng),
            None => self.navigate_rule_following(grid, signals, rng),
        }
    }

    /// Steer toward an explicit goal cell
    fn navigate_directed(
        &mut self,
        goal: GridCoord,
        grid: &mut SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        rng: &mut StdRng,
    ) -> Result<VehicleStepResult> {
        let toward = self.direction_toward(goal, grid);
        let preferred = [toward, toward.left(), toward.right()];

        // Skip moves into recently visited or previously jammed cells,
        // unless that would rule out every directed option
        let unvisited: Vec<Direction> = preferred
            .iter()
            .copied()
            .filter(|d| {
                let dest = grid.step(self.position, *d);
                !self.recent_positions.contains(dest) && !self.blocked_positions.contains(dest)
            })
            .collect();
        let ordered: Vec<Direction> = if unvisited.is_empty() {
            preferred.to_vec()
        } else {
            unvisited
        };

        for dir in ordered {
            if let Some(dest) = self.validated_destination(grid, signals, dir) {
                self.advance(grid, dest, dir)?;
                return Ok(VehicleStepResult::Continue);
            }
        }

        // Any allowed move beats standing still
        let fallback = self.valid_directions(grid, signals);
        if let Some(dir) = fallback.choose(rng).copied() {
            let dest = grid.step(self.position, dir);
            self.advance(grid, dest, dir)?;
            return Ok(VehicleStepResult::Continue);
        }

        self.register_blocked_tick(grid, signals, rng)
    }

    /// Follow the road rules with no particular destination
    fn navigate_rule_following(
        &mut self,
        grid: &mut SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        rng: &mut StdRng,
    ) -> Result<VehicleStepResult> {
        if grid.is_intersection(self.position) {
            let valid = self.valid_directions(grid, signals);
            if valid.is_empty() {
                return self.register_blocked_tick(grid, signals, rng);
            }
            let dir = self.decide_turn_at_intersection(&valid, grid, rng);
            let dest = grid.step(self.position, dir);
            self.advance(grid, dest, dir)?;
            return Ok(VehicleStepResult::Continue);
        }

        // Plain road: straight, else left, else right; reverse only when
        // nothing else is open
        let mut candidates: Vec<Direction> =
            [self.direction, self.direction.left(), self.direction.right()]
                .iter()
                .copied()
                .filter(|d| self.validated_destination(grid, signals, *d).is_some())
                .collect();
        if candidates.is_empty() {
            let reverse = self.direction.opposite();
            if self.validated_destination(grid, signals, reverse).is_some() {
                candidates.push(reverse);
            }
        }
        if candidates.is_empty() {
            return self.register_blocked_tick(grid, signals, rng);
        }

        let dir = if candidates.contains(&self.direction) {
            self.direction
        } else {
            candidates[0]
        };
        let dest = grid.step(self.position, dir);
        self.advance(grid, dest, dir)?;
        Ok(VehicleStepResult::Continue)
    }

    /// Pick a way through an intersection from the valid candidates
    fn decide_turn_at_intersection(
        &self,
        valid: &[Direction],
        grid: &SimGrid,
        rng: &mut StdRng,
    ) -> Direction {
        // An explicit destination wins when the move toward it is open
        if let Some(goal) = self.current_goal() {
            let toward = self.direction_toward(goal, grid);
            if valid.contains(&toward) {
                return toward;
            }
        }

        if valid.contains(&self.direction) && rng.random_bool(STRAIGHT_THROUGH_PROBABILITY) {
            return self.direction;
        }

        let turns: Vec<Direction> = [self.direction.left(), self.direction.right()]
            .iter()
            .copied()
            .filter(|d| valid.contains(d))
            .collect();
        if let Some(dir) = turns.choose(rng) {
            return *dir;
        }

        valid.choose(rng).copied().unwrap_or(self.direction)
    }

    /// Dominant-axis heading toward `goal` across the torus
    ///
    /// Exact ties between the axes prefer horizontal travel.
    fn direction_toward(&self, goal: GridCoord, grid: &SimGrid) -> Direction {
        let (dx, dy) = grid.toroidal_delta(self.position, goal);
        if dx == 0 && dy == 0 {
            return self.direction;
        }
        if dx.abs() >= dy.abs() && dx != 0 {
            if dx > 0 {
                Direction::East
            } else {
                Direction::West
            }
        } else if dy > 0 {
            Direction::South
        } else {
            Direction::North
        }
    }

    /// Destination cell for a move in `direction`, if the move is valid
    ///
    /// A move is valid iff the destination holds no vehicle, no red
    /// signal, and a road that is an intersection or explicitly permits
    /// travel in `direction`. Checks run against current state, in that
    /// fixed order: signal first, then road, then occupancy.
    fn validated_destination(
        &self,
        grid: &SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        direction: Direction,
    ) -> Option<GridCoord> {
        let dest = grid.step(self.position, direction);
        if signals.get(&dest).is_some_and(|s| s.is_red()) {
            return None;
        }
        let road = grid.road_at(dest)?;
        if !road.is_intersection() && !road.allows(direction) {
            return None;
        }
        if grid.vehicle_at(dest).is_some() {
            return None;
        }
        Some(dest)
    }

    fn valid_directions(
        &self,
        grid: &SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
    ) -> Vec<Direction> {
        Direction::ALL
            .iter()
            .copied()
            .filter(|d| self.validated_destination(grid, signals, *d).is_some())
            .collect()
    }

    /// Perform a validated move and reset the deadlock counters
    fn advance(&mut self, grid: &mut SimGrid, dest: GridCoord, direction: Direction) -> Result<()> {
        grid.move_vehicle(self.id, dest)?;
        self.position = dest;
        self.direction = direction;
        self.consecutive_blocked_ticks = 0;
        self.yield_attempts = 0;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deadlock recovery
    // ------------------------------------------------------------------

    /// Record a fully blocked tick and escalate once the threshold is hit
    fn register_blocked_tick(
        &mut self,
        grid: &mut SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        rng: &mut StdRng,
    ) -> Result<VehicleStepResult> {
        self.consecutive_blocked_ticks += 1;
        self.blocked_positions.record(self.position);
        if self.consecutive_blocked_ticks >= MAX_BLOCKED_TICKS {
            return self.yield_at_roadblock(grid, signals, rng);
        }
        Ok(VehicleStepResult::Blocked)
    }

    /// Short-horizon recovery: back into the cell behind, or pivot in place
    ///
    /// Backing up only needs a road and an empty cell; it deliberately
    /// ignores travel rules and signals, the same way a real driver edges
    /// backwards out of a jam.
    fn yield_at_roadblock(
        &mut self,
        grid: &mut SimGrid,
        signals: &HashMap<GridCoord, SimSignal>,
        rng: &mut StdRng,
    ) -> Result<VehicleStepResult> {
        if self.yield_attempts >= MAX_YIELD_ATTEMPTS {
            return self.teleport(grid, rng);
        }
        self.yield_attempts += 1;

        let back_dir = self.direction.opposite();
        let back = grid.step(self.position, back_dir);
        let can_back_up = grid.road_at(back).is_some() && grid.vehicle_at(back).is_none();

        if can_back_up {
            grid.move_vehicle(self.id, back)?;
            self.position = back;
            // Face anywhere except back the way we came
            let valid = self.valid_directions(grid, signals);
            if let Some(dir) = valid
                .iter()
                .copied()
                .find(|d| *d != back_dir)
                .or_else(|| valid.first().copied())
            {
                self.direction = dir;
            }
        } else if let Some(dir) = self.valid_directions(grid, signals).choose(rng).copied() {
            // Pivot in place
            self.direction = dir;
        }

        self.consecutive_blocked_ticks = 0;
        Ok(VehicleStepResult::Yielded)
    }

    /// Long-horizon recovery: relocate to a random free road cell
    fn teleport(&mut self, grid: &mut SimGrid, rng: &mut StdRng) -> Result<VehicleStepResult> {
        for _ in 0..TELEPORT_SEARCH_ATTEMPTS {
            let candidate = GridCoord::new(
                rng.random_range(0..grid.width()),
                rng.random_range(0..grid.height()),
            );
            let Some(road) = grid.road_at(candidate) else {
                continue;
            };
            if road.is_intersection() || grid.vehicle_at(candidate).is_some() {
                continue;
            }
            let facing = road.consistent_directions();

            grid.move_vehicle(self.id, candidate)?;
            self.position = candidate;
            if let Some(dir) = facing.choose(rng).copied() {
                self.direction = dir;
            }
            self.consecutive_blocked_ticks = 0;
            self.yield_attempts = 0;
            self.clear_movement_history();
            return Ok(VehicleStepResult::Teleported);
        }

        // Nowhere to go; stay put and retry on the next eligible tick
        warn!(
            "vehicle {:?} found no free road cell to teleport to; staying at ({}, {})",
            self.id, self.position.x, self.position.y
        );
        Ok(VehicleStepResult::Blocked)
    }

    // ------------------------------------------------------------------
    // Bin discovery and assignment
    // ------------------------------------------------------------------

    /// Scan the square window around the vehicle and cache every
    /// collection-worthy bin in sight
    fn observe_bins(&mut self, tick: u64, grid: &SimGrid, bins: &HashMap<BinId, SimBin>) {
        for dy in -SCAN_RADIUS..=SCAN_RADIUS {
            for dx in -SCAN_RADIUS..=SCAN_RADIUS {
                let coord =
                    grid.normalize(GridCoord::new(self.position.x + dx, self.position.y + dy));
                let Some(bin_id) = grid.bin_at(coord) else {
                    continue;
                };
                let Some(bin) = bins.get(&bin_id) else {
                    continue;
                };
                let pct = bin.fill_percentage();
                if pct < COLLECTION_WORTHY_PCT {
                    continue;
                }
                self.known_bins.insert(
                    bin_id,
                    BinSnapshot {
                        bin_id,
                        position: bin.position,
                        fill_level: bin.current_fill(),
                        capacity: bin.capacity(),
                        area_type: bin.area_type(),
                        urgent: pct >= URGENT_PCT,
                        observed_at: tick,
                    },
                );
            }
        }
    }

    /// Drop expired observations and elapsed post-service cooldowns
    fn purge_stale(&mut self, tick: u64) {
        self.known_bins
            .retain(|_, snap| tick.saturating_sub(snap.observed_at) <= SNAPSHOT_STALE_TICKS);
        self.cooldowns
            .retain(|_, emptied_at| tick.saturating_sub(*emptied_at) <= BIN_COOLDOWN_TICKS);
    }

    /// Proximity-weighted desirability of a cached bin
    fn score_bin(&self, snapshot: &BinSnapshot, grid: &SimGrid) -> f64 {
        let d = grid.distance(self.position, snapshot.position);
        let proximity = 1000.0 / (d * d + 1.0);
        let fill_fraction = (snapshot.fill_level / snapshot.capacity).clamp(0.0, 1.0);
        let urgency = if snapshot.urgent { 1.5 } else { 1.0 };
        proximity * (0.7 + 0.3 * fill_fraction) * urgency
    }

    /// Pick the best known bin and try to claim it
    ///
    /// Bins claimed by someone else, bins too full for the remaining
    /// capacity, and bins inside their post-service cooldown are excluded.
    /// A lost claim race is a normal negative result; the vehicle keeps
    /// scanning.
    fn try_select_target(&mut self, grid: &SimGrid, registry: &AssignmentRegistry) {
        if self.target_bin.is_some() {
            return;
        }
        let remaining = self.remaining_capacity();
        let best = self
            .known_bins
            .values()
            .filter(|snap| !self.cooldowns.contains_key(&snap.bin_id))
            .filter(|snap| snap.fill_level <= remaining)
            .filter(|snap| {
                !(registry.is_claimed(snap.bin_id)
                    && !registry.is_claimed_by(snap.bin_id, self.id))
            })
            .max_by_key(|snap| OrderedFloat(self.score_bin(snap, grid)))
            .map(|snap| (snap.bin_id, snap.position));

        let Some((bin_id, position)) = best else {
            return;
        };
        if registry.try_claim(bin_id, self.id) {
            self.target_bin = Some(bin_id);
            self.target_position = Some(position);
            self.status = VehicleStatus::EnRouteToBin;
            // A fresh pursuit should not be penalized by old loop-avoidance state
            self.clear_movement_history();
        }
    }

    fn clear_movement_history(&mut self) {
        self.recent_positions.clear();
        self.blocked_positions.clear();
    }
}
