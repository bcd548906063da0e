//! Standalone garbage fleet simulation module
//!
//! This module contains all the core simulation logic: the toroidal grid,
//! road and signal state, garbage bins, the shared assignment registry,
//! and the vehicle decision engine. It runs headless from the console.

mod bin;
mod grid;
mod history;
mod registry;
mod road;
mod signal;
mod stats;
mod types;
mod vehicle;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use bin::{AreaType, SimBin};
#[allow(unused_imports)]
pub use grid::SimGrid;
#[allow(unused_imports)]
pub use history::PositionHistory;
#[allow(unused_imports)]
pub use registry::AssignmentRegistry;
#[allow(unused_imports)]
pub use road::{RoadKind, SimRoad, TravelRule};
#[allow(unused_imports)]
pub use signal::{SignalPhase, SimSignal, GREEN_DURATION, RED_DURATION, YELLOW_DURATION};
#[allow(unused_imports)]
pub use stats::FleetStats;
#[allow(unused_imports)]
pub use types::{BinId, Direction, GridCoord, SimId, VehicleId};
#[allow(unused_imports)]
pub use vehicle::{
    BinSnapshot, SimVehicle, VehicleStatus, VehicleStepResult, ARRIVAL_TOLERANCE,
    BIN_COOLDOWN_TICKS, COLLECTION_DURATION_TICKS, COLLECTION_WORTHY_PCT, MAX_BLOCKED_TICKS,
    MAX_YIELD_ATTEMPTS, RETURN_LOAD_FRACTION, SCAN_RADIUS, SNAPSHOT_STALE_TICKS,
    STRAIGHT_THROUGH_PROBABILITY, TELEPORT_SEARCH_ATTEMPTS, UNLOAD_DURATION_TICKS, URGENT_PCT,
};
pub use world::{SimWorld, DEFAULT_BIN_CAPACITY, DEFAULT_VEHICLE_CAPACITY};
