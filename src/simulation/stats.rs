//! Fleet-wide statistics tracking
//!
//! Counters the headless runner prints with each summary. Purely
//! observational; nothing in the simulation reads them back.

/// Aggregate counters across all vehicles
#[derive(Debug, Clone, Default)]
pub struct FleetStats {
    /// Garbage units collected from bins
    pub total_collected: f64,

    /// Completed bin collections (full or partial)
    pub collections_completed: usize,

    /// Completed depot unload trips
    pub unload_trips: usize,

    /// Garbage units dropped off at the depot
    pub total_unloaded: f64,

    /// Ticks on which some vehicle had no valid move
    pub blocked_ticks: u64,

    /// Deadlock yields performed (back-up or pivot in place)
    pub yields: usize,

    /// Deadlock teleports performed
    pub teleports: usize,
}

impl FleetStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line summary for console display
    pub fn summary(&self) -> String {
        format!(
            "Collected: {:.1} in {} pickups | Unloaded: {:.1} in {} trips | Blocked ticks: {} | Yields: {} | Teleports: {}",
            self.total_collected,
            self.collections_completed,
            self.total_unloaded,
            self.unload_trips,
            self.blocked_ticks,
            self.yields,
            self.teleports
        )
    }
}
