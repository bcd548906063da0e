//! Road segment descriptors for the garbage fleet simulation
//!
//! A road segment describes one grid cell of the network: its orientation
//! and the travel direction(s) it permits. Segments are created by the
//! world builder and never change afterwards.

use super::types::Direction;

/// Orientation of a road cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadKind {
    Horizontal,
    Vertical,
    /// A cell where roads cross; admits travel in any direction
    Intersection,
}

/// The travel direction(s) a road cell permits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelRule {
    EastOnly,
    WestOnly,
    NorthOnly,
    SouthOnly,
    /// Both directions along the cell's axis
    Bidirectional,
    /// All four directions; the only rule valid for intersections
    All,
}

/// A single road cell
#[derive(Debug, Clone, Copy)]
pub struct SimRoad {
    kind: RoadKind,
    permitted: TravelRule,
}

impl SimRoad {
    /// Create a road cell; intersections always permit all directions
    /// regardless of the rule passed in.
    pub fn new(kind: RoadKind, permitted: TravelRule) -> Self {
        let permitted = if kind == RoadKind::Intersection {
            TravelRule::All
        } else {
            permitted
        };
        Self { kind, permitted }
    }

    pub fn kind(&self) -> RoadKind {
        self.kind
    }

    pub fn permitted(&self) -> TravelRule {
        self.permitted
    }

    pub fn is_intersection(&self) -> bool {
        self.kind == RoadKind::Intersection
    }

    /// Whether a vehicle heading `direction` may travel on this cell
    pub fn allows(&self, direction: Direction) -> bool {
        match self.permitted {
            TravelRule::EastOnly => direction == Direction::East,
            TravelRule::WestOnly => direction == Direction::West,
            TravelRule::NorthOnly => direction == Direction::North,
            TravelRule::SouthOnly => direction == Direction::South,
            TravelRule::Bidirectional => match self.kind {
                RoadKind::Horizontal => {
                    direction == Direction::East || direction == Direction::West
                }
                RoadKind::Vertical => {
                    direction == Direction::North || direction == Direction::South
                }
                RoadKind::Intersection => true,
            },
            TravelRule::All => true,
        }
    }

    /// The headings consistent with this cell's travel rule
    ///
    /// Used to face a vehicle placed onto the cell from nowhere.
    pub fn consistent_directions(&self) -> Vec<Direction> {
        Direction::ALL
            .iter()
            .copied()
            .filter(|d| self.allows(*d))
            .collect()
    }
}
