use serde::{Deserialize, Serialize};

pub mod config;
pub mod crawler;
pub mod explorer;
pub mod grid;
pub mod inventory;
pub mod keymaster;
pub mod labyrinth;
pub mod pathfinding;
pub mod shared_map;
pub mod team;
pub mod tile;

pub use config::{ConfigError, TeamConfig};
pub use crawler::{CrawlError, Crawler};
pub use explorer::{ExploreError, ExploreOutcome, Explorer};
pub use inventory::{Inventory, InventoryError, Key};
pub use keymaster::{DoorId, KeyPlacements, Keymaster, KeymasterError, RoomId};
pub use labyrinth::{Labyrinth, LabyrinthCrawler, LayoutError};
pub use shared_map::{DiscoveredTile, SharedMap};
pub use team::{AgentReport, AgentStatus, Team, TeamError, TeamReport};
pub use tile::TileKind;

/// Represents a 2D coordinate. The grid is unbounded in both directions,
/// `y` grows southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    /// Returns the neighbouring position one step towards `direction`.
    ///
    /// Coordinates saturate at the `i32` range, so stepping off the edge of
    /// the representable plane stays in place.
    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.offset();
        Position {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Returns manhattan distance between two positions
    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal headings.
///
/// Directions are plain values: turning returns the next heading and the
/// holder reassigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Neighbour iteration order used wherever a deterministic order matters.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit offset `(dx, dy)` for this heading.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub const fn turn_right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub const fn turn_left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    pub const fn opposite(self) -> Direction {
        self.turn_right().turn_right()
    }
}
