//! In-memory labyrinth built from an ASCII layout, and the crawler that
//! walks it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::crawler::{CrawlError, Crawler};
use crate::grid::{Grid, GridError};
use crate::inventory::Inventory;
use crate::keymaster::{Keymaster, KeymasterError, RoomId};
use crate::tile::{Door, Tile, TileKind};
use crate::{Direction, Position};

/// Small two-door practice maze. The exit is on the west border, behind the
/// south-east door.
pub const TRAINING_LAYOUT: &str = "\
+--+--------+
|  /        |
|  +--+--+  |
|     |k    |
+--+  |  +--+
   |k  x    |
+  +-------/|
|           |
+-----------+";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Layout is empty.")]
    Empty,
    #[error("No start position ('x') found in layout.")]
    MissingStart,
    #[error("Multiple start positions ('x') found at {first} and {second}.")]
    MultipleStarts { first: Position, second: Position },
    #[error("Unknown layout character '{glyph}' at {position}.")]
    UnknownGlyph { glyph: char, position: Position },
    #[error(transparent)]
    Keymaster(#[from] KeymasterError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A bounded maze shared by all crawlers walking it.
#[derive(Debug)]
pub struct Labyrinth {
    tiles: Mutex<Grid<Tile>>,
    start: Position,
    crawlers: Mutex<Vec<Position>>,
}

impl Labyrinth {
    /// Builds a labyrinth from its ASCII layout.
    ///
    /// `+`, `-` and `|` are walls, `/` a locked door, `k` a room holding a
    /// key, `x` the start and a space a plain room. Short lines are padded
    /// with rooms. Doors and key rooms are paired by a [`Keymaster`] in
    /// reading order, and an unbalanced layout is rejected.
    ///
    /// # Arguments
    ///
    /// * `layout`: One text line per row; blank leading and trailing lines
    ///   are ignored.
    pub fn from_ascii(layout: &str) -> Result<Self, LayoutError> {
        let lines: Vec<&str> = layout.lines().collect();
        let first = lines.iter().position(|line| !line.trim().is_empty());
        let last = lines.iter().rposition(|line| !line.trim().is_empty());
        let lines = match (first, last) {
            (Some(first), Some(last)) => &lines[first..=last],
            _ => return Err(LayoutError::Empty),
        };

        let keymaster = Keymaster::new();
        let mut key_rooms: Vec<(Position, RoomId)> = Vec::new();
        let mut start: Option<Position> = None;
        let mut rows: Vec<Vec<Tile>> = Vec::with_capacity(lines.len());

        for (y, line) in lines.iter().enumerate() {
            let mut row = Vec::with_capacity(line.len());
            for (x, glyph) in line.chars().enumerate() {
                let position = Position::new(x as i32, y as i32);
                let tile = match glyph {
                    '+' | '-' | '|' => Tile::Wall,
                    '/' => Tile::Door(Door::locked(keymaster.new_door())),
                    'k' => {
                        key_rooms.push((position, keymaster.new_key_room()));
                        Tile::default()
                    }
                    'x' => {
                        if let Some(first) = start {
                            return Err(LayoutError::MultipleStarts {
                                first,
                                second: position,
                            });
                        }
                        start = Some(position);
                        Tile::default()
                    }
                    ' ' => Tile::default(),
                    unknown => {
                        return Err(LayoutError::UnknownGlyph {
                            glyph: unknown,
                            position,
                        });
                    }
                };
                row.push(tile);
            }
            rows.push(row);
        }

        let start = start.ok_or(LayoutError::MissingStart)?;
        let mut placements = keymaster.finalize()?;

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut tiles = Grid::from_generator(width, rows.len(), |x, y| {
            rows[y].get_mut(x).map(std::mem::take).unwrap_or_default()
        });
        for (position, room) in key_rooms {
            *tiles.get_mut(position)? = Tile::Room(placements.take_room_content(room));
        }

        debug!(width, height = tiles.height(), %start, "labyrinth built");
        Ok(Labyrinth {
            tiles: Mutex::new(tiles),
            start,
            crawlers: Mutex::new(Vec::new()),
        })
    }

    /// The built-in practice maze.
    pub fn training() -> Result<Self, LayoutError> {
        Self::from_ascii(TRAINING_LAYOUT)
    }

    pub fn start(&self) -> Position {
        self.start
    }

    /// Kind of the tile at `position`; everything off the grid is outside.
    pub fn tile_kind(&self, position: Position) -> TileKind {
        self.tiles
            .lock()
            .get(position)
            .map_or(TileKind::Outside, Tile::kind)
    }

    /// Runs `f` against a consistent view of the tiles.
    pub fn with_tiles<R>(&self, f: impl FnOnce(&Grid<Tile>) -> R) -> R {
        f(&self.tiles.lock())
    }

    /// Places a new crawler on the start tile, facing North.
    pub fn new_crawler(self: &Arc<Self>) -> LabyrinthCrawler {
        let mut crawlers = self.crawlers.lock();
        crawlers.push(self.start);
        LabyrinthCrawler {
            labyrinth: Arc::clone(self),
            slot: crawlers.len() - 1,
            position: self.start,
            direction: Direction::North,
        }
    }

    /// Live positions of every crawler created so far.
    pub fn crawler_positions(&self) -> Vec<Position> {
        self.crawlers.lock().clone()
    }

    /// Moves onto `target` if possible, returning the revealed content.
    fn enter(&self, target: Position, bag: &mut Inventory) -> Option<Inventory> {
        let mut tiles = self.tiles.lock();
        let Ok(tile) = tiles.get_mut(target) else {
            // Past the border: always walkable, never holds anything.
            return Some(Inventory::new());
        };
        if let Tile::Door(door) = tile {
            door.open(bag);
        }
        tile.is_traversable().then(|| tile.pass())
    }
}

/// A crawler walking a local [`Labyrinth`]. Every call answers immediately.
#[derive(Debug)]
pub struct LabyrinthCrawler {
    labyrinth: Arc<Labyrinth>,
    slot: usize,
    position: Position,
    direction: Direction,
}

impl LabyrinthCrawler {
    fn walk(&mut self, bag: &mut Inventory) -> Option<Inventory> {
        let target = self.facing_position();
        let content = self.labyrinth.enter(target, bag)?;
        self.position = target;
        if let Some(slot) = self.labyrinth.crawlers.lock().get_mut(self.slot) {
            *slot = target;
        }
        Some(content)
    }
}

#[async_trait]
impl Crawler for LabyrinthCrawler {
    fn position(&self) -> Position {
        self.position
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    async fn facing_tile(&self) -> Result<TileKind, CrawlError> {
        Ok(self.labyrinth.tile_kind(self.facing_position()))
    }

    async fn try_walk(&mut self, bag: &mut Inventory) -> Result<Option<Inventory>, CrawlError> {
        Ok(self.walk(bag))
    }
}
