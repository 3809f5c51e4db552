//! The map every explorer of a team reads and writes concurrently.
//!
//! Tile and visit records live in sharded concurrent maps so updates to
//! different cells never contend. The locked-door list needs insertion
//! order and compound queries, so it sits behind its own mutex; nearest and
//! best door queries are O(number of locked doors) under that lock. No
//! other lock is ever taken while it is held except the per-shard visit
//! read in [`SharedMap::best_locked_door`], and visit writers never take
//! the door lock.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::Position;
use crate::tile::TileKind;

/// What some explorer observed at a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredTile {
    pub position: Position,
    pub kind: TileKind,
}

#[derive(Debug, Default)]
pub struct SharedMap {
    tiles: DashMap<Position, DiscoveredTile>,
    visits: DashMap<Position, u32>,
    locked_doors: Mutex<Vec<Position>>,
}

impl SharedMap {
    /// Creates a map whose only known cell is the room at `origin`.
    ///
    /// # Arguments
    ///
    /// * `origin`: Where the team starts; recorded as a discovered room.
    pub fn new(origin: Position) -> Self {
        let map = Self::default();
        map.mark_discovered(origin, TileKind::Room);
        map
    }

    /// Records the kind seen at `position`. Last writer wins.
    pub fn mark_discovered(&self, position: Position, kind: TileKind) {
        self.tiles.insert(position, DiscoveredTile { position, kind });
    }

    pub fn mark_visit(&self, position: Position) {
        *self.visits.entry(position).or_insert(0) += 1;
    }

    pub fn visit_count(&self, position: Position) -> u32 {
        self.visits.get(&position).map_or(0, |count| *count)
    }

    pub fn tile_info(&self, position: Position) -> Option<DiscoveredTile> {
        self.tiles.get(&position).map(|tile| *tile)
    }

    /// Number of discovered cells.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Adds `position` to the locked doors unless already there.
    pub fn register_locked_door(&self, position: Position) {
        let mut doors = self.locked_doors.lock();
        if !doors.contains(&position) {
            doors.push(position);
        }
    }

    pub fn remove_locked_door(&self, position: Position) {
        self.locked_doors.lock().retain(|door| *door != position);
    }

    pub fn is_door_locked(&self, position: Position) -> bool {
        self.locked_doors.lock().contains(&position)
    }

    /// Locked doors in registration order.
    pub fn locked_doors(&self) -> Vec<Position> {
        self.locked_doors.lock().clone()
    }

    /// Locked door closest to `from`; ties go to the earliest registered.
    pub fn nearest_locked_door(&self, from: Position) -> Option<Position> {
        self.locked_doors
            .lock()
            .iter()
            .copied()
            // `min_by_key` keeps the first minimum, i.e. registration order.
            .min_by_key(|door| door.manhattan_distance(from))
    }

    /// Locked door in the least visited spot, then closest to `from`.
    pub fn best_locked_door(&self, from: Position) -> Option<Position> {
        self.best_locked_door_where(from, |_| true)
    }

    /// [`SharedMap::best_locked_door`] restricted to doors `accept` allows.
    pub fn best_locked_door_where(
        &self,
        from: Position,
        mut accept: impl FnMut(&Position) -> bool,
    ) -> Option<Position> {
        self.locked_doors
            .lock()
            .iter()
            .copied()
            .filter(|door| accept(door))
            .min_by_key(|door| (self.visit_count(*door), door.manhattan_distance(from)))
    }

    /// Renders the discovered bounding box, one glyph per cell and `?` for
    /// cells nobody has seen yet.
    pub fn export_ascii(&self) -> String {
        let tiles: Vec<DiscoveredTile> = self.tiles.iter().map(|entry| *entry.value()).collect();
        let Some(first) = tiles.first() else {
            return "Empty map".to_string();
        };

        let (mut min, mut max) = (first.position, first.position);
        for tile in &tiles {
            min.x = min.x.min(tile.position.x);
            min.y = min.y.min(tile.position.y);
            max.x = max.x.max(tile.position.x);
            max.y = max.y.max(tile.position.y);
        }
        let width = i64::from(max.x) - i64::from(min.x) + 1;
        let height = i64::from(max.y) - i64::from(min.y) + 1;
        let glyphs: HashMap<Position, char> = tiles
            .iter()
            .map(|tile| (tile.position, tile.kind.glyph()))
            .collect();

        let cells = usize::try_from((width + 1).saturating_mul(height)).unwrap_or(usize::MAX);
        let mut out = String::with_capacity(cells.min(1 << 16) + 64);
        out.push_str(&format!("Map ({width}x{height}) - {} tiles\n", tiles.len()));
        out.push('\n');
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                out.push(glyphs.get(&Position::new(x, y)).copied().unwrap_or('?'));
            }
            out.push('\n');
        }
        out
    }
}
