use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::shared_map::SharedMap;
use crate::tile::TileKind;
use crate::{Direction, Position};

/// Pending-cell limit after which a search gives up.
pub const DEFAULT_FRONTIER_CAP: usize = 2000;

/// Breadth-first search over the cells `map` already knows.
///
/// Unknown cells and walls are impassable, and so is any door currently
/// registered as locked unless it is `target` itself. Neighbours are tried
/// North, East, South, West, so equally short paths resolve the same way
/// every time. The search is abandoned, returning `None`, whenever
/// `frontier_cap` cells are pending before the next dequeue.
pub fn find_path(
    map: &SharedMap,
    start: Position,
    target: Position,
    frontier_cap: usize,
) -> Option<Vec<Direction>> {
    let mut frontier = VecDeque::from([start]);
    let mut came_from: HashMap<Position, (Position, Direction)> = HashMap::new();
    came_from.insert(start, (start, Direction::North));

    loop {
        if frontier.len() >= frontier_cap {
            trace!(%start, %target, frontier_cap, "path search abandoned");
            return None;
        }
        let current = frontier.pop_front()?;
        if current == target {
            return Some(reconstruct(&came_from, start, target));
        }

        for direction in Direction::ALL {
            let neighbor = current.step(direction);
            if came_from.contains_key(&neighbor) || !is_passable(map, neighbor, target) {
                continue;
            }
            came_from.insert(neighbor, (current, direction));
            frontier.push_back(neighbor);
        }
    }
}

fn is_passable(map: &SharedMap, position: Position, target: Position) -> bool {
    match map.tile_info(position).map(|tile| tile.kind) {
        None | Some(TileKind::Wall) => false,
        Some(TileKind::Door) => position == target || !map.is_door_locked(position),
        Some(TileKind::Room | TileKind::Outside) => true,
    }
}

fn reconstruct(
    came_from: &HashMap<Position, (Position, Direction)>,
    start: Position,
    target: Position,
) -> Vec<Direction> {
    let mut path = Vec::new();
    let mut current = target;
    while current != start {
        let (previous, direction) = came_from[&current];
        path.push(direction);
        current = previous;
    }
    path.reverse();
    path
}
