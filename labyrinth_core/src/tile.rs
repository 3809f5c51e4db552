use serde::{Deserialize, Serialize};

use crate::inventory::Inventory;
use crate::keymaster::DoorId;

/// What a crawler can observe about a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Room,
    Wall,
    /// Passable once unlocked; unlocking consumes the matching key.
    Door,
    /// Anything past the maze border. Never stored, only reported.
    Outside,
}

impl TileKind {
    /// Glyph used by the ASCII map export.
    pub fn glyph(self) -> char {
        match self {
            TileKind::Room => ' ',
            TileKind::Wall => '#',
            TileKind::Door => '/',
            TileKind::Outside => 'X',
        }
    }
}

/// A door lock tied to exactly one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Door {
    id: DoorId,
    locked: bool,
}

impl Door {
    pub fn locked(id: DoorId) -> Self {
        Door { id, locked: true }
    }

    pub fn id(&self) -> DoorId {
        self.id
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Tries to unlock the door with a key from `keyring`.
    ///
    /// Consumes the matching key on success; the door then stays open for
    /// everybody. An already open door takes nothing and returns `true`.
    pub fn open(&mut self, keyring: &mut Inventory) -> bool {
        if self.locked && keyring.take_key_for(self.id).is_some() {
            self.locked = false;
        }
        !self.locked
    }
}

/// Physical content of a labyrinth cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    Room(Inventory),
    Wall,
    Door(Door),
}

impl Default for Tile {
    fn default() -> Self {
        Tile::Room(Inventory::new())
    }
}

impl Tile {
    pub fn kind(&self) -> TileKind {
        match self {
            Tile::Room(_) => TileKind::Room,
            Tile::Wall => TileKind::Wall,
            Tile::Door(_) => TileKind::Door,
        }
    }

    pub fn is_traversable(&self) -> bool {
        match self {
            Tile::Room(_) => true,
            Tile::Wall => false,
            Tile::Door(door) => !door.is_locked(),
        }
    }

    /// Enters the tile, handing over whatever lies in it.
    pub fn pass(&mut self) -> Inventory {
        match self {
            Tile::Room(items) => std::mem::take(items),
            Tile::Wall | Tile::Door(_) => Inventory::new(),
        }
    }
}
