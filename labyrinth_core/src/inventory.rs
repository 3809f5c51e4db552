use serde::{Deserialize, Serialize};

use crate::keymaster::DoorId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// The selector does not describe the source inventory. This is a caller
    /// bug, the transfer is refused and nothing moves.
    #[error("Move selector has {selector} entries but the source inventory holds {source_len} items")]
    SelectorMismatch { selector: usize, source_len: usize },
    #[error("Source inventory is empty")]
    Empty,
}

/// A key minted for exactly one door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    door: DoorId,
}

impl Key {
    pub(crate) fn new(door: DoorId) -> Self {
        Key { door }
    }

    /// The door this key opens.
    pub fn door(&self) -> DoorId {
        self.door
    }
}

/// Ordered collection of items carried by a crawler or lying in a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<Key>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: Key) -> Self {
        Inventory { items: vec![key] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Key] {
        &self.items
    }

    pub fn push(&mut self, key: Key) {
        self.items.push(key);
    }

    /// Moves every item of `from` whose selector entry is `true` into this
    /// inventory, keeping their relative order.
    ///
    /// The selector must have exactly one entry per item of `from`; otherwise
    /// neither inventory is touched. Returns the number of items moved.
    pub fn try_move_items_from(
        &mut self,
        from: &mut Inventory,
        selector: &[bool],
    ) -> Result<usize, InventoryError> {
        if selector.len() != from.items.len() {
            return Err(InventoryError::SelectorMismatch {
                selector: selector.len(),
                source_len: from.items.len(),
            });
        }

        let mut kept = Vec::with_capacity(from.items.len());
        let mut moved = 0;
        for (item, take) in from.items.drain(..).zip(selector) {
            if *take {
                self.items.push(item);
                moved += 1;
            } else {
                kept.push(item);
            }
        }
        from.items = kept;
        Ok(moved)
    }

    /// Moves the first item of `from` into this inventory.
    pub fn move_first(&mut self, from: &mut Inventory) -> Result<(), InventoryError> {
        if from.is_empty() {
            return Err(InventoryError::Empty);
        }
        let selector: Vec<bool> = (0..from.len()).map(|i| i == 0).collect();
        self.try_move_items_from(from, &selector).map(|_| ())
    }

    /// Removes and returns the key that opens `door`, if carried.
    pub fn take_key_for(&mut self, door: DoorId) -> Option<Key> {
        let index = self.items.iter().position(|key| key.door == door)?;
        Some(self.items.remove(index))
    }
}
