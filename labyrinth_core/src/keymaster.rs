//! Door/key pairing authority used while a labyrinth is assembled.
//!
//! Every door handed out must end up with exactly one key sitting in a key
//! room, and every key room must hold a key. Pairing is first-in-first-out
//! in whichever order doors and rooms are declared. The balance is only
//! checked by [`Keymaster::finalize`], once the whole maze is declared.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::inventory::{Inventory, Key};

/// Identifies a door created by a [`Keymaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DoorId(pub(crate) u32);

/// Identifies a key room created by a [`Keymaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub(crate) u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeymasterError {
    #[error("Unbalanced maze: {doors} doors created but {keys} keys placed ({empty_rooms} key rooms left empty)")]
    Unbalanced {
        doors: usize,
        keys: usize,
        empty_rooms: usize,
    },
}

#[derive(Debug, Default)]
struct Ledger {
    doors_created: u32,
    rooms_created: u32,
    unmatched_doors: VecDeque<DoorId>,
    empty_rooms: VecDeque<RoomId>,
    placements: HashMap<RoomId, Key>,
}

impl Ledger {
    fn place(&mut self, room: RoomId, door: DoorId) {
        self.placements.insert(room, Key::new(door));
    }
}

#[derive(Debug, Default)]
pub struct Keymaster {
    ledger: Mutex<Ledger>,
    finalized: bool,
}

impl Keymaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new door. Its key goes to the oldest key room still waiting
    /// for one, or to the next key room declared.
    pub fn new_door(&self) -> DoorId {
        let mut ledger = self.ledger.lock();
        let door = DoorId(ledger.doors_created);
        ledger.doors_created += 1;
        match ledger.empty_rooms.pop_front() {
            Some(room) => ledger.place(room, door),
            None => ledger.unmatched_doors.push_back(door),
        }
        door
    }

    /// Declares a new key room, filling it with the key of the oldest door
    /// still lacking one.
    pub fn new_key_room(&self) -> RoomId {
        let mut ledger = self.ledger.lock();
        let room = RoomId(ledger.rooms_created);
        ledger.rooms_created += 1;
        match ledger.unmatched_doors.pop_front() {
            Some(door) => ledger.place(room, door),
            None => ledger.empty_rooms.push_back(room),
        }
        room
    }

    /// The key currently assigned to `room`, if any.
    pub fn key_in(&self, room: RoomId) -> Option<Key> {
        self.ledger.lock().placements.get(&room).copied()
    }

    /// Checks that every door got a key and every key room got a door, and
    /// hands out the final placements. An unbalanced maze is a construction
    /// bug and cannot be used.
    pub fn finalize(mut self) -> Result<KeyPlacements, KeymasterError> {
        self.finalized = true;
        let ledger = std::mem::take(&mut *self.ledger.lock());
        let doors = ledger.doors_created as usize;
        let keys = ledger.placements.len();
        if doors != keys || !ledger.empty_rooms.is_empty() {
            return Err(KeymasterError::Unbalanced {
                doors,
                keys,
                empty_rooms: ledger.empty_rooms.len(),
            });
        }
        Ok(KeyPlacements {
            placements: ledger.placements,
        })
    }
}

impl Drop for Keymaster {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let ledger = self.ledger.lock();
        if !ledger.unmatched_doors.is_empty() || !ledger.empty_rooms.is_empty() {
            error!(
                unmatched_doors = ledger.unmatched_doors.len(),
                empty_rooms = ledger.empty_rooms.len(),
                "keymaster dropped without finalize on an unbalanced maze"
            );
        }
    }
}

/// Validated room to key assignments produced by [`Keymaster::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPlacements {
    placements: HashMap<RoomId, Key>,
}

impl KeyPlacements {
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Removes the key destined for `room` and returns it as the room's content.
    pub fn take_room_content(&mut self, room: RoomId) -> Inventory {
        self.placements
            .remove(&room)
            .map(Inventory::with_key)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Door;

    fn open_with_room_key(keymaster: &Keymaster, door: DoorId, room: RoomId) -> bool {
        let mut keyring = keymaster.key_in(room).map(Inventory::with_key).unwrap_or_default();
        Door::locked(door).open(&mut keyring)
    }

    #[test]
    fn single_door_then_room_assigns_key() {
        let keymaster = Keymaster::new();
        let door = keymaster.new_door();
        let room = keymaster.new_key_room();

        assert_eq!(keymaster.key_in(room).map(|k| k.door()), Some(door));
        assert!(open_with_room_key(&keymaster, door, room));
        assert_eq!(keymaster.finalize().unwrap().len(), 1);
    }

    #[test]
    fn doors_then_rooms_pair_in_order() {
        let keymaster = Keymaster::new();
        let doors: Vec<_> = (0..3).map(|_| keymaster.new_door()).collect();
        let rooms: Vec<_> = (0..3).map(|_| keymaster.new_key_room()).collect();

        for (door, room) in doors.iter().zip(&rooms) {
            assert!(open_with_room_key(&keymaster, *door, *room));
        }
        assert!(keymaster.finalize().is_ok());
    }

    #[test]
    fn mixed_order_assigns_every_key() {
        let keymaster = Keymaster::new();
        let r0 = keymaster.new_key_room();
        let d0 = keymaster.new_door();
        let d1 = keymaster.new_door();
        let r1 = keymaster.new_key_room();
        let r2 = keymaster.new_key_room();
        let d2 = keymaster.new_door();

        for (door, room) in [(d0, r0), (d1, r1), (d2, r2)] {
            assert!(open_with_room_key(&keymaster, door, room));
        }
        assert!(keymaster.finalize().is_ok());
    }

    #[test]
    fn key_from_another_room_does_not_open() {
        let keymaster = Keymaster::new();
        let d0 = keymaster.new_door();
        let d1 = keymaster.new_door();
        let _r0 = keymaster.new_key_room();
        let r1 = keymaster.new_key_room();

        assert!(!open_with_room_key(&keymaster, d0, r1));
        assert!(open_with_room_key(&keymaster, d1, r1));
    }

    #[test]
    fn unmatched_door_fails_finalize() {
        let keymaster = Keymaster::new();
        keymaster.new_door();

        assert_eq!(
            keymaster.finalize(),
            Err(KeymasterError::Unbalanced {
                doors: 1,
                keys: 0,
                empty_rooms: 0
            })
        );
    }

    #[test]
    fn empty_key_room_fails_finalize() {
        let keymaster = Keymaster::new();
        keymaster.new_door();
        keymaster.new_key_room();
        keymaster.new_key_room();

        assert!(matches!(
            keymaster.finalize(),
            Err(KeymasterError::Unbalanced { empty_rooms: 1, .. })
        ));
    }

    #[test]
    fn no_doors_no_rooms_is_balanced() {
        assert!(Keymaster::new().finalize().unwrap().is_empty());
    }

    #[test]
    fn placements_hand_out_room_contents_once() {
        let keymaster = Keymaster::new();
        let door = keymaster.new_door();
        let room = keymaster.new_key_room();
        let mut placements = keymaster.finalize().unwrap();

        let content = placements.take_room_content(room);
        assert_eq!(content.items(), &[Key::new(door)]);
        assert!(placements.take_room_content(room).is_empty());
    }
}
