// Core ID types for the multiplayer protocol.
//
// These are lightweight newtypes shared by `message.rs` (wire messages), the
// simulation crate, and the host's session bookkeeping. Both serialize
// transparently as their inner integer, so the wire stays compact.

use serde::{Deserialize, Serialize};

/// Roster position of a participant. Index 0 is always the host's own local
/// player; remote players occupy 1..N in join order. Indices are renumbered
/// downward when a participant below them disconnects, so a `PlayerIndex` is
/// only stable between disconnect events — never store one across them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerIndex(pub u32);

impl PlayerIndex {
    /// Roster slot as a `Vec` index.
    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Per-owner monotonic projectile id, assigned by the firing participant's
/// own process at spawn time. Damage events reference `(shooter, id)` — never
/// a positional slot — so removal stays well-defined under concurrent
/// spawn/expiry on different peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId(pub u64);

/// The three weapons a participant can hold. Part of every state delta so
/// remote mirrors render the correct sprite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weapon {
    Knife,
    Pistol,
    Rifle,
}
