// Protocol messages for client-host communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by game clients to the session host.
// - `ServerMessage`: sent by the session host to game clients.
//
// Every variant is an explicit serde-tagged discriminant rather than a
// key-presence union, so a malformed or truncated payload fails to parse as a
// whole instead of silently matching the wrong shape. Two variants bypass
// JSON entirely and encode to reserved wire literals (see `framing.rs`):
// `Ping` (liveness probe sent before committing to a join) and `Quit`
// (explicit graceful disconnect, distinguishable from an abrupt socket
// close). `to_wire`/`from_wire` handle the literal special-casing so callers
// never match on raw strings.
//
// Supporting structs (`PlayerUpdate`, `ProjectileSpawn`, `DamageEvent`,
// `SessionInfo`) are shared by both directions: a client's `Update` carries
// the same `PlayerUpdate` the host fans back out inside `State`.

use serde::{Deserialize, Serialize};

use crate::framing::{PING, QUIT};
use crate::types::{PlayerIndex, ProjectileId, Weapon};

/// Messages sent by a client to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Handshake reply: the joiner's identity.
    Hello { name: String, team: String },
    /// Per-tick delta for the local player.
    Update { state: PlayerUpdate },
    /// Victim-observed hit, submitted for host arbitration.
    Damage(DamageEvent),
    /// Confirms the client's own index after a renumbering.
    IndexChanged { index: PlayerIndex },
    /// Liveness probe; never results in a roster entry.
    Ping,
    /// Graceful disconnect.
    Quit,
}

/// Messages sent by the host to game clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Handshake bootstrap, sent once per accepted connection.
    Session(SessionInfo),
    /// A new participant completed its handshake.
    Joined { entry: RosterEntry },
    /// Per-tick world state: every participant's delta, ordered by index.
    State { players: Vec<PlayerSnapshot> },
    /// Host-arbitrated damage outcome, rebroadcast verbatim.
    Damage(DamageEvent),
    /// A participant left; every index above it shifts down by one.
    Disconnect { index: PlayerIndex },
    /// Host is tearing the session down.
    Quit,
}

impl ClientMessage {
    /// Encode to the wire payload (reserved literal or tagged JSON).
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Ping => Ok(PING.to_owned()),
            Self::Quit => Ok(QUIT.to_owned()),
            other => serde_json::to_string(other),
        }
    }

    /// Decode one delimited segment (reserved literal or tagged JSON).
    pub fn from_wire(segment: &str) -> Result<Self, serde_json::Error> {
        match segment {
            PING => Ok(Self::Ping),
            QUIT => Ok(Self::Quit),
            _ => serde_json::from_str(segment),
        }
    }
}

impl ServerMessage {
    /// Encode to the wire payload (reserved literal or tagged JSON).
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Quit => Ok(QUIT.to_owned()),
            other => serde_json::to_string(other),
        }
    }

    /// Decode one delimited segment (reserved literal or tagged JSON).
    pub fn from_wire(segment: &str) -> Result<Self, serde_json::Error> {
        match segment {
            QUIT => Ok(Self::Quit),
            _ => serde_json::from_str(segment),
        }
    }
}

/// A projectile spawned this tick, relayed so every peer simulates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    pub id: ProjectileId,
    /// Unit direction of travel.
    pub direction: (f32, f32),
    pub origin: (f32, f32),
    pub speed: f32,
    pub damage: f32,
}

/// One participant's per-tick delta: transform, weapon, animation, health,
/// and any projectiles fired since the previous tick.
///
/// `health` here is the owner's *reported* value; the authoritative copy
/// lives on the host and is corrected by `Damage` messages, which consumers
/// apply after state updates within the same tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub center: (f32, f32),
    pub rotation: f32,
    pub weapon: Weapon,
    pub frame: u8,
    pub health: f32,
    pub team: String,
    pub projectiles: Vec<ProjectileSpawn>,
}

/// A `PlayerUpdate` tagged with its roster index, as broadcast in `State`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub index: PlayerIndex,
    pub state: PlayerUpdate,
}

/// Victim-observed hit: `victim`'s process saw `shooter`'s projectile overlap
/// its hitbox. The host commits the outcome (projectile removal + health
/// loss) and rebroadcasts the event unchanged. Removal of `projectile` is
/// the idempotency gate — a duplicate event whose projectile is already gone
/// applies no health change.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    pub shooter: PlayerIndex,
    pub projectile: ProjectileId,
    pub amount: f32,
    pub victim: PlayerIndex,
}

/// Public identity of one participant, as carried in the roster snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub index: PlayerIndex,
    pub name: String,
    pub team: String,
}

/// Handshake bootstrap sent by the host immediately after accepting a
/// connection. Carries everything a prospective joiner needs to validate a
/// join before committing (team list, taken names) and everything a joining
/// client needs to enter steady state (map, framing delimiter, assigned
/// index, roster snapshot).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub host_name: String,
    pub teams: Vec<String>,
    pub map: String,
    pub delimiter: String,
    pub assigned_index: PlayerIndex,
    pub roster: Vec<RosterEntry>,
}

impl SessionInfo {
    /// Names already present in the session, for join validation.
    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.roster.iter().map(|e| e.name.as_str())
    }
}
