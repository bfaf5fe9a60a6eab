// sightline_protocol — wire protocol for multiplayer session communication.
//
// This crate defines the message types, framing, and serialization used by
// the session host (`sightline_net::host`) and game clients to communicate
// over TCP. It is shared between both sides and has no dependency on the
// simulation crate.
//
// Module overview:
// - `types.rs`:   Core newtypes — `PlayerIndex`, `ProjectileId`, `Weapon`.
// - `message.rs`: Client-to-host and host-to-client message enums, plus the
//                 shared payload structs (`PlayerUpdate`, `ProjectileSpawn`,
//                 `DamageEvent`, `SessionInfo`, `RosterEntry`).
// - `framing.rs`: Delimiter framing over a raw byte stream: each message is
//                 UTF-8 JSON text terminated by a random per-session token,
//                 plus the reserved `ping`/`{quit}` literals.
//
// Design decisions:
// - **JSON text on the wire.** Human-readable, serde-native, and the session
//   is a handful of small messages per tick — bandwidth is not the
//   bottleneck. Binary framing can be swapped in later if it ever is.
// - **Explicit tagged enums.** Each message is one enum variant, not a
//   key-presence union, so an unknown or truncated payload is rejected as a
//   whole instead of half-matching.
// - **No async runtime.** Framing operates on `&[u8]` chunks fed from plain
//   blocking reads, compatible with the thread-per-connection host.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{DELIMITER_LEN, FrameDecoder, PING, QUIT, encode_frame, random_delimiter};
pub use message::{
    ClientMessage, DamageEvent, PlayerSnapshot, PlayerUpdate, ProjectileSpawn, RosterEntry,
    ServerMessage, SessionInfo,
};
pub use types::{PlayerIndex, ProjectileId, Weapon};
