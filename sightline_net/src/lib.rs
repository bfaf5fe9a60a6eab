// sightline_net — host/client synchronization for multiplayer sessions.
//
// One participant hosts: its process runs the authoritative roster and a
// relay loop next to its own simulation. Everyone else connects as a client,
// mirrors the broadcast state, and reports only what it owns (its transform
// and the hits it observed on itself). The host arbitrates damage and is the
// single writer of index assignment; everything else is writer-owned by the
// participant it describes and merely relayed.
//
// Module overview:
// - `roster.rs`:  Ordered participant roster with gap-free disconnect
//                 renumbering. Canonical on the host, mirrored on clients.
// - `session.rs`: The host's lock-guarded canonical state — peers, bullet
//                 lists, damage arbitration, the `State` fan-out, and the
//                 connection lifecycle.
// - `host.rs`:    Listener/accept loop, per-connection handshake + reader
//                 threads, and the fixed-rate tick loop (`host_tick`).
// - `client.rs`:  Probe/join handshake, the background receive thread, and
//                 the per-tick client driver (`client_tick`).
// - `error.rs`:   Typed, user-displayable session-setup and join-validation
//                 errors.
//
// Trust boundary: damage is client-reported and host-arbitrated. The host
// commits and rebroadcasts hit events but does not re-verify the collision,
// so a compromised client could report damage it never took.
// There is also no idle-connection timeout; a silent peer is only noticed
// when a read or write against its socket fails.

pub mod client;
pub mod error;
pub mod host;
pub mod roster;
pub mod session;

pub use client::{NetClient, build_simulation, client_tick, validate_join};
pub use error::{JoinValidationError, SessionSetupError};
pub use host::{HostConfig, HostHandle, host_tick, run_host_loop, start_host};
pub use roster::Roster;
pub use session::{ConnectionId, ConnectionState, Session, SessionEvent};
