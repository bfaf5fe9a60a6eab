// sightline_sim — the top-down arena simulation.
//
// Everything the game world does between network messages lives here:
// player movement and wall collision, weapon cooldowns / ammo / reload,
// projectile flight, and victim-side hit detection. The crate has no
// knowledge of sockets or threads — `sightline_net` drives a `Simulation`
// once per tick and forwards what it returns.
//
// Module overview:
// - `config.rs`:     Data-driven tuning (`GameConfig`, `WeaponSpec`),
//                    loadable from JSON; the defaults are canonical.
// - `geom.rs`:       Axis-aligned `Rect` collision and vector helpers.
// - `map.rs`:        CSV tile maps reduced to merged wall rectangles, plus
//                    the built-in `arena` map resolved by identifier.
// - `projectile.rs`: Projectile flight, wall impact, fade-out, and the
//                    claimed state used by hit reporting.
// - `player.rs`:     `LocalPlayer` (authoritative, input-driven) and
//                    `RemotePlayer` (eventually-consistent mirror).
// - `sim.rs`:        The `Simulation` facade the network layer drives:
//                    `tick`, `apply_remote_state`, `apply_damage`,
//                    `remove_participant`.
//
// Rendering, sprite animation beyond the frame index, and shadow casting are
// deliberately absent — this crate stops at state the wire protocol carries.

pub mod config;
pub mod geom;
pub mod map;
pub mod player;
pub mod projectile;
pub mod sim;

pub use config::{GameConfig, PlayerParams, WeaponSpec};
pub use geom::Rect;
pub use map::{MapGrid, TILE};
pub use player::{InputState, LocalPlayer, RemotePlayer, WeaponSelect};
pub use projectile::Projectile;
pub use sim::{Simulation, TickOutput};
