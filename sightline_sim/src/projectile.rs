// Projectile motion and lifecycle.
//
// A projectile is owned by the participant that fired it and lives in that
// owner's bullet list on every peer. Its id is assigned by the owner at spawn
// and is how damage arbitration refers to it; position is simulated locally
// on each peer from the spawn parameters.
//
// Lifecycle: flying → (wall impact) → fading → dead, or removed outright by
// an arbitrated damage event. A projectile that a victim has already reported
// as a hit is *claimed*: it stops producing hits but keeps flying until the
// host's damage broadcast removes it (or it expires on its own, in which case
// the eventual damage event becomes a no-op).

use sightline_protocol::{ProjectileId, ProjectileSpawn};

use crate::geom::Rect;

/// Per-axis displacement cap in px/tick, so a hitch never tunnels a
/// projectile through a wall.
pub const MAX_STEP: f32 = 33.0;

const IMPACT_FRAMES: u8 = 3;
const IMPACT_FRAME_TICKS: f32 = 10.0;

/// Upper bound on wall back-out steps; keeps a degenerate direction from
/// looping forever.
const MAX_BACKOUT: u32 = 64;

#[derive(Clone, Debug)]
pub struct Projectile {
    pub id: ProjectileId,
    pub center: (f32, f32),
    pub damage: f32,
    direction: (f32, f32),
    velocity: (f32, f32),
    collided: bool,
    claimed: bool,
    frame: u8,
    frame_count: f32,
    dead: bool,
}

impl Projectile {
    pub fn from_spawn(spawn: &ProjectileSpawn) -> Self {
        Self {
            id: spawn.id,
            center: spawn.origin,
            damage: spawn.damage,
            direction: spawn.direction,
            velocity: (
                spawn.direction.0 * spawn.speed,
                spawn.direction.1 * spawn.speed,
            ),
            collided: false,
            claimed: false,
            frame: 0,
            frame_count: 0.0,
            dead: false,
        }
    }

    /// Advance one tick: fly and test walls, or run the impact animation.
    pub fn update(&mut self, dt: f32, walls: &[Rect]) {
        if self.dead {
            return;
        }
        if !self.collided {
            self.center = (
                self.center.0 + (self.velocity.0 * dt).clamp(-MAX_STEP, MAX_STEP),
                self.center.1 + (self.velocity.1 * dt).clamp(-MAX_STEP, MAX_STEP),
            );
            for wall in walls {
                if wall.contains(self.center) {
                    // Back the projectile out to the wall face it entered.
                    let mut steps = 0;
                    while wall.contains(self.center) && steps < MAX_BACKOUT {
                        self.center = (
                            self.center.0 - self.direction.0 * dt,
                            self.center.1 - self.direction.1 * dt,
                        );
                        steps += 1;
                    }
                    self.collided = true;
                    break;
                }
            }
        } else {
            self.frame_count += dt;
            if self.frame_count >= IMPACT_FRAME_TICKS {
                self.frame_count = 0.0;
                self.frame += 1;
                if self.frame == IMPACT_FRAMES {
                    self.dead = true;
                }
            }
        }
    }

    /// Whether this projectile can still injure a player.
    pub fn can_hit(&self) -> bool {
        !self.collided && !self.claimed && !self.dead
    }

    /// Mark as reported-hit so the same overlap is not reported every tick
    /// while arbitration is in flight.
    pub fn claim(&mut self) {
        self.claimed = true;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

/// Advance every projectile in a list and prune the dead ones, returning
/// their ids so the caller can drop them from any shared bookkeeping.
pub fn update_projectiles(
    projectiles: &mut Vec<Projectile>,
    dt: f32,
    walls: &[Rect],
) -> Vec<ProjectileId> {
    let mut expired = Vec::new();
    for p in projectiles.iter_mut() {
        p.update(dt, walls);
        if p.is_dead() {
            expired.push(p.id);
        }
    }
    projectiles.retain(|p| !p.is_dead());
    expired
}
