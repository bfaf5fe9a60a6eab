// The simulation driven by the protocol layer.
//
// `Simulation` owns the local player, a mirror slot for every remote
// participant, and the map. The network layer drives it through four
// operations, once per tick:
//
// - `tick(input, dt)` — advance the world; returns the local delta to report,
//   any victim-observed damage events, and the projectile ids that expired.
// - `apply_remote_state(index, update)` — overwrite a peer's mirror.
// - `apply_damage(event)` — apply an arbitrated damage outcome. Projectile
//   removal is the idempotency gate: if the id is already gone the event is
//   a duplicate and changes nothing.
// - `remove_participant(index)` — drop a peer and renumber the slots above.
//
// Mirror slots are indexed by roster index; the local player's slot stays
// empty. Hit detection is victim-side: this process only ever reports
// overlaps between *its own* hitbox and an opponent's projectile — it never
// judges hits on anyone else. Health may go below zero; crossing zero latches
// the terminal `defeated` state for the local participant only.

use sightline_protocol::{DamageEvent, PlayerIndex, PlayerUpdate, ProjectileId};

use crate::config::GameConfig;
use crate::map::MapGrid;
use crate::player::{InputState, LocalPlayer, RemotePlayer};

pub struct Simulation {
    config: GameConfig,
    map: MapGrid,
    local_index: PlayerIndex,
    local: LocalPlayer,
    remotes: Vec<Option<RemotePlayer>>,
    defeated: bool,
}

/// Everything one tick produces for the network layer.
pub struct TickOutput {
    /// The local player's delta (center, rotation, weapon, frame, health,
    /// team, freshly spawned projectiles).
    pub state: PlayerUpdate,
    /// Hits observed on the local player this tick, for host arbitration.
    pub damage: Vec<DamageEvent>,
    /// Projectiles that expired locally, for pruning shared bullet lists.
    pub expired: Vec<(PlayerIndex, ProjectileId)>,
}

impl Simulation {
    pub fn new(config: GameConfig, map: MapGrid, team: &str, local_index: PlayerIndex) -> Self {
        let local = LocalPlayer::new(&config, team);
        let mut remotes = Vec::new();
        remotes.resize_with(local_index.slot() + 1, || None);
        Self {
            config,
            map,
            local_index,
            local,
            remotes,
            defeated: false,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn map(&self) -> &MapGrid {
        &self.map
    }

    pub fn local_index(&self) -> PlayerIndex {
        self.local_index
    }

    /// Ensure a mirror slot exists for a participant that just joined.
    pub fn add_participant(&mut self, index: PlayerIndex) {
        if index.slot() >= self.remotes.len() {
            self.remotes.resize_with(index.slot() + 1, || None);
        }
        if index != self.local_index && self.remotes[index.slot()].is_none() {
            self.remotes[index.slot()] = Some(RemotePlayer::new(&self.config));
        }
    }

    /// Advance the world one tick.
    pub fn tick(&mut self, input: &InputState, dt: f32) -> TickOutput {
        let walls = &self.map.walls;
        self.local.update(input, dt, &self.config, walls);

        let mut expired = Vec::new();
        for id in self.local.update_projectiles(dt, walls) {
            expired.push((self.local_index, id));
        }
        for (slot, remote) in self.remotes.iter_mut().enumerate() {
            if let Some(remote) = remote {
                for id in remote.update_projectiles(dt, walls) {
                    expired.push((PlayerIndex(slot as u32), id));
                }
            }
        }

        let damage = self.detect_hits();

        TickOutput {
            state: self.local.make_update(),
            damage,
            expired,
        }
    }

    /// Victim-side hit test: opponent projectiles overlapping our hitbox.
    /// Each projectile reports at most once (it is claimed until the
    /// arbitrated outcome removes it).
    fn detect_hits(&mut self) -> Vec<DamageEvent> {
        let hitbox = self.local.hitbox(&self.config);
        let mut events = Vec::new();
        for (slot, remote) in self.remotes.iter_mut().enumerate() {
            let Some(remote) = remote else { continue };
            for projectile in &mut remote.projectiles {
                if projectile.can_hit() && hitbox.contains(projectile.center) {
                    projectile.claim();
                    events.push(DamageEvent {
                        shooter: PlayerIndex(slot as u32),
                        projectile: projectile.id,
                        amount: projectile.damage,
                        victim: self.local_index,
                    });
                }
            }
        }
        events
    }

    /// Overwrite a peer's mirror from a state delta. Updates for the local
    /// player or an unknown slot are ignored — the caller decides whether
    /// that is worth logging.
    pub fn apply_remote_state(&mut self, index: PlayerIndex, update: &PlayerUpdate) {
        if index == self.local_index {
            return;
        }
        if let Some(Some(remote)) = self.remotes.get_mut(index.slot()) {
            remote.apply_update(update);
        }
    }

    /// Apply an arbitrated damage outcome. Returns whether the projectile
    /// was still live — `false` means a duplicate or already-expired event,
    /// which must change no health anywhere.
    pub fn apply_damage(&mut self, event: &DamageEvent) -> bool {
        let removed = if event.shooter == self.local_index {
            self.local.remove_projectile(event.projectile)
        } else {
            match self.remotes.get_mut(event.shooter.slot()) {
                Some(Some(remote)) => remote.remove_projectile(event.projectile),
                _ => false,
            }
        };
        if !removed {
            return false;
        }

        if event.victim == self.local_index {
            self.local.health -= event.amount;
            if self.local.health <= 0.0 {
                self.defeated = true;
            }
        } else if let Some(Some(remote)) = self.remotes.get_mut(event.victim.slot()) {
            remote.health -= event.amount;
        }
        true
    }

    /// Drop a participant and shift every slot above it down by one,
    /// adjusting our own index if it was above the removed one.
    pub fn remove_participant(&mut self, index: PlayerIndex) {
        if index == self.local_index || index.slot() >= self.remotes.len() {
            return;
        }
        self.remotes.remove(index.slot());
        if index < self.local_index {
            self.local_index.0 -= 1;
        }
    }

    /// Terminal loss condition for the local participant. Latched once
    /// health crosses zero (0 and −3 are the same outcome).
    pub fn is_defeated(&self) -> bool {
        self.defeated
    }

    pub fn health(&self) -> f32 {
        self.local.health
    }

    /// HUD state: current weapon and (rounds left, magazine capacity).
    pub fn loadout(&self) -> (sightline_protocol::Weapon, (u32, u32)) {
        (self.local.weapon, self.local.ammo(&self.config))
    }

    /// A remote mirror, for rendering and tests.
    pub fn remote(&self, index: PlayerIndex) -> Option<&RemotePlayer> {
        self.remotes.get(index.slot()).and_then(Option::as_ref)
    }

    /// The local player's in-flight projectiles, for rendering and tests.
    pub fn local_projectiles(&self) -> &[crate::projectile::Projectile] {
        &self.local.projectiles
    }
}
