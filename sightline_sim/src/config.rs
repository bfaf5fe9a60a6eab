// Data-driven game configuration.
//
// All tunable simulation parameters live here in `GameConfig`, loadable from
// JSON. The sim never uses magic numbers — it reads from the config. Weapon
// tuning is grouped per weapon in `WeaponSpec` entries; `GameConfig::weapon`
// looks one up by the protocol's `Weapon` enum.
//
// Durations are measured in simulation ticks (the session runs a fixed-rate
// tick; see `sim.rs`). Distances are in world pixels on the 32-px tile grid.
//
// **Critical constraint: agreement.** Every participant in a session must run
// identical tuning, or mirrored projectiles drift from their owner's — the
// defaults below are the game's canonical values.

use serde::{Deserialize, Serialize};
use sightline_protocol::Weapon;

/// Per-weapon tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Ticks between attacks.
    pub fire_delay: f32,
    /// Ticks the attack animation frame stays up.
    pub attack_duration: f32,
    /// Rounds per magazine. Zero means the weapon needs no ammo.
    pub magazine: u32,
    /// Health subtracted per hit, in heart fractions.
    pub damage: f32,
    /// Projectile speed in px/tick. `None` for melee weapons, which spawn no
    /// projectile at all.
    pub projectile_speed: Option<f32>,
}

/// Player movement and survivability tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerParams {
    /// Movement speed per axis, px/tick.
    pub speed: f32,
    /// Starting (and maximum) health in hearts.
    pub max_health: f32,
    /// Side length of the square hitbox used for projectile overlap.
    pub hitbox: f32,
    /// Spawn position in tile coordinates.
    pub spawn_tile: (u32, u32),
}

/// Full simulation tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    pub player: PlayerParams,
    pub knife: WeaponSpec,
    pub pistol: WeaponSpec,
    pub rifle: WeaponSpec,
    /// Ticks a reload takes before the magazine refills.
    pub reload_ticks: u32,
    /// Distance from the player center at which a projectile spawns.
    pub muzzle_offset: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player: PlayerParams {
                speed: 1.0,
                max_health: 3.0,
                hitbox: 24.0,
                spawn_tile: (4, 3),
            },
            knife: WeaponSpec {
                fire_delay: 30.0,
                attack_duration: 10.0,
                magazine: 0,
                damage: 3.0,
                projectile_speed: None,
            },
            pistol: WeaponSpec {
                fire_delay: 10.0,
                attack_duration: 5.0,
                magazine: 10,
                damage: 1.0,
                projectile_speed: Some(30.0),
            },
            rifle: WeaponSpec {
                fire_delay: 20.0,
                attack_duration: 5.0,
                magazine: 30,
                damage: 0.5,
                // Rifle rounds travel at half pistol speed.
                projectile_speed: Some(15.0),
            },
            reload_ticks: 100,
            muzzle_offset: 30.0,
        }
    }
}

impl GameConfig {
    /// Parse a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Tuning for the given weapon.
    pub fn weapon(&self, weapon: Weapon) -> &WeaponSpec {
        match weapon {
            Weapon::Knife => &self.knife,
            Weapon::Pistol => &self.pistol,
            Weapon::Rifle => &self.rifle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_canonical_tuning() {
        let config = GameConfig::default();
        assert_eq!(config.weapon(Weapon::Knife).damage, 3.0);
        assert_eq!(config.weapon(Weapon::Pistol).damage, 1.0);
        assert_eq!(config.weapon(Weapon::Rifle).damage, 0.5);
        assert!(config.weapon(Weapon::Knife).projectile_speed.is_none());
        // Rifle rounds are slower but the magazine is three times deeper.
        assert_eq!(config.rifle.magazine, 3 * config.pistol.magazine);
    }

    #[test]
    fn json_overrides_roundtrip() {
        let json = serde_json::to_string(&GameConfig::default()).unwrap();
        let parsed = GameConfig::from_json(&json).unwrap();
        assert_eq!(parsed.player.speed, 1.0);
        assert_eq!(parsed.reload_ticks, 100);
    }
}
