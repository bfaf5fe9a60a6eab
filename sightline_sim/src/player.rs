// Local and remote player entities.
//
// `LocalPlayer` is the entity this process simulates authoritatively: it
// consumes an `InputState` every tick, moves with axis-separated wall
// collision, manages weapon cooldowns / ammo / reload, and spawns
// projectiles. `RemotePlayer` is an eventually-consistent mirror of a peer:
// its transform and weapon come verbatim from incoming state deltas, and only
// its projectiles are simulated locally (so the victim-side hit test has
// positions to work with).
//
// Distances are px, durations are ticks, rotation is degrees in sprite
// screen-space (negated atan2, y-down).

use sightline_protocol::{PlayerUpdate, ProjectileId, ProjectileSpawn, Weapon};

use crate::config::GameConfig;
use crate::geom::{Rect, normalize};
use crate::map::TILE;
use crate::projectile::{Projectile, update_projectiles};

/// One tick's worth of local input, produced by the (external) input layer.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Trigger held down — fires automatics.
    pub fire_held: bool,
    /// Trigger freshly pressed this tick — fires semi-autos and melee.
    pub fire_pressed: bool,
    pub reload: bool,
    pub switch: Option<WeaponSelect>,
    /// Aim point in world px.
    pub aim: (f32, f32),
}

/// Weapon selection input: direct slot keys or scroll wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeaponSelect {
    Slot1,
    Slot2,
    Slot3,
    WheelUp,
    WheelDown,
}

impl WeaponSelect {
    /// The weapon this selection lands on from `current`, if any.
    /// Slots are 1 = rifle, 2 = pistol, 3 = knife; the wheel steps between
    /// neighbors and stops at both ends.
    pub fn resolve(self, current: Weapon) -> Option<Weapon> {
        match self {
            Self::Slot1 => Some(Weapon::Rifle),
            Self::Slot2 => Some(Weapon::Pistol),
            Self::Slot3 => Some(Weapon::Knife),
            Self::WheelUp => match current {
                Weapon::Pistol => Some(Weapon::Rifle),
                Weapon::Knife => Some(Weapon::Pistol),
                Weapon::Rifle => None,
            },
            Self::WheelDown => match current {
                Weapon::Rifle => Some(Weapon::Pistol),
                Weapon::Pistol => Some(Weapon::Knife),
                Weapon::Knife => None,
            },
        }
    }
}

/// The participant this process owns.
pub struct LocalPlayer {
    pub center: (f32, f32),
    pub rotation: f32,
    pub weapon: Weapon,
    pub frame: u8,
    pub health: f32,
    pub team: String,
    pub projectiles: Vec<Projectile>,
    pistol_rounds: u32,
    rifle_rounds: u32,
    delay_count: f32,
    attack_count: f32,
    can_attack: bool,
    reloading: bool,
    reload_count: f32,
    next_projectile: u64,
    pending_spawns: Vec<ProjectileSpawn>,
}

impl LocalPlayer {
    pub fn new(config: &GameConfig, team: &str) -> Self {
        Self {
            center: spawn_px(config),
            rotation: 0.0,
            weapon: Weapon::Pistol,
            frame: 0,
            health: config.player.max_health,
            team: team.to_owned(),
            projectiles: Vec::new(),
            pistol_rounds: config.pistol.magazine,
            rifle_rounds: config.rifle.magazine,
            delay_count: 0.0,
            attack_count: 0.0,
            can_attack: true,
            reloading: false,
            reload_count: 0.0,
            next_projectile: 0,
            pending_spawns: Vec::new(),
        }
    }

    /// Advance one tick: timers, weapon switching, movement with wall
    /// collision, rotation toward the aim point, and firing.
    pub fn update(&mut self, input: &InputState, dt: f32, config: &GameConfig, walls: &[Rect]) {
        self.tick_reload(dt, config);
        self.tick_cooldowns(dt, config);

        if let Some(select) = input.switch {
            self.switch_weapon(select);
        }
        if input.reload && self.weapon != Weapon::Knife && !self.reloading {
            self.reloading = true;
            self.reload_count = 0.0;
        }

        self.step_movement(input, dt, config, walls);
        self.rotation = aim_rotation(self.center, input.aim);

        if input.fire_held || input.fire_pressed {
            self.attack(input, config);
        }
    }

    /// Advance this player's projectiles; returns the ids that expired.
    pub fn update_projectiles(&mut self, dt: f32, walls: &[Rect]) -> Vec<ProjectileId> {
        update_projectiles(&mut self.projectiles, dt, walls)
    }

    /// The per-tick delta to report, draining projectiles spawned since the
    /// last call.
    pub fn make_update(&mut self) -> PlayerUpdate {
        PlayerUpdate {
            center: self.center,
            rotation: self.rotation,
            weapon: self.weapon,
            frame: self.frame,
            health: self.health,
            team: self.team.clone(),
            projectiles: std::mem::take(&mut self.pending_spawns),
        }
    }

    /// Remove a projectile by id (arbitrated damage landed, or duplicate).
    pub fn remove_projectile(&mut self, id: ProjectileId) -> bool {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.id != id);
        self.projectiles.len() != before
    }

    /// Rounds left in the current magazine and its capacity.
    pub fn ammo(&self, config: &GameConfig) -> (u32, u32) {
        match self.weapon {
            Weapon::Knife => (0, 0),
            Weapon::Pistol => (self.pistol_rounds, config.pistol.magazine),
            Weapon::Rifle => (self.rifle_rounds, config.rifle.magazine),
        }
    }

    pub fn hitbox(&self, config: &GameConfig) -> Rect {
        Rect::from_center(self.center, config.player.hitbox, config.player.hitbox)
    }

    fn tick_reload(&mut self, dt: f32, config: &GameConfig) {
        if !self.reloading {
            return;
        }
        self.reload_count += dt;
        if self.reload_count >= config.reload_ticks as f32 {
            match self.weapon {
                Weapon::Pistol => self.pistol_rounds = config.pistol.magazine,
                Weapon::Rifle => self.rifle_rounds = config.rifle.magazine,
                Weapon::Knife => {}
            }
            self.reloading = false;
            self.reload_count = 0.0;
        }
    }

    fn tick_cooldowns(&mut self, dt: f32, config: &GameConfig) {
        let spec = config.weapon(self.weapon);
        if !self.can_attack {
            self.delay_count += dt;
            if self.delay_count >= spec.fire_delay {
                self.can_attack = true;
                self.delay_count = 0.0;
            }
        }
        if self.frame == 1 {
            self.attack_count += dt;
            if self.attack_count >= spec.attack_duration {
                self.attack_count = 0.0;
                self.frame = 0;
            }
        }
    }

    fn switch_weapon(&mut self, select: WeaponSelect) {
        if self.reloading || !self.can_attack {
            return;
        }
        if let Some(weapon) = select.resolve(self.weapon) {
            self.weapon = weapon;
            self.delay_count = 0.0;
            self.attack_count = 0.0;
            self.frame = 0;
            self.can_attack = true;
        }
    }

    fn step_movement(&mut self, input: &InputState, dt: f32, config: &GameConfig, walls: &[Rect]) {
        let speed = config.player.speed;
        let mut dx = f32::from(input.right as u8) - f32::from(input.left as u8);
        let mut dy = f32::from(input.down as u8) - f32::from(input.up as u8);
        if dx != 0.0 && dy != 0.0 {
            // Diagonal speed equals axis speed.
            let diagonal = (speed * speed / 2.0).sqrt();
            dx *= diagonal;
            dy *= diagonal;
        } else {
            dx *= speed;
            dy *= speed;
        }

        let size = config.player.hitbox;
        // Axis-separated resolution: move and resolve x, then y, so sliding
        // along a wall works.
        let mut rect = Rect::from_center((self.center.0 + dx * dt, self.center.1), size, size);
        for wall in walls {
            if rect.intersects(wall) {
                if rect.x > wall.x {
                    rect.x = wall.right();
                } else {
                    rect.x = wall.x - rect.w;
                }
            }
        }
        let mut rect = Rect::from_center((rect.center().0, self.center.1 + dy * dt), size, size);
        for wall in walls {
            if rect.intersects(wall) {
                if rect.y > wall.y {
                    rect.y = wall.bottom();
                } else {
                    rect.y = wall.y - rect.h;
                }
            }
        }
        self.center = rect.center();
    }

    fn attack(&mut self, input: &InputState, config: &GameConfig) {
        let spec = config.weapon(self.weapon);
        let has_ammo = match self.weapon {
            Weapon::Pistol => self.pistol_rounds > 0,
            Weapon::Rifle => self.rifle_rounds > 0,
            Weapon::Knife => true,
        };
        if !self.can_attack || !has_ammo || self.reloading {
            return;
        }
        // Only the rifle fires while held; everything else needs a fresh press.
        if self.weapon != Weapon::Rifle && !input.fire_pressed {
            return;
        }

        if let Some(speed) = spec.projectile_speed {
            let direction = normalize((input.aim.0 - self.center.0, input.aim.1 - self.center.1));
            let origin = (
                self.center.0 + direction.0 * config.muzzle_offset,
                self.center.1 + direction.1 * config.muzzle_offset,
            );
            let spawn = ProjectileSpawn {
                id: ProjectileId(self.next_projectile),
                direction,
                origin,
                speed,
                damage: spec.damage,
            };
            self.next_projectile += 1;
            self.projectiles.push(Projectile::from_spawn(&spawn));
            self.pending_spawns.push(spawn);
            match self.weapon {
                Weapon::Pistol => self.pistol_rounds -= 1,
                Weapon::Rifle => self.rifle_rounds -= 1,
                Weapon::Knife => {}
            }
        }
        self.frame = 1;
        self.can_attack = false;
    }
}

/// An eventually-consistent mirror of a peer's player.
pub struct RemotePlayer {
    pub center: (f32, f32),
    pub rotation: f32,
    pub weapon: Weapon,
    pub frame: u8,
    pub health: f32,
    pub team: String,
    pub projectiles: Vec<Projectile>,
}

impl RemotePlayer {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            center: spawn_px(config),
            rotation: 0.0,
            weapon: Weapon::Pistol,
            frame: 0,
            health: config.player.max_health,
            team: String::new(),
            projectiles: Vec::new(),
        }
    }

    /// Overwrite the mirrored fields from a state delta and take ownership
    /// of any newly spawned projectiles.
    pub fn apply_update(&mut self, update: &PlayerUpdate) {
        self.center = update.center;
        self.rotation = update.rotation;
        self.weapon = update.weapon;
        self.frame = update.frame;
        self.health = update.health;
        self.team.clone_from(&update.team);
        for spawn in &update.projectiles {
            self.projectiles.push(Projectile::from_spawn(spawn));
        }
    }

    /// Advance this mirror's projectiles; returns the ids that expired.
    pub fn update_projectiles(&mut self, dt: f32, walls: &[Rect]) -> Vec<ProjectileId> {
        update_projectiles(&mut self.projectiles, dt, walls)
    }

    pub fn remove_projectile(&mut self, id: ProjectileId) -> bool {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.id != id);
        self.projectiles.len() != before
    }
}

fn spawn_px(config: &GameConfig) -> (f32, f32) {
    (
        config.player.spawn_tile.0 as f32 * TILE,
        config.player.spawn_tile.1 as f32 * TILE,
    )
}

/// Screen-space rotation toward `aim` in degrees (y grows downward, so the
/// angle is negated to match sprite rotation).
fn aim_rotation(center: (f32, f32), aim: (f32, f32)) -> f32 {
    -(aim.1 - center.1).atan2(aim.0 - center.0).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig::default()
    }

    fn open_field() -> Vec<Rect> {
        Vec::new()
    }

    #[test]
    fn diagonal_speed_equals_axis_speed() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        let start = p.center;
        let input = InputState {
            right: true,
            down: true,
            aim: start,
            ..InputState::default()
        };
        p.update(&input, 1.0, &config, &open_field());
        let moved =
            ((p.center.0 - start.0).powi(2) + (p.center.1 - start.1).powi(2)).sqrt();
        assert!((moved - config.player.speed).abs() < 1e-4, "moved {moved}");
    }

    #[test]
    fn walls_stop_movement() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        let wall = Rect::new(p.center.0 + 16.0, 0.0, 32.0, 1000.0);
        let input = InputState {
            right: true,
            aim: p.center,
            ..InputState::default()
        };
        let start_x = p.center.0;
        for _ in 0..100 {
            p.update(&input, 1.0, &config, std::slice::from_ref(&wall));
        }
        // Clamped against the wall face, not inside it.
        let hitbox = p.hitbox(&config);
        assert!(hitbox.right() <= wall.x + 1e-3);
        assert!(p.center.0 > start_x);
    }

    #[test]
    fn pistol_fires_on_press_not_hold() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        let held = InputState {
            fire_held: true,
            aim: (p.center.0 + 100.0, p.center.1),
            ..InputState::default()
        };
        p.update(&held, 1.0, &config, &open_field());
        assert!(p.projectiles.is_empty());

        let pressed = InputState {
            fire_pressed: true,
            ..held.clone()
        };
        p.update(&pressed, 1.0, &config, &open_field());
        assert_eq!(p.projectiles.len(), 1);
        assert_eq!(p.ammo(&config).0, config.pistol.magazine - 1);
        assert_eq!(p.frame, 1);
    }

    #[test]
    fn rifle_fires_while_held_at_its_cadence() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        p.update(
            &InputState {
                switch: Some(WeaponSelect::Slot1),
                aim: (p.center.0 + 100.0, p.center.1),
                ..InputState::default()
            },
            1.0,
            &config,
            &open_field(),
        );
        assert_eq!(p.weapon, Weapon::Rifle);

        let held = InputState {
            fire_held: true,
            aim: (p.center.0 + 100.0, p.center.1),
            ..InputState::default()
        };
        for _ in 0..41 {
            p.update(&held, 1.0, &config, &open_field());
        }
        // One shot immediately, then one per 20-tick fire delay.
        assert_eq!(p.projectiles.len(), 3);
    }

    #[test]
    fn fire_cooldown_blocks_rapid_presses() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        let pressed = InputState {
            fire_pressed: true,
            aim: (p.center.0 + 100.0, p.center.1),
            ..InputState::default()
        };
        p.update(&pressed, 1.0, &config, &open_field());
        p.update(&pressed, 1.0, &config, &open_field());
        assert_eq!(p.projectiles.len(), 1);
    }

    #[test]
    fn reload_refills_after_its_duration() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        let pressed = InputState {
            fire_pressed: true,
            aim: (p.center.0 + 100.0, p.center.1),
            ..InputState::default()
        };
        p.update(&pressed, 1.0, &config, &open_field());
        assert_eq!(p.ammo(&config).0, 9);

        p.update(
            &InputState {
                reload: true,
                ..InputState::default()
            },
            1.0,
            &config,
            &open_field(),
        );
        // Cannot fire mid-reload.
        p.update(&pressed, 50.0, &config, &open_field());
        assert_eq!(p.projectiles.len(), 1);

        p.update(&InputState::default(), 100.0, &config, &open_field());
        assert_eq!(p.ammo(&config).0, config.pistol.magazine);
    }

    #[test]
    fn wheel_stops_at_both_ends() {
        assert_eq!(WeaponSelect::WheelUp.resolve(Weapon::Rifle), None);
        assert_eq!(WeaponSelect::WheelDown.resolve(Weapon::Knife), None);
        assert_eq!(
            WeaponSelect::WheelUp.resolve(Weapon::Knife),
            Some(Weapon::Pistol)
        );
        assert_eq!(
            WeaponSelect::WheelDown.resolve(Weapon::Rifle),
            Some(Weapon::Pistol)
        );
    }

    #[test]
    fn knife_spawns_no_projectile() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        p.update(
            &InputState {
                switch: Some(WeaponSelect::Slot3),
                ..InputState::default()
            },
            1.0,
            &config,
            &open_field(),
        );
        p.update(
            &InputState {
                fire_pressed: true,
                ..InputState::default()
            },
            1.0,
            &config,
            &open_field(),
        );
        assert!(p.projectiles.is_empty());
        assert_eq!(p.frame, 1);
    }

    #[test]
    fn update_drains_pending_spawns_once() {
        let config = config();
        let mut p = LocalPlayer::new(&config, "Red");
        p.update(
            &InputState {
                fire_pressed: true,
                aim: (p.center.0, p.center.1 - 50.0),
                ..InputState::default()
            },
            1.0,
            &config,
            &open_field(),
        );
        let first = p.make_update();
        assert_eq!(first.projectiles.len(), 1);
        assert_eq!(p.make_update().projectiles.len(), 0);
    }

    #[test]
    fn remote_mirror_takes_spawns_and_fields() {
        let config = config();
        let mut remote = RemotePlayer::new(&config);
        remote.apply_update(&PlayerUpdate {
            center: (300.0, 200.0),
            rotation: 90.0,
            weapon: Weapon::Rifle,
            frame: 1,
            health: 1.5,
            team: "Blue".into(),
            projectiles: vec![ProjectileSpawn {
                id: ProjectileId(4),
                direction: (0.0, 1.0),
                origin: (300.0, 230.0),
                speed: 15.0,
                damage: 0.5,
            }],
        });
        assert_eq!(remote.center, (300.0, 200.0));
        assert_eq!(remote.projectiles.len(), 1);
        assert!(remote.remove_projectile(ProjectileId(4)));
        assert!(!remote.remove_projectile(ProjectileId(4)));
    }
}
