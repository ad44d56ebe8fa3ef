//! Local ship controller.
//!
//! Tracks the self ship's consumables and cooldowns, restores them on reset,
//! and turns the behavior tree's per-frame input into orientation and thrust
//! on the self player. Weapon projectiles are not simulated here; only the
//! cooldown bookkeeping the decision layer needs.

use crate::clock::{tick_diff, tick_gt, Tick};
use crate::config::ShipSettings;
use crate::game::input::{InputAction, InputState};
use crate::game::player::Player;
use crate::game::weapons::WeaponKind;

/// Mutable state of the hull the bot is flying.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipState {
    /// Full energy of the current hull.
    pub energy: u32,
    pub bursts: u8,
    pub repels: u8,
    pub thors: u8,
    pub bricks: u8,
    pub decoys: u8,
    pub rockets: u8,
    pub portals: u8,
    /// Self-imposed antiwarp window after requesting an attach.
    pub fake_antiwarp_end_tick: Tick,
    pub last_bullet_tick: Tick,
    pub last_bomb_tick: Tick,
    pub multifire: bool,
}

#[derive(Debug, Default)]
pub struct ShipController {
    pub ship: ShipState,
}

impl ShipController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores energy and the ammo loadout for `ship_index`.
    pub fn reset_ship(&mut self, settings: &ShipSettings) {
        let items = settings.initial_items;
        self.ship.energy = settings.initial_energy;
        self.ship.bursts = items.bursts;
        self.ship.repels = items.repels;
        self.ship.thors = items.thors;
        self.ship.bricks = items.bricks;
        self.ship.decoys = items.decoys;
        self.ship.rockets = items.rockets;
        self.ship.portals = items.portals;
        self.ship.multifire = false;
    }

    /// Whether this hull can use `weapon` right now (capability plus ammo).
    pub fn has_capability(&self, settings: &ShipSettings, weapon: WeaponKind) -> bool {
        match weapon {
            WeaponKind::Bullet | WeaponKind::BouncingBullet => settings.bullet_delay > 0,
            WeaponKind::Bomb | WeaponKind::ProximityBomb => settings.bomb_delay > 0,
            WeaponKind::Repel => self.ship.repels > 0,
            WeaponKind::Burst => self.ship.bursts > 0,
            WeaponKind::Thor => self.ship.thors > 0,
            WeaponKind::Decoy => self.ship.decoys > 0,
            WeaponKind::None | WeaponKind::Wormhole => false,
        }
    }

    /// Whether `weapon` is still cooling down at `tick`.
    pub fn on_cooldown(&self, settings: &ShipSettings, weapon: WeaponKind, tick: Tick) -> bool {
        match weapon {
            WeaponKind::Bullet | WeaponKind::BouncingBullet => {
                tick_diff(tick, self.ship.last_bullet_tick) < settings.bullet_delay as i32
            }
            WeaponKind::Bomb | WeaponKind::ProximityBomb | WeaponKind::Thor => {
                tick_diff(tick, self.ship.last_bomb_tick) < settings.bomb_delay as i32
            }
            _ => false,
        }
    }

    pub fn is_fake_antiwarped(&self, tick: Tick) -> bool {
        tick_gt(self.ship.fake_antiwarp_end_tick, tick)
    }

    /// Applies one frame of input to the self player: rotate toward the
    /// requested heading at the hull's turn rate, thrust along the facing,
    /// clamp to max speed, and start weapon cooldowns for fire actions.
    pub fn control(
        &mut self,
        player: &mut Player,
        input: &InputState,
        settings: &ShipSettings,
        tick: Tick,
        dt: f32,
    ) {
        if let Some(target) = input.heading {
            let desired = heading_to_orientation(target.angle());
            let mut delta = desired - player.orientation;

            // Take the short way around the circle.
            if delta > 0.5 {
                delta -= 1.0;
            } else if delta < -0.5 {
                delta += 1.0;
            }

            let max_step = settings.rotation_rate * dt;
            player.orientation += delta.clamp(-max_step, max_step);
            player.orientation = player.orientation.rem_euclid(1.0);
        }

        if input.thrust != 0 {
            let heading = orientation_to_heading(player.orientation);
            player.velocity += heading * (settings.thrust * dt * input.thrust as f32);
            player.velocity = player.velocity.clamp_length(settings.max_speed);
        }

        if input.is_set(InputAction::Bullet)
            && !self.on_cooldown(settings, WeaponKind::Bullet, tick)
        {
            self.ship.last_bullet_tick = tick;
        }
        if input.is_set(InputAction::Bomb) && !self.on_cooldown(settings, WeaponKind::Bomb, tick) {
            self.ship.last_bomb_tick = tick;
        }
        if input.is_set(InputAction::Multifire) {
            self.ship.multifire = !self.ship.multifire;
        }
        if input.is_set(InputAction::Repel) && self.ship.repels > 0 {
            self.ship.repels -= 1;
        }
        if input.is_set(InputAction::Burst) && self.ship.bursts > 0 {
            self.ship.bursts -= 1;
        }
    }
}

/// Orientation (0..1 over 40 facings) to a world-space heading vector.
/// Facing zero points up and advances clockwise.
pub fn orientation_to_heading(orientation: f32) -> crate::util::vec2::Vec2 {
    let radians = orientation * std::f32::consts::TAU - std::f32::consts::FRAC_PI_2;
    crate::util::vec2::Vec2::from_angle(radians)
}

/// Inverse of `orientation_to_heading` for an angle in radians.
pub fn heading_to_orientation(angle: f32) -> f32 {
    ((angle + std::f32::consts::FRAC_PI_2) / std::f32::consts::TAU).rem_euclid(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShipSettings;
    use crate::net::protocol::ItemCounts;
    use crate::util::vec2::Vec2;

    #[test]
    fn test_reset_ship_restores_loadout() {
        let settings = ShipSettings {
            initial_energy: 1700,
            initial_items: ItemCounts {
                repels: 2,
                bursts: 3,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut controller = ShipController::new();
        controller.ship.repels = 0;
        controller.reset_ship(&settings);
        assert_eq!(controller.ship.energy, 1700);
        assert_eq!(controller.ship.repels, 2);
        assert_eq!(controller.ship.bursts, 3);
    }

    #[test]
    fn test_capability_tracks_ammo() {
        let settings = ShipSettings::default();
        let mut controller = ShipController::new();
        assert!(!controller.has_capability(&settings, WeaponKind::Repel));
        controller.ship.repels = 1;
        assert!(controller.has_capability(&settings, WeaponKind::Repel));
        assert!(controller.has_capability(&settings, WeaponKind::Bullet));
    }

    #[test]
    fn test_cooldown_window() {
        let settings = ShipSettings {
            bullet_delay: 20,
            ..Default::default()
        };
        let mut controller = ShipController::new();
        controller.ship.last_bullet_tick = 100;

        assert!(controller.on_cooldown(&settings, WeaponKind::Bullet, 110));
        assert!(!controller.on_cooldown(&settings, WeaponKind::Bullet, 120));
    }

    #[test]
    fn test_fake_antiwarp_expires() {
        let mut controller = ShipController::new();
        controller.ship.fake_antiwarp_end_tick = 200;
        assert!(controller.is_fake_antiwarped(150));
        assert!(!controller.is_fake_antiwarped(200));
    }

    #[test]
    fn test_control_thrust_accelerates_along_facing() {
        let settings = ShipSettings::default();
        let mut controller = ShipController::new();
        let mut player = Player::default();
        player.ship = 0;
        player.orientation = 0.25; // facing +x

        let mut input = InputState::default();
        input.thrust = 1;
        controller.control(&mut player, &input, &settings, 0, 0.1);

        assert!(player.velocity.x > 0.0);
        assert!(player.velocity.y.abs() < 1e-3);
    }

    #[test]
    fn test_control_rotation_short_way() {
        let settings = ShipSettings {
            rotation_rate: 10.0, // plenty to finish the turn in one step
            ..Default::default()
        };
        let mut controller = ShipController::new();
        let mut player = Player::default();
        player.orientation = 0.95;

        let mut input = InputState::default();
        input.heading = Some(orientation_to_heading(0.05));
        controller.control(&mut player, &input, &settings, 0, 0.1);

        // Wrapped through zero instead of turning the long way.
        assert!(player.orientation < 0.1 || player.orientation > 0.9);
    }

    #[test]
    fn test_heading_orientation_round_trip() {
        for step in 0..40 {
            let orientation = step as f32 / 40.0;
            let heading = orientation_to_heading(orientation);
            let back = heading_to_orientation(heading.angle());
            let diff = (back - orientation).abs();
            assert!(diff < 1e-4 || (1.0 - diff) < 1e-4);
        }
    }

    #[test]
    fn test_fire_starts_cooldown() {
        let settings = ShipSettings::default();
        let mut controller = ShipController::new();
        let mut player = Player::default();

        let mut input = InputState::default();
        input.set(InputAction::Bullet);
        controller.control(&mut player, &input, &settings, 500, 0.01);
        assert_eq!(controller.ship.last_bullet_tick, 500);
        assert!(controller.on_cooldown(&settings, WeaponKind::Bullet, 510));
    }

    #[test]
    fn test_velocity_clamped_to_max_speed() {
        let settings = ShipSettings {
            max_speed: 5.0,
            thrust: 1000.0,
            ..Default::default()
        };
        let mut controller = ShipController::new();
        let mut player = Player::default();
        player.velocity = Vec2::new(4.9, 0.0);

        let mut input = InputState::default();
        input.thrust = 1;
        controller.control(&mut player, &input, &settings, 0, 1.0);
        assert!(player.velocity.length() <= 5.0 + 1e-4);
    }
}
