//! Aiming leaves: lead-point solving and shot trajectory queries.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::config::ShipSettings;
use crate::game::player::PlayerId;
use crate::game::ship::orientation_to_heading;
use crate::game::weapons::WeaponKind;
use crate::util::vec2::Vec2;

fn weapon_speed(settings: &ShipSettings, weapon: WeaponKind) -> f32 {
    match weapon {
        WeaponKind::Bomb | WeaponKind::ProximityBomb | WeaponKind::Thor => settings.bomb_speed,
        _ => settings.bullet_speed,
    }
}

/// Solves the intercept point for firing `weapon` at the player stored under
/// `target_key`, writing the lead position to `out_key`. Projectiles inherit
/// the shooter's velocity, so the solve runs on relative velocity.
pub struct AimNode {
    weapon: WeaponKind,
    target_key: String,
    out_key: String,
}

impl AimNode {
    pub fn new(weapon: WeaponKind, target_key: &str, out_key: &str) -> Self {
        Self {
            weapon,
            target_key: target_key.to_string(),
            out_key: out_key.to_string(),
        }
    }
}

impl BehaviorNode for AimNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target_id) = ctx.blackboard.value::<PlayerId>(&self.target_key) else {
            return ExecuteResult::Failure;
        };
        let Some(target) = ctx.game.players.get_player_by_id(target_id) else {
            return ExecuteResult::Failure;
        };
        let (target_pos, target_vel) = (target.position, target.velocity);

        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if !self_player.in_ship() {
            return ExecuteResult::Failure;
        }

        let settings = &ctx.game.connection.settings.ship_settings[self_player.ship as usize];
        let speed = weapon_speed(settings, self.weapon);

        let Some(lead_time) = solve_intercept(
            target_pos - self_player.position,
            target_vel - self_player.velocity,
            speed,
        ) else {
            return ExecuteResult::Failure;
        };

        let aimshot = target_pos + target_vel * lead_time;
        ctx.blackboard.set(&self.out_key, aimshot);
        ExecuteResult::Success
    }
}

/// Earliest non-negative time at which a projectile of `speed` can meet a
/// target at relative position `p` moving with relative velocity `v`.
fn solve_intercept(p: Vec2, v: Vec2, speed: f32) -> Option<f32> {
    let a = v.dot(v) - speed * speed;
    let b = 2.0 * p.dot(v);
    let c = p.dot(p);

    if a.abs() < 1e-5 {
        // Degenerate: closing speed equals projectile speed.
        if b.abs() < 1e-5 {
            return (c < 1e-5).then_some(0.0);
        }
        let t = -c / b;
        return (t >= 0.0).then_some(t);
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) / (2.0 * a);
    let t2 = (-b + sqrt_d) / (2.0 * a);

    let t = t1.min(t2);
    let t = if t >= 0.0 { t } else { t1.max(t2) };
    (t >= 0.0).then_some(t)
}

/// Writes the world-space velocity a shot of `weapon` would launch with
/// right now: shooter velocity plus muzzle speed along the facing.
pub struct ShotVelocityQueryNode {
    weapon: WeaponKind,
    out_key: String,
}

impl ShotVelocityQueryNode {
    pub fn new(weapon: WeaponKind, out_key: &str) -> Self {
        Self {
            weapon,
            out_key: out_key.to_string(),
        }
    }
}

impl BehaviorNode for ShotVelocityQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if !self_player.in_ship() {
            return ExecuteResult::Failure;
        }

        let settings = &ctx.game.connection.settings.ship_settings[self_player.ship as usize];
        let speed = weapon_speed(settings, self.weapon);
        let heading = orientation_to_heading(self_player.orientation);

        let velocity = self_player.velocity + heading * speed;
        ctx.blackboard.set(&self.out_key, velocity);
        ExecuteResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intercept_stationary_target() {
        let t = solve_intercept(Vec2::new(10.0, 0.0), Vec2::ZERO, 5.0).unwrap();
        assert!((t - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_intercept_crossing_target() {
        // Target 10 tiles ahead moving perpendicular at 3 tiles/s, shot at 5.
        let t = solve_intercept(Vec2::new(10.0, 0.0), Vec2::new(0.0, 3.0), 5.0).unwrap();
        let impact = Vec2::new(10.0, 3.0 * t);
        assert!((impact.length() - 5.0 * t).abs() < 1e-3);
    }

    #[test]
    fn test_intercept_unreachable_target() {
        // Receding faster than the projectile flies.
        assert!(solve_intercept(Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0), 5.0).is_none());
    }

    #[test]
    fn test_intercept_approaching_faster_than_shot() {
        // Head-on approach is always solvable.
        let t = solve_intercept(Vec2::new(10.0, 0.0), Vec2::new(-20.0, 0.0), 5.0).unwrap();
        assert!(t > 0.0 && t < 1.0);
    }
}
