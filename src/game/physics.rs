//! Per-tick movement and collision.
//!
//! Each axis is integrated and tested separately against the tile grid: move
//! along the axis, find the single column or row the ship could have entered,
//! sweep the perpendicular range for solid tiles, and on contact revert the
//! axis and bounce. The same routine serves live simulation and the
//! reconciler's forward extrapolation; `extrapolating` gates the differences.

use crate::clock::{tick_diff, Tick};
use crate::config::ServerSettings;
use crate::game::player::Player;
use crate::map::Map;
use crate::util::geometry::box_box_intersect;
use crate::util::vec2::Vec2;

/// Integrates one axis and resolves tile collisions. Returns true on bounce.
pub fn simulate_axis(
    player: &mut Player,
    dt: f32,
    axis: usize,
    extrapolating: bool,
    map: &Map,
    settings: &ServerSettings,
    current_tick: Tick,
) -> bool {
    let mut bounce_factor = 16.0 / settings.bounce_factor as f32;
    let flip = 1 - axis;
    let ship = (player.ship as usize).min(7);
    let radius = settings.ship_settings[ship].radius();

    let previous = player.position[axis];

    player.position[axis] += player.velocity[axis] * dt;
    let mut delta = player.velocity[axis] * dt;

    if player.lerp_time > 0.0 {
        let timestep = dt.min(player.lerp_time);
        player.position[axis] += player.lerp_velocity[axis] * timestep;
        delta += player.lerp_velocity[axis] * timestep;
    }

    // The one column/row the ship's leading edge could have entered.
    let check = if delta < 0.0 {
        (player.position[axis] - radius).floor() as i32
    } else {
        (player.position[axis] + radius) as i32
    };

    let start = (player.position[flip] - radius - 1.0) as i32;
    let end = (player.position[flip] + radius + 1.0) as i32;

    let collider_min = player.position.pixel_rounded() - Vec2::new(radius, radius);
    let collider_max = player.position.pixel_rounded() + Vec2::new(radius, radius);

    let mut collided = check < 0 || check > 1023;

    let mut other = start;
    while other < end && !collided {
        let (tile_x, tile_y) = if axis == 0 {
            (check, other)
        } else {
            (other, check)
        };

        let solid = tile_x < 0
            || tile_y < 0
            || tile_x > 1023
            || tile_y > 1023
            || map.is_solid(tile_x as u16, tile_y as u16, player.frequency);

        if solid {
            let tile_min = Vec2::new(tile_x as f32, tile_y as f32);
            let tile_max = tile_min + Vec2::ONE;
            if box_box_intersect(collider_min, collider_max, tile_min, tile_max) {
                collided = true;
                break;
            }
        }

        other += 1;
    }

    if collided {
        // Repeated bounces within a tick would grind the ship against the
        // wall; the second one keeps full speed.
        if !extrapolating && tick_diff(current_tick, player.last_bounce_tick) < 1 {
            bounce_factor = 1.0;
        }

        player.position[axis] = previous;

        player.velocity[axis] *= -bounce_factor;
        player.velocity[flip] *= bounce_factor;

        player.lerp_velocity[axis] *= -bounce_factor;
        player.lerp_velocity[flip] *= bounce_factor;

        return true;
    }

    false
}

/// One simulation step. Unsynchronized players hold still unless this is the
/// reconciler's forward extrapolation. Returns true if any axis bounced.
pub fn simulate_player(
    player: &mut Player,
    dt: f32,
    extrapolating: bool,
    map: &Map,
    settings: &ServerSettings,
    current_tick: Tick,
) -> bool {
    if !extrapolating && !player.is_synchronized() {
        player.velocity = Vec2::ZERO;
        player.lerp_time = 0.0;
        return false;
    }

    let x_bounce = simulate_axis(player, dt, 0, extrapolating, map, settings, current_tick);
    let y_bounce = simulate_axis(player, dt, 1, extrapolating, map, settings, current_tick);

    if (x_bounce || y_bounce) && !extrapolating {
        player.last_bounce_tick = current_tick;
    }

    player.lerp_time -= dt;

    x_bounce || y_bounce
}

/// Walks the self ship up-left one tile at a time until it no longer
/// overlaps a wall. Servers occasionally teleport ships into geometry;
/// this terminates at the map origin in the worst case.
pub fn unstuck(player: &mut Player, map: &Map, radius: f32) {
    while map.is_colliding(player.position, radius, player.frequency) {
        player.position = player.position.floored() - Vec2::ONE;

        if player.position.x < 0.0 || player.position.y < 0.0 {
            player.position.x = player.position.x.max(0.0);
            player.position.y = player.position.y.max(0.0);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;

    fn arena_settings() -> ServerSettings {
        // BounceFactor 16 keeps the restitution at exactly 1.0.
        ServerSettings::default()
    }

    fn map_with_wall() -> Map {
        let mut map = Map::new();
        for y in 0..1024 {
            map.set_tile(100, y, 1);
        }
        map
    }

    fn flying_player() -> Player {
        let mut player = Player::default();
        player.ship = 0;
        player.timestamp = 1; // synchronized
        player
    }

    #[test]
    fn test_free_flight_integrates_velocity() {
        let map = Map::new();
        let settings = arena_settings();
        let mut player = flying_player();
        player.position = Vec2::new(500.0, 500.0);
        player.velocity = Vec2::new(2.0, -1.0);

        simulate_player(&mut player, 0.5, false, &map, &settings, 0);

        assert!(player.position.approx_eq(Vec2::new(501.0, 499.5), 1e-4));
    }

    #[test]
    fn test_wall_bounce_inverts_velocity() {
        let map = map_with_wall();
        let settings = arena_settings();
        let mut player = flying_player();
        player.position = Vec2::new(98.5, 500.0);
        player.velocity = Vec2::new(20.0, 0.0);

        // Enough steps to reach the wall at x=100.
        let mut bounced = false;
        for tick in 0..20 {
            bounced |= simulate_player(&mut player, 0.01, false, &map, &settings, tick);
        }

        assert!(bounced);
        assert!(player.velocity.x < 0.0);
        assert!((player.velocity.x + 20.0).abs() < 1e-3);
        assert!(player.position.x < 100.0);
    }

    #[test]
    fn test_second_bounce_within_tick_keeps_speed() {
        let mut settings = arena_settings();
        settings.bounce_factor = 32; // restitution 0.5
        let map = map_with_wall();

        let mut player = flying_player();
        player.position = Vec2::new(99.0, 500.0);
        player.velocity = Vec2::new(50.0, 0.0);
        player.last_bounce_tick = 100;

        // Same tick as the recorded bounce: slowdown gate forces factor 1.
        simulate_axis(&mut player, 0.01, 0, false, &map, &settings, 100);
        assert!((player.velocity.x + 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_extrapolation_ignores_bounce_gate() {
        let mut settings = arena_settings();
        settings.bounce_factor = 32;
        let map = map_with_wall();

        let mut player = flying_player();
        player.position = Vec2::new(99.0, 500.0);
        player.velocity = Vec2::new(50.0, 0.0);
        player.last_bounce_tick = 100;

        simulate_axis(&mut player, 0.01, 0, true, &map, &settings, 100);
        // Extrapolation applies the configured restitution regardless.
        assert!((player.velocity.x + 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_unsynchronized_player_holds_still() {
        let map = Map::new();
        let settings = arena_settings();
        let mut player = flying_player();
        player.timestamp = crate::clock::INVALID_SMALL_TICK;
        player.position = Vec2::new(500.0, 500.0);
        player.velocity = Vec2::new(5.0, 5.0);

        simulate_player(&mut player, 0.1, false, &map, &settings, 0);

        assert_eq!(player.position, Vec2::new(500.0, 500.0));
        assert_eq!(player.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_extrapolation_moves_unsynchronized_player() {
        let map = Map::new();
        let settings = arena_settings();
        let mut player = flying_player();
        player.timestamp = crate::clock::INVALID_SMALL_TICK;
        player.position = Vec2::new(500.0, 500.0);
        player.velocity = Vec2::new(5.0, 0.0);

        simulate_player(&mut player, 0.1, true, &map, &settings, 0);
        assert!(player.position.x > 500.0);
    }

    #[test]
    fn test_lerp_velocity_contributes_and_expires() {
        let map = Map::new();
        let settings = arena_settings();
        let mut player = flying_player();
        player.position = Vec2::new(500.0, 500.0);
        player.lerp_velocity = Vec2::new(10.0, 0.0);
        player.lerp_time = 0.05;

        // dt longer than the remaining lerp window: only 0.05s of blend applies.
        simulate_player(&mut player, 0.1, false, &map, &settings, 0);
        assert!((player.position.x - 500.5).abs() < 1e-4);
        assert!(player.lerp_time < 0.0);
    }

    #[test]
    fn test_map_edge_counts_as_collision() {
        let map = Map::new();
        let settings = arena_settings();
        let mut player = flying_player();
        player.position = Vec2::new(0.5, 500.0);
        player.velocity = Vec2::new(-10.0, 0.0);

        simulate_player(&mut player, 0.1, false, &map, &settings, 0);
        assert!(player.velocity.x > 0.0);
    }

    #[test]
    fn test_unstuck_terminates_and_clears() {
        let mut map = Map::new();
        // Solid block with a clear diagonal escape toward the origin.
        for y in 200..210 {
            for x in 200..210 {
                map.set_tile(x, y, 1);
            }
        }

        let mut player = flying_player();
        player.position = Vec2::new(205.5, 205.5);

        unstuck(&mut player, &map, 14.0 / 16.0);
        assert!(!map.is_colliding(player.position, 14.0 / 16.0, player.frequency));
    }

    #[test]
    fn test_unstuck_bounded_at_origin() {
        let mut map = Map::new();
        // Wall the entire corner so no position ever fits.
        for y in 0..16 {
            for x in 0..16 {
                map.set_tile(x, y, 1);
            }
        }

        let mut player = flying_player();
        player.position = Vec2::new(8.0, 8.0);
        unstuck(&mut player, &map, 14.0 / 16.0);
        assert!(player.position.x >= 0.0 && player.position.y >= 0.0);
        assert!(player.position.x <= 8.0 && player.position.y <= 8.0);
    }
}
