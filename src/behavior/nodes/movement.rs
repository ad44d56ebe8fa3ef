//! Steering leaves. These only write intent into the frame's `InputState`;
//! the ship controller turns intent into rotation and thrust afterwards.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::{ExecuteContext, Path};
use crate::util::vec2::Vec2;

/// Points the ship at the position stored under `key`.
pub struct FaceNode {
    key: String,
}

impl FaceNode {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }
}

impl BehaviorNode for FaceNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target) = ctx.blackboard.value::<Vec2>(&self.key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let to_target = target - self_player.position;
        if to_target.length_sq() > f32::EPSILON {
            ctx.input.heading = Some(to_target.normalize());
        }
        ExecuteResult::Success
    }
}

/// Thrusts toward the target position; with a leash distance it holds range
/// instead of closing all the way.
pub struct SeekNode {
    target_key: String,
    leash_key: Option<String>,
}

impl SeekNode {
    pub fn new(target_key: &str) -> Self {
        Self {
            target_key: target_key.to_string(),
            leash_key: None,
        }
    }

    pub fn with_leash(target_key: &str, leash_key: &str) -> Self {
        Self {
            target_key: target_key.to_string(),
            leash_key: Some(leash_key.to_string()),
        }
    }
}

impl BehaviorNode for SeekNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target) = ctx.blackboard.value::<Vec2>(&self.target_key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let to_target = target - self_player.position;
        let distance = to_target.length();

        if ctx.input.heading.is_none() && distance > f32::EPSILON {
            ctx.input.heading = Some(to_target * (1.0 / distance));
        }

        match self
            .leash_key
            .as_deref()
            .and_then(|key| ctx.blackboard.value::<f32>(key))
        {
            Some(leash) => {
                // Hold the leash band instead of ramming the target.
                if distance > leash * 1.1 {
                    ctx.input.thrust = 1;
                } else if distance < leash * 0.9 {
                    ctx.input.thrust = -1;
                } else {
                    ctx.input.thrust = 0;
                }
            }
            None => ctx.input.thrust = 1,
        }

        ExecuteResult::Success
    }
}

/// Thrusts toward the target and brakes inside `slow_radius` so the ship
/// settles instead of orbiting.
pub struct ArriveNode {
    key: String,
    slow_radius: f32,
}

impl ArriveNode {
    pub fn new(key: &str, slow_radius: f32) -> Self {
        Self {
            key: key.to_string(),
            slow_radius,
        }
    }
}

impl BehaviorNode for ArriveNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target) = ctx.blackboard.value::<Vec2>(&self.key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let to_target = target - self_player.position;
        let distance = to_target.length();

        if distance > self.slow_radius {
            if ctx.input.heading.is_none() && distance > f32::EPSILON {
                ctx.input.heading = Some(to_target * (1.0 / distance));
            }
            ctx.input.thrust = 1;
        } else if self_player.velocity.length() > 0.5 {
            ctx.input.thrust = -1;
        } else {
            ctx.input.thrust = 0;
        }

        ExecuteResult::Success
    }
}

/// Paths to the position stored under `key` and steers along the waypoints.
/// Success once within the arrival threshold; Running while traveling. The
/// active path is published under `active_path` for the overlay leaves.
pub struct GoToNode {
    key: String,
}

impl GoToNode {
    pub const PATH_KEY: &'static str = "active_path";
    const ARRIVE_DISTANCE: f32 = 2.0;
    const WAYPOINT_DISTANCE: f32 = 2.0;

    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }
}

impl BehaviorNode for GoToNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target) = ctx.blackboard.value::<Vec2>(&self.key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let position = self_player.position;
        let frequency = self_player.frequency;
        let ship = (self_player.ship as usize).min(7);
        let radius = ctx.game.connection.settings.ship_settings[ship].radius();

        if position.distance_to(target) <= Self::ARRIVE_DISTANCE {
            ctx.blackboard.remove(Self::PATH_KEY);
            ctx.input.thrust = 0;
            return ExecuteResult::Success;
        }

        // Replan when there is no path or the goal moved away from its tail.
        let mut path = ctx
            .blackboard
            .value::<Path>(Self::PATH_KEY)
            .filter(|p| {
                p.points
                    .last()
                    .is_some_and(|end| end.distance_to(target) <= Self::WAYPOINT_DISTANCE)
            })
            .unwrap_or_else(|| {
                ctx.pathfinder
                    .find_path(&ctx.game.connection.map, position, target, radius, frequency)
            });

        while let Some(waypoint) = path.current() {
            if position.distance_to(waypoint) <= Self::WAYPOINT_DISTANCE {
                path.advance();
            } else {
                break;
            }
        }

        let Some(waypoint) = path.current() else {
            ctx.blackboard.remove(Self::PATH_KEY);
            return ExecuteResult::Success;
        };

        let to_waypoint = waypoint - position;
        if to_waypoint.length_sq() > f32::EPSILON {
            ctx.input.heading = Some(to_waypoint.normalize());
        }
        ctx.input.thrust = 1;

        ctx.blackboard.set(Self::PATH_KEY, path);
        ExecuteResult::Running
    }
}

/// Cycles through the `waypoints` list, publishing the current one under
/// `out_key` and advancing whenever the ship gets within `radius`.
pub struct WaypointNode {
    list_key: String,
    index_key: String,
    out_key: String,
    radius: f32,
}

impl WaypointNode {
    pub fn new(list_key: &str, index_key: &str, out_key: &str, radius: f32) -> Self {
        Self {
            list_key: list_key.to_string(),
            index_key: index_key.to_string(),
            out_key: out_key.to_string(),
            radius,
        }
    }
}

impl BehaviorNode for WaypointNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(waypoints) = ctx.blackboard.value::<Vec<Vec2>>(&self.list_key) else {
            return ExecuteResult::Failure;
        };
        if waypoints.is_empty() {
            return ExecuteResult::Failure;
        }
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let mut index = ctx.blackboard.value_or::<i32>(&self.index_key, 0) as usize % waypoints.len();

        if self_player.position.distance_to(waypoints[index]) <= self.radius {
            index = (index + 1) % waypoints.len();
        }

        ctx.blackboard.set(&self.index_key, index as i32);
        ctx.blackboard.set(&self.out_key, waypoints[index]);
        ExecuteResult::Success
    }
}
