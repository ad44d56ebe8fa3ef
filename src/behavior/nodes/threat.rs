//! Threat estimation leaves.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::game::player::SHIP_SPECTATOR;
use crate::util::vec2::Vec2;

/// Scores how dangerous a position is from nearby live enemies and writes
/// the scalar to `out_key`. Each enemy inside `radius` contributes linearly
/// by proximity; `normalizer` scales the sum into a usable 0..1-ish range.
pub struct PositionThreatQueryNode {
    pos_key: String,
    out_key: String,
    radius: f32,
    normalizer: f32,
}

impl PositionThreatQueryNode {
    pub fn new(pos_key: &str, out_key: &str, radius: f32, normalizer: f32) -> Self {
        Self {
            pos_key: pos_key.to_string(),
            out_key: out_key.to_string(),
            radius,
            normalizer: normalizer.max(f32::EPSILON),
        }
    }
}

impl BehaviorNode for PositionThreatQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(position) = ctx.blackboard.value::<Vec2>(&self.pos_key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        let self_freq = self_player.frequency;

        let mut threat = 0.0f32;
        for player in ctx.game.players.players() {
            if player.ship >= SHIP_SPECTATOR {
                continue;
            }
            if player.frequency == self_freq {
                continue;
            }
            if !player.is_synchronized() || player.enter_delay > 0.0 {
                continue;
            }

            let distance = player.position.distance_to(position);
            if distance < self.radius {
                threat += 1.0 - distance / self.radius;
            }
        }

        ctx.blackboard.set(&self.out_key, threat / self.normalizer);
        ExecuteResult::Success
    }
}

/// Writes the current hull's repel radius (tiles) to `out_key`.
pub struct RepelDistanceQueryNode {
    out_key: String,
}

impl RepelDistanceQueryNode {
    pub fn new(out_key: &str) -> Self {
        Self {
            out_key: out_key.to_string(),
        }
    }
}

impl BehaviorNode for RepelDistanceQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if !self_player.in_ship() {
            return ExecuteResult::Failure;
        }

        let settings = &ctx.game.connection.settings.ship_settings[self_player.ship as usize];
        ctx.blackboard.set(&self.out_key, settings.repel_distance);
        ExecuteResult::Success
    }
}
