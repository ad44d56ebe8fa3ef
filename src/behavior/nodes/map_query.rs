//! Tile-map leaves.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::map::TileId;
use crate::util::vec2::Vec2;

/// Success iff self currently stands on the given tile id.
pub struct TileQueryNode {
    tile_id: TileId,
}

impl TileQueryNode {
    pub fn new(tile_id: TileId) -> Self {
        Self { tile_id }
    }
}

impl BehaviorNode for TileQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        if ctx.game.connection.map.tile_id(self_player.position) == self.tile_id {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Success iff the straight line from self to the position under `key` is
/// unobstructed by solid tiles.
pub struct VisibilityQueryNode {
    key: String,
}

impl VisibilityQueryNode {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }
}

impl BehaviorNode for VisibilityQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target) = ctx.blackboard.value::<Vec2>(&self.key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let visible = ctx.game.connection.map.line_of_sight(
            self_player.position,
            target,
            self_player.frequency,
        );

        if visible {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}
