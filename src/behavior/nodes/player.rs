//! Player lookup leaves.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::game::player::PlayerId;

/// Writes a player's position to `dst_key`. Without a source key the player
/// is self; with one, the blackboard slot must hold a player id.
pub struct PlayerPositionQueryNode {
    src_key: Option<String>,
    dst_key: String,
}

impl PlayerPositionQueryNode {
    pub fn own(dst_key: &str) -> Self {
        Self {
            src_key: None,
            dst_key: dst_key.to_string(),
        }
    }

    pub fn of(src_key: &str, dst_key: &str) -> Self {
        Self {
            src_key: Some(src_key.to_string()),
            dst_key: dst_key.to_string(),
        }
    }
}

impl BehaviorNode for PlayerPositionQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let player = match &self.src_key {
            Some(key) => {
                let Some(id) = ctx.blackboard.value::<PlayerId>(key) else {
                    return ExecuteResult::Failure;
                };
                ctx.game.players.get_player_by_id(id)
            }
            None => ctx.game.players.get_self(),
        };

        let Some(player) = player else {
            return ExecuteResult::Failure;
        };

        let position = player.position;
        ctx.blackboard.set(&self.dst_key, position);
        ExecuteResult::Success
    }
}

/// Picks the nearest enemy from the memory-smoothed sighting list and stores
/// its id under `dst_key`. Fails when nothing credible is remembered.
pub struct NearestMemoryTargetNode {
    dst_key: String,
}

impl NearestMemoryTargetNode {
    pub fn new(dst_key: &str) -> Self {
        Self {
            dst_key: dst_key.to_string(),
        }
    }
}

impl BehaviorNode for NearestMemoryTargetNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        ctx.targets.observe(ctx.game);

        match ctx.targets.nearest(ctx.game) {
            Some(id) => {
                ctx.blackboard.set(&self.dst_key, id);
                ExecuteResult::Success
            }
            None => ExecuteResult::Failure,
        }
    }
}
