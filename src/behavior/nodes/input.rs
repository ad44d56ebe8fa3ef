//! Raw input leaves.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::game::input::InputAction;

/// Requests `action` for this frame. Always succeeds.
pub struct InputActionNode {
    action: InputAction,
}

impl InputActionNode {
    pub fn new(action: InputAction) -> Self {
        Self { action }
    }
}

impl BehaviorNode for InputActionNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        ctx.input.set(self.action);
        ExecuteResult::Success
    }
}

/// Success iff `action` was already requested earlier this frame.
pub struct InputQueryNode {
    action: InputAction,
}

impl InputQueryNode {
    pub fn new(action: InputAction) -> Self {
        Self { action }
    }
}

impl BehaviorNode for InputQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        if ctx.input.is_set(self.action) {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}
