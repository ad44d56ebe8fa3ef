//! Ship selection and capability leaves.

use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::game::weapons::WeaponKind;

/// Success iff self is flying the ship stored under `key`.
pub struct ShipQueryNode {
    key: String,
}

impl ShipQueryNode {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }
}

impl BehaviorNode for ShipQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(requested) = ctx.blackboard.value::<i32>(&self.key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        if self_player.ship as i32 == requested {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Sends a ship-change request for the ship stored under `key`. Re-sends are
/// throttled so a slow server is not spammed every tick.
pub struct ShipRequestNode {
    key: String,
}

impl ShipRequestNode {
    const RESEND_DELAY: i32 = 100;

    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }
}

impl BehaviorNode for ShipRequestNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(requested) = ctx.blackboard.value::<i32>(&self.key) else {
            return ExecuteResult::Failure;
        };

        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if self_player.ship as i32 == requested {
            return ExecuteResult::Success;
        }

        let tick = ctx.game.connection.current_tick;
        let last = ctx.blackboard.value_or::<i32>("ship_request_tick", i32::MIN);
        if last == i32::MIN
            || crate::clock::tick_diff(tick, last as u32) >= Self::RESEND_DELAY
        {
            ctx.game.connection.send_ship_request(requested as u8);
            ctx.blackboard.set("ship_request_tick", tick as i32);
        }

        ExecuteResult::Success
    }
}

/// Success iff the current hull can use `weapon` right now.
pub struct ShipWeaponCapabilityQueryNode {
    weapon: WeaponKind,
}

impl ShipWeaponCapabilityQueryNode {
    pub fn new(weapon: WeaponKind) -> Self {
        Self { weapon }
    }
}

impl BehaviorNode for ShipWeaponCapabilityQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if !self_player.in_ship() {
            return ExecuteResult::Failure;
        }

        let settings = &ctx.game.connection.settings.ship_settings[self_player.ship as usize];
        if ctx.game.ship.has_capability(settings, self.weapon) {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Success iff `weapon` is cooling down (invert to gate on readiness).
pub struct ShipWeaponCooldownQueryNode {
    weapon: WeaponKind,
}

impl ShipWeaponCooldownQueryNode {
    pub fn new(weapon: WeaponKind) -> Self {
        Self { weapon }
    }
}

impl BehaviorNode for ShipWeaponCooldownQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if !self_player.in_ship() {
            return ExecuteResult::Failure;
        }

        let settings = &ctx.game.connection.settings.ship_settings[self_player.ship as usize];
        let tick = ctx.game.connection.current_tick;
        if ctx.game.ship.on_cooldown(settings, self.weapon, tick) {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Success iff the current hull supports multifire at all.
pub struct ShipMultifireCapabilityQueryNode;

impl BehaviorNode for ShipMultifireCapabilityQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };
        if !self_player.in_ship() {
            return ExecuteResult::Failure;
        }

        let settings = &ctx.game.connection.settings.ship_settings[self_player.ship as usize];
        if settings.has_multifire {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Success iff multifire is currently toggled on.
pub struct ShipMultifireQueryNode;

impl BehaviorNode for ShipMultifireQueryNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        if ctx.game.ship.ship.multifire {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Success iff self energy is at least `percent` of the hull's full energy.
pub struct PlayerEnergyPercentThresholdNode {
    percent: f32,
}

impl PlayerEnergyPercentThresholdNode {
    pub fn new(percent: f32) -> Self {
        Self { percent }
    }
}

impl BehaviorNode for PlayerEnergyPercentThresholdNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let max_energy = ctx.game.ship.ship.energy as f32;
        if max_energy <= 0.0 {
            return ExecuteResult::Failure;
        }

        if self_player.energy >= max_energy * self.percent {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}
