//! Per-frame input intent.
//!
//! Behavior-tree leaves set bits and steering targets here; the ship
//! controller turns them into motion, and the outbound position packet
//! reflects whatever the frame produced. Cleared at the top of every frame.

use crate::util::vec2::Vec2;

/// Discrete actions a leaf can request for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InputAction {
    Bullet = 1 << 0,
    Bomb = 1 << 1,
    Repel = 1 << 2,
    Burst = 1 << 3,
    Multifire = 1 << 4,
    Thor = 1 << 5,
    Decoy = 1 << 6,
    Rocket = 1 << 7,
    Portal = 1 << 8,
    Brick = 1 << 9,
    Warp = 1 << 10,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    actions: u16,
    /// Desired facing for this frame, world space.
    pub heading: Option<Vec2>,
    /// -1 reverse, 0 coast, 1 forward.
    pub thrust: i8,
}

impl InputState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set(&mut self, action: InputAction) {
        self.actions |= action as u16;
    }

    pub fn is_set(&self, action: InputAction) -> bool {
        self.actions & action as u16 != 0
    }

    pub fn any_action(&self) -> bool {
        self.actions != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_query() {
        let mut input = InputState::default();
        assert!(!input.is_set(InputAction::Bomb));
        input.set(InputAction::Bomb);
        assert!(input.is_set(InputAction::Bomb));
        assert!(!input.is_set(InputAction::Bullet));
        assert!(input.any_action());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut input = InputState::default();
        input.set(InputAction::Repel);
        input.heading = Some(Vec2::ONE);
        input.thrust = 1;

        input.clear();
        assert!(!input.any_action());
        assert!(input.heading.is_none());
        assert_eq!(input.thrust, 0);
    }
}
