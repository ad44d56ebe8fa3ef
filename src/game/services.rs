//! Small collaborators the simulation consults but does not own the logic
//! for: soccer carry state, the radar view window, and the chat log.

use crate::util::vec2::Vec2;

/// Ball state as far as the core cares: are we carrying, and for how long.
#[derive(Debug, Default)]
pub struct Soccer {
    pub carrying: bool,
    /// Seconds left before a forced throw, display-only.
    pub carry_timer: f32,
}

impl Soccer {
    pub fn is_carrying_ball(&self) -> bool {
        self.carrying
    }
}

/// The rectangular slice of the world the radar currently shows. Antiwarp
/// only bites from ships the radar can see.
#[derive(Debug)]
pub struct Radar {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Default for Radar {
    fn default() -> Self {
        Self {
            center: Vec2::new(512.0, 512.0),
            half_extents: Vec2::new(512.0, 512.0),
        }
    }
}

impl Radar {
    pub fn in_radar_view(&self, position: Vec2) -> bool {
        (position.x - self.center.x).abs() <= self.half_extents.x
            && (position.y - self.center.y).abs() <= self.half_extents.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Arena,
    Public,
    Team,
    Private,
}

/// Rolling chat log. Outbound chat is somebody else's job; the simulation
/// only announces arena traffic here.
#[derive(Debug, Default)]
pub struct ChatController {
    messages: Vec<(ChatKind, String)>,
}

impl ChatController {
    const MAX_MESSAGES: usize = 256;

    pub fn add_message(&mut self, kind: ChatKind, text: String) {
        tracing::info!("[chat] {text}");
        if self.messages.len() >= Self::MAX_MESSAGES {
            self.messages.remove(0);
        }
        self.messages.push((kind, text));
    }

    pub fn messages(&self) -> &[(ChatKind, String)] {
        &self.messages
    }
}
