//! Debug draw-command sink.
//!
//! The bot is headless; behavior-tree render leaves push overlay commands
//! here and a frontend (when one is attached) drains them after `render`.
//! With nothing attached the commands are simply discarded each frame.

use crate::util::geometry::{LineSegment, Rectangle};
use crate::util::vec2::Vec2;

/// World- or screen-space viewpoint a draw command is tagged with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec2,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::new(512.0, 512.0),
            zoom: 1.0,
        }
    }
}

/// RGB in 0..1, matching the overlay line colors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    White,
    Green,
    Blue,
    Red,
    Yellow,
    DarkRed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ships,
    AfterShips,
    Weapons,
    TopMost,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Text {
        text: String,
        color: TextColor,
        position: Vec2,
        layer: Layer,
        alignment: TextAlignment,
    },
    Line {
        segment: LineSegment,
        color: Color,
    },
    Rect {
        rect: Rectangle,
        color: Color,
    },
}

#[derive(Debug, Default)]
pub struct DebugRenderer {
    commands: Vec<DrawCommand>,
    rendered: Vec<(Camera, Vec<DrawCommand>)>,
    /// Toggled by the behavior tree to enable overlay text output.
    pub tree_text_enabled: bool,
    /// When false, `render` drops everything instead of keeping it.
    pub retain_output: bool,
}

impl DebugRenderer {
    pub fn new(retain_output: bool) -> Self {
        Self {
            retain_output,
            ..Default::default()
        }
    }

    pub fn push_text(
        &mut self,
        text: String,
        color: TextColor,
        position: Vec2,
        layer: Layer,
        alignment: TextAlignment,
    ) {
        self.commands.push(DrawCommand::Text {
            text,
            color,
            position,
            layer,
            alignment,
        });
    }

    pub fn push_line(&mut self, segment: LineSegment, color: Color) {
        self.commands.push(DrawCommand::Line { segment, color });
    }

    pub fn push_rect(&mut self, rect: Rectangle, color: Color) {
        self.commands.push(DrawCommand::Rect { rect, color });
    }

    /// Closes the current batch under `camera`.
    pub fn render(&mut self, camera: Camera) {
        if self.commands.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.commands);
        if self.retain_output {
            self.rendered.push((camera, batch));
        }
    }

    /// Hands the finished batches to a frontend and clears them.
    pub fn drain(&mut self) -> Vec<(Camera, Vec<DrawCommand>)> {
        std::mem::take(&mut self.rendered)
    }

    pub fn pending_len(&self) -> usize {
        self.commands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_batches_under_camera() {
        let mut renderer = DebugRenderer::new(true);
        renderer.push_line(
            LineSegment::new(Vec2::ZERO, Vec2::ONE),
            Color::rgb(0.0, 1.0, 0.0),
        );
        renderer.push_rect(
            Rectangle::new(Vec2::ZERO, Vec2::ONE),
            Color::rgb(1.0, 0.0, 0.0),
        );
        renderer.render(Camera::default());

        let batches = renderer.drain();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.len(), 2);
        assert_eq!(renderer.pending_len(), 0);
    }

    #[test]
    fn test_headless_mode_discards() {
        let mut renderer = DebugRenderer::new(false);
        renderer.push_line(
            LineSegment::new(Vec2::ZERO, Vec2::ONE),
            Color::rgb(0.0, 0.0, 1.0),
        );
        renderer.render(Camera::default());
        assert!(renderer.drain().is_empty());
    }

    #[test]
    fn test_render_without_commands_is_noop() {
        let mut renderer = DebugRenderer::new(true);
        renderer.render(Camera::default());
        assert!(renderer.drain().is_empty());
    }
}
