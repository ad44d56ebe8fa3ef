//! Debug overlay leaves. These push draw commands at the renderer sink and
//! never fail the tree over a missing frontend; a missing blackboard input
//! does fail, so broken wiring shows up during development.

use crate::behavior::blackboard::Blackboard;
use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::{ExecuteContext, Path};
use crate::render::{Camera, Color, Layer, TextAlignment, TextColor};
use crate::util::geometry::{LineSegment, Ray, Rectangle};
use crate::util::vec2::Vec2;

fn camera_for(ctx: &ExecuteContext, key: &str) -> Option<Camera> {
    ctx.blackboard.value::<Camera>(key)
}

/// Draws the active path (or the one under `path_key`) as line segments.
pub struct RenderPathNode {
    color: Color,
    path_key: Option<String>,
}

impl RenderPathNode {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            path_key: None,
        }
    }

    pub fn with_key(path_key: &str, color: Color) -> Self {
        Self {
            color,
            path_key: Some(path_key.to_string()),
        }
    }
}

impl BehaviorNode for RenderPathNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let key = self
            .path_key
            .as_deref()
            .unwrap_or(crate::behavior::nodes::GoToNode::PATH_KEY);

        let Some(path) = ctx.blackboard.value::<Path>(key) else {
            return ExecuteResult::Failure;
        };
        if path.is_empty() {
            return ExecuteResult::Success;
        }

        let mut prev = match ctx.game.players.get_self() {
            Some(self_player) => self_player.position,
            None => path.points[0],
        };

        let mut drew = false;
        for point in &path.points[path.index.min(path.points.len())..] {
            ctx.renderer
                .push_line(LineSegment::new(prev, *point), self.color);
            prev = *point;
            drew = true;
        }

        if drew {
            let camera = ctx
                .blackboard
                .value::<Camera>("world_camera")
                .unwrap_or_default();
            ctx.renderer.render(camera);
        }

        ExecuteResult::Success
    }
}

/// One formatted overlay string.
pub struct TextRequest {
    pub text: String,
    pub color: TextColor,
    pub layer: Layer,
    pub alignment: TextAlignment,
}

impl TextRequest {
    pub fn new(text: String, color: TextColor) -> Self {
        Self {
            text,
            color,
            layer: Layer::TopMost,
            alignment: TextAlignment::Left,
        }
    }

    pub fn centered(text: String, color: TextColor) -> Self {
        Self {
            text,
            color,
            layer: Layer::TopMost,
            alignment: TextAlignment::Center,
        }
    }
}

type Formatter = Box<dyn Fn(&Blackboard) -> TextRequest>;

/// Renders text produced by a formatter closure that reads the blackboard at
/// execute time, at a fixed position or one stored under a key.
pub struct RenderTextNode {
    camera_key: String,
    position_key: Option<String>,
    position: Vec2,
    formatter: Formatter,
}

impl RenderTextNode {
    pub fn at(
        camera_key: &str,
        position: Vec2,
        formatter: impl Fn(&Blackboard) -> TextRequest + 'static,
    ) -> Self {
        Self {
            camera_key: camera_key.to_string(),
            position_key: None,
            position,
            formatter: Box::new(formatter),
        }
    }

    pub fn at_key(
        camera_key: &str,
        position_key: &str,
        formatter: impl Fn(&Blackboard) -> TextRequest + 'static,
    ) -> Self {
        Self {
            camera_key: camera_key.to_string(),
            position_key: Some(position_key.to_string()),
            position: Vec2::ZERO,
            formatter: Box::new(formatter),
        }
    }
}

impl BehaviorNode for RenderTextNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(camera) = camera_for(ctx, &self.camera_key) else {
            return ExecuteResult::Failure;
        };

        let position = match &self.position_key {
            Some(key) => match ctx.blackboard.value::<Vec2>(key) {
                Some(position) => position,
                None => return ExecuteResult::Failure,
            },
            None => self.position,
        };

        if !ctx.renderer.tree_text_enabled {
            return ExecuteResult::Success;
        }

        let request = (self.formatter)(ctx.blackboard);
        ctx.renderer.push_text(
            request.text,
            request.color,
            position,
            request.layer,
            request.alignment,
        );
        ctx.renderer.render(camera);

        ExecuteResult::Success
    }
}

pub struct RenderRectNode {
    camera_key: String,
    rect_key: String,
    color: Color,
}

impl RenderRectNode {
    pub fn new(camera_key: &str, rect_key: &str, color: Color) -> Self {
        Self {
            camera_key: camera_key.to_string(),
            rect_key: rect_key.to_string(),
            color,
        }
    }
}

impl BehaviorNode for RenderRectNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(camera) = camera_for(ctx, &self.camera_key) else {
            return ExecuteResult::Failure;
        };
        let Some(rect) = ctx.blackboard.value::<Rectangle>(&self.rect_key) else {
            return ExecuteResult::Failure;
        };

        ctx.renderer.push_rect(rect, self.color);
        ctx.renderer.render(camera);
        ExecuteResult::Success
    }
}

pub struct RenderLineNode {
    camera_key: String,
    line_key: String,
    color: Color,
}

impl RenderLineNode {
    pub fn new(camera_key: &str, line_key: &str, color: Color) -> Self {
        Self {
            camera_key: camera_key.to_string(),
            line_key: line_key.to_string(),
            color,
        }
    }
}

impl BehaviorNode for RenderLineNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(camera) = camera_for(ctx, &self.camera_key) else {
            return ExecuteResult::Failure;
        };
        let Some(line) = ctx.blackboard.value::<LineSegment>(&self.line_key) else {
            return ExecuteResult::Failure;
        };

        ctx.renderer.push_line(line, self.color);
        ctx.renderer.render(camera);
        ExecuteResult::Success
    }
}

pub struct RenderRayNode {
    camera_key: String,
    ray_key: String,
    length: f32,
    color: Color,
}

impl RenderRayNode {
    pub fn new(camera_key: &str, ray_key: &str, length: f32, color: Color) -> Self {
        Self {
            camera_key: camera_key.to_string(),
            ray_key: ray_key.to_string(),
            length,
            color,
        }
    }
}

impl BehaviorNode for RenderRayNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(camera) = camera_for(ctx, &self.camera_key) else {
            return ExecuteResult::Failure;
        };
        let Some(ray) = ctx.blackboard.value::<Ray>(&self.ray_key) else {
            return ExecuteResult::Failure;
        };

        let segment = LineSegment::new(ray.origin, ray.origin + ray.direction * self.length);
        ctx.renderer.push_line(segment, self.color);
        ctx.renderer.render(camera);
        ExecuteResult::Success
    }
}

/// Draws the vector under `vector_key` anchored at the self position.
pub struct RenderVectorNode {
    camera_key: String,
    vector_key: String,
    color: Color,
}

impl RenderVectorNode {
    pub fn new(camera_key: &str, vector_key: &str, color: Color) -> Self {
        Self {
            camera_key: camera_key.to_string(),
            vector_key: vector_key.to_string(),
            color,
        }
    }
}

impl BehaviorNode for RenderVectorNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(camera) = camera_for(ctx, &self.camera_key) else {
            return ExecuteResult::Failure;
        };
        let Some(vector) = ctx.blackboard.value::<Vec2>(&self.vector_key) else {
            return ExecuteResult::Failure;
        };
        let Some(self_player) = ctx.game.players.get_self() else {
            return ExecuteResult::Failure;
        };

        let origin = self_player.position;
        ctx.renderer
            .push_line(LineSegment::new(origin, origin + vector), self.color);
        ctx.renderer.render(camera);
        ExecuteResult::Success
    }
}

/// Switches overlay text output on or off for the whole tree.
pub struct RenderEnableTreeNode {
    enabled: bool,
}

impl RenderEnableTreeNode {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl BehaviorNode for RenderEnableTreeNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        ctx.renderer.tree_text_enabled = self.enabled;
        ExecuteResult::Success
    }
}
