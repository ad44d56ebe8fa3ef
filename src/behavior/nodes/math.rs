//! Geometry and threshold leaves.

use crate::behavior::blackboard::BlackboardValue;
use crate::behavior::tree::{BehaviorNode, ExecuteResult};
use crate::behavior::ExecuteContext;
use crate::util::geometry::{Ray, Rectangle};
use crate::util::vec2::Vec2;

/// Success iff the distance from self (or `src_key`) to the position under
/// `key` is at least `threshold` tiles.
pub struct DistanceThresholdNode {
    key: String,
    src_key: Option<String>,
    threshold: f32,
}

impl DistanceThresholdNode {
    pub fn new(key: &str, threshold: f32) -> Self {
        Self {
            key: key.to_string(),
            src_key: None,
            threshold,
        }
    }

    pub fn from(src_key: &str, key: &str, threshold: f32) -> Self {
        Self {
            key: key.to_string(),
            src_key: Some(src_key.to_string()),
            threshold,
        }
    }
}

impl BehaviorNode for DistanceThresholdNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(target) = ctx.blackboard.value::<Vec2>(&self.key) else {
            return ExecuteResult::Failure;
        };

        let origin = match &self.src_key {
            Some(key) => match ctx.blackboard.value::<Vec2>(key) {
                Some(position) => position,
                None => return ExecuteResult::Failure,
            },
            None => match ctx.game.players.get_self() {
                Some(player) => player.position,
                None => return ExecuteResult::Failure,
            },
        };

        if origin.distance_sq_to(target) >= self.threshold * self.threshold {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Success iff the scalar under `key` is at least `threshold`.
pub struct ScalarThresholdNode<T> {
    key: String,
    threshold: T,
}

impl<T> ScalarThresholdNode<T> {
    pub fn new(key: &str, threshold: T) -> Self {
        Self {
            key: key.to_string(),
            threshold,
        }
    }
}

impl<T: BlackboardValue + PartialOrd> BehaviorNode for ScalarThresholdNode<T> {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(value) = ctx.blackboard.value::<T>(&self.key) else {
            return ExecuteResult::Failure;
        };

        if value >= self.threshold {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}

/// Builds a ray from an origin position and a direction vector, both read
/// from the blackboard.
pub struct RayNode {
    origin_key: String,
    direction_key: String,
    out_key: String,
}

impl RayNode {
    pub fn new(origin_key: &str, direction_key: &str, out_key: &str) -> Self {
        Self {
            origin_key: origin_key.to_string(),
            direction_key: direction_key.to_string(),
            out_key: out_key.to_string(),
        }
    }
}

impl BehaviorNode for RayNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(origin) = ctx.blackboard.value::<Vec2>(&self.origin_key) else {
            return ExecuteResult::Failure;
        };
        let Some(direction) = ctx.blackboard.value::<Vec2>(&self.direction_key) else {
            return ExecuteResult::Failure;
        };
        if direction.length_sq() < f32::EPSILON {
            return ExecuteResult::Failure;
        }

        ctx.blackboard.set(&self.out_key, Ray::new(origin, direction));
        ExecuteResult::Success
    }
}

/// Builds a rectangle of fixed half-extents around the position under
/// `center_key`.
pub struct RectangleNode {
    center_key: String,
    half_extents: Vec2,
    out_key: String,
}

impl RectangleNode {
    pub fn new(center_key: &str, half_extents: Vec2, out_key: &str) -> Self {
        Self {
            center_key: center_key.to_string(),
            half_extents,
            out_key: out_key.to_string(),
        }
    }
}

impl BehaviorNode for RectangleNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(center) = ctx.blackboard.value::<Vec2>(&self.center_key) else {
            return ExecuteResult::Failure;
        };

        ctx.blackboard
            .set(&self.out_key, Rectangle::centered(center, self.half_extents));
        ExecuteResult::Success
    }
}

/// Recenters the rectangle under `rect_key` on the position under
/// `center_key`.
pub struct MoveRectangleNode {
    rect_key: String,
    center_key: String,
    out_key: String,
}

impl MoveRectangleNode {
    pub fn new(rect_key: &str, center_key: &str, out_key: &str) -> Self {
        Self {
            rect_key: rect_key.to_string(),
            center_key: center_key.to_string(),
            out_key: out_key.to_string(),
        }
    }
}

impl BehaviorNode for MoveRectangleNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(rect) = ctx.blackboard.value::<Rectangle>(&self.rect_key) else {
            return ExecuteResult::Failure;
        };
        let Some(center) = ctx.blackboard.value::<Vec2>(&self.center_key) else {
            return ExecuteResult::Failure;
        };

        ctx.blackboard.set(&self.out_key, rect.moved_to(center));
        ExecuteResult::Success
    }
}

/// Success iff the ray under `ray_key` hits the rectangle under `rect_key`.
pub struct RayRectangleInterceptNode {
    ray_key: String,
    rect_key: String,
}

impl RayRectangleInterceptNode {
    pub fn new(ray_key: &str, rect_key: &str) -> Self {
        Self {
            ray_key: ray_key.to_string(),
            rect_key: rect_key.to_string(),
        }
    }
}

impl BehaviorNode for RayRectangleInterceptNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let Some(ray) = ctx.blackboard.value::<Ray>(&self.ray_key) else {
            return ExecuteResult::Failure;
        };
        let Some(rect) = ctx.blackboard.value::<Rectangle>(&self.rect_key) else {
            return ExecuteResult::Failure;
        };

        if ray.intersect_rect(&rect).is_some() {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        }
    }
}
