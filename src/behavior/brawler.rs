//! Default combat behavior.
//!
//! Request the configured ship, then either fight the nearest remembered
//! enemy or patrol waypoints. Combat runs aim, movement, and weapon gating
//! in parallel so the ship keeps maneuvering while it decides what to fire.

use crate::behavior::blackboard::Blackboard;
use crate::behavior::nodes::{
    AimNode, ArriveNode, DistanceThresholdNode, FaceNode, GoToNode, InputActionNode,
    InputQueryNode, MoveRectangleNode, NearestMemoryTargetNode, PlayerEnergyPercentThresholdNode,
    PlayerPositionQueryNode, PositionThreatQueryNode, RayNode, RayRectangleInterceptNode,
    RectangleNode, RenderPathNode, RenderRayNode, RenderRectNode, RenderTextNode,
    RepelDistanceQueryNode, ScalarThresholdNode, SeekNode, ShipMultifireCapabilityQueryNode,
    ShipMultifireQueryNode, ShipQueryNode, ShipRequestNode, ShipWeaponCapabilityQueryNode,
    ShipWeaponCooldownQueryNode, ShotVelocityQueryNode, TextRequest, TileQueryNode,
    VisibilityQueryNode, WaypointNode,
};
use crate::behavior::tree::{BehaviorNode, CompositeDecorator, TreeBuilder};
use crate::config::BotConfig;
use crate::game::input::InputAction;
use crate::game::weapons::WeaponKind;
use crate::map::TILE_ID_SAFE;
use crate::render::{Camera, Color, TextColor};
use crate::util::vec2::Vec2;

/// Range at which multifire stops being worth the energy.
const MULTIFIRE_RANGE: f32 = 15.0;

pub struct BrawlerBehavior;

impl BrawlerBehavior {
    /// Seeds the blackboard for a fresh session.
    pub fn init_blackboard(blackboard: &mut Blackboard, config: &BotConfig) {
        blackboard.set("request_ship", config.requested_ship as i32);
        blackboard.set("leash_distance", 12.0f32);
        blackboard.set("world_camera", Camera::default());
        blackboard.set(
            "ui_camera",
            Camera {
                position: Vec2::ZERO,
                zoom: 1.0,
            },
        );
        blackboard.set(
            "waypoints",
            vec![
                Vec2::new(410.0, 415.0),
                Vec2::new(615.0, 395.0),
                Vec2::new(515.0, 545.0),
                Vec2::new(505.0, 680.0),
                Vec2::new(355.0, 545.0),
            ],
        );
    }

    pub fn create_tree() -> Box<dyn BehaviorNode> {
        TreeBuilder::new()
            .selector()
                // Enter the requested ship if not already in it.
                .sequence()
                    .invert(ShipQueryNode::new("request_ship"))
                    .child(ShipRequestNode::new("request_ship"))
                    .end()
                .selector()
                    // Fight the nearest remembered enemy.
                    .sequence()
                        .sequence()
                            .child(PlayerPositionQueryNode::own("self_position"))
                            .child(NearestMemoryTargetNode::new("nearest_target"))
                            .child(PlayerPositionQueryNode::of("nearest_target", "nearest_target_position"))
                            .end()
                        // Multifire at range, single fire up close.
                        .selector_with(CompositeDecorator::Success)
                            .sequence()
                                .child(ShipMultifireCapabilityQueryNode)
                                .child(DistanceThresholdNode::new("nearest_target_position", MULTIFIRE_RANGE))
                                .invert(ShipMultifireQueryNode)
                                .child(InputActionNode::new(InputAction::Multifire))
                                .end()
                            .sequence()
                                .child(ShipMultifireCapabilityQueryNode)
                                .invert(DistanceThresholdNode::new("nearest_target_position", MULTIFIRE_RANGE))
                                .child(ShipMultifireQueryNode)
                                .child(InputActionNode::new(InputAction::Multifire))
                                .end()
                            .end()
                        .selector()
                            // Path to the target while walls block the shot.
                            .sequence()
                                .invert(VisibilityQueryNode::new("nearest_target_position"))
                                .child(GoToNode::new("nearest_target_position"))
                                .child(RenderPathNode::new(Color::rgb(0.0, 1.0, 0.5)))
                                .end()
                            // Open space: aim, steer, and gate weapons at once.
                            .sequence()
                                .child(AimNode::new(WeaponKind::Bullet, "nearest_target", "aimshot"))
                                .parallel()
                                    .sequence_with(CompositeDecorator::Success)
                                        .child(PositionThreatQueryNode::new("self_position", "self_threat", 8.0, 3.0))
                                        .child(RenderTextNode::at("ui_camera", Vec2::new(512.0, 600.0), |bb| {
                                            let threat = bb.value_or::<f32>("self_threat", 0.0);
                                            TextRequest::centered(format!("threat {threat:.2}"), TextColor::White)
                                        }))
                                        .child(FaceNode::new("aimshot"))
                                        .child(SeekNode::with_leash("aimshot", "leash_distance"))
                                        .end()
                                    .parallel()
                                        .sequence_with(CompositeDecorator::Success)
                                            .child(ShipWeaponCapabilityQueryNode::new(WeaponKind::Repel))
                                            .child(RepelDistanceQueryNode::new("repel_distance"))
                                            .child(ScalarThresholdNode::<f32>::new("self_threat", 0.5))
                                            .child(InputActionNode::new(InputAction::Repel))
                                            .end()
                                        .sequence_with(CompositeDecorator::Success)
                                            .child(PlayerEnergyPercentThresholdNode::new(0.65))
                                            .child(ShipWeaponCapabilityQueryNode::new(WeaponKind::Bomb))
                                            .invert(ShipWeaponCooldownQueryNode::new(WeaponKind::Bomb))
                                            .child(DistanceThresholdNode::new("nearest_target_position", 10.0))
                                            .child(ShotVelocityQueryNode::new(WeaponKind::Bomb, "bomb_fire_velocity"))
                                            .child(RayNode::new("self_position", "bomb_fire_velocity", "bomb_fire_ray"))
                                            .child(RectangleNode::new("nearest_target_position", Vec2::new(3.0, 3.0), "bomb_target_bounds"))
                                            .child(MoveRectangleNode::new("bomb_target_bounds", "aimshot", "bomb_target_bounds"))
                                            .child(RenderRectNode::new("world_camera", "bomb_target_bounds", Color::rgb(1.0, 0.0, 0.0)))
                                            .child(RenderRayNode::new("world_camera", "bomb_fire_ray", 50.0, Color::rgb(1.0, 1.0, 0.0)))
                                            .child(RayRectangleInterceptNode::new("bomb_fire_ray", "bomb_target_bounds"))
                                            .child(InputActionNode::new(InputAction::Bomb))
                                            .end()
                                        .sequence_with(CompositeDecorator::Success)
                                            .child(PlayerEnergyPercentThresholdNode::new(0.3))
                                            .invert(ShipWeaponCooldownQueryNode::new(WeaponKind::Bullet))
                                            .invert(InputQueryNode::new(InputAction::Bomb))
                                            .invert(TileQueryNode::new(TILE_ID_SAFE))
                                            .child(ShotVelocityQueryNode::new(WeaponKind::Bullet, "bullet_fire_velocity"))
                                            .child(RayNode::new("self_position", "bullet_fire_velocity", "bullet_fire_ray"))
                                            .child(RectangleNode::new("nearest_target_position", Vec2::new(4.0, 4.0), "bullet_target_bounds"))
                                            .child(MoveRectangleNode::new("bullet_target_bounds", "aimshot", "bullet_target_bounds"))
                                            .child(RayRectangleInterceptNode::new("bullet_fire_ray", "bullet_target_bounds"))
                                            .child(InputActionNode::new(InputAction::Bullet))
                                            .end()
                                        .end()
                                    .end()
                                .end()
                            .end()
                        .end()
                    // Nothing to fight: follow the waypoint loop.
                    .sequence()
                        .child(WaypointNode::new("waypoints", "waypoint_index", "waypoint_position", 15.0))
                        .selector()
                            .sequence()
                                .invert(VisibilityQueryNode::new("waypoint_position"))
                                .child(GoToNode::new("waypoint_position"))
                                .child(RenderPathNode::new(Color::rgb(0.0, 0.5, 1.0)))
                                .end()
                            .parallel()
                                .child(FaceNode::new("waypoint_position"))
                                .child(ArriveNode::new("waypoint_position", 1.25))
                                .end()
                            .end()
                        .end()
                    .end()
                .end()
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_builds() {
        // Construction alone exercises every node constructor and the
        // builder stack balance.
        let _tree = BrawlerBehavior::create_tree();
    }

    #[test]
    fn test_blackboard_seeding() {
        let mut bb = Blackboard::new();
        let config = BotConfig {
            requested_ship: 3,
            ..Default::default()
        };
        BrawlerBehavior::init_blackboard(&mut bb, &config);

        assert_eq!(bb.value::<i32>("request_ship"), Some(3));
        assert!(bb.value::<f32>("leash_distance").is_some());
        assert_eq!(bb.value::<Vec<Vec2>>("waypoints").unwrap().len(), 5);
        assert!(bb.value::<Camera>("world_camera").is_some());
    }
}
