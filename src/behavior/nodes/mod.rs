//! Leaf nodes. Grouped by the part of the game they touch: ship state,
//! players, steering, aiming, raw input, geometry/math, map queries, threat
//! estimation, and debug overlays.

pub mod aim;
pub mod input;
pub mod map_query;
pub mod math;
pub mod movement;
pub mod player;
pub mod render;
pub mod ship;
pub mod threat;

pub use aim::{AimNode, ShotVelocityQueryNode};
pub use input::{InputActionNode, InputQueryNode};
pub use map_query::{TileQueryNode, VisibilityQueryNode};
pub use math::{
    DistanceThresholdNode, MoveRectangleNode, RayNode, RayRectangleInterceptNode, RectangleNode,
    ScalarThresholdNode,
};
pub use movement::{ArriveNode, FaceNode, GoToNode, SeekNode, WaypointNode};
pub use player::{NearestMemoryTargetNode, PlayerPositionQueryNode};
pub use render::{
    RenderEnableTreeNode, RenderLineNode, RenderPathNode, RenderRayNode, RenderRectNode,
    RenderTextNode, RenderVectorNode, TextRequest,
};
pub use ship::{
    PlayerEnergyPercentThresholdNode, ShipMultifireCapabilityQueryNode, ShipMultifireQueryNode,
    ShipQueryNode, ShipRequestNode, ShipWeaponCapabilityQueryNode, ShipWeaponCooldownQueryNode,
};
pub use threat::{PositionThreatQueryNode, RepelDistanceQueryNode};
