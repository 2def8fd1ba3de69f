//! DriftCanvas Core Library
//!
//! Scene transform engine for the DriftCanvas design surface: numerically
//! stable camera, selection geometry, node transforms, tile level selection
//! and session-batched undo/redo.

pub mod camera;
pub mod config;
pub mod gesture;
pub mod history;
pub mod loading;
pub mod scene;
pub mod selection;
pub mod shapes;
pub mod tiles;
pub mod transform;
pub mod validate;

pub use camera::{CameraState, CoordinateNormalizer, WorldTransform};
pub use config::{ConfigError, EngineConfig, HandleConfig, NormalizerConfig};
pub use gesture::{CameraGesture, PointerEvent, PointerId, PointerTracker};
pub use history::{HistoryManager, SceneSnapshot};
pub use loading::{LoadKind, LoadTicket, LoadToken};
pub use scene::{SceneChange, SceneModel, SubscriptionId, TextLayoutRequest};
pub use selection::{
    Corner, Edge, Handle, HandleKind, HandleSizing, SelectionOverlay, calculate_group_selection_overlay,
    calculate_selection_handle_sizing,
};
pub use shapes::{NodeId, NodeKind, NodePayload, SceneNode};
pub use tiles::{DEFAULT_MIN_TILE_DENSITY, pick_tile_level, pick_tile_level_with};
pub use transform::{TransformBaseline, TransformEngine, normalize_angle};
pub use validate::{InputIssue, Validated};
