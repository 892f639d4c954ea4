//! Scene graph
//!
//! Objects, cameras and lights arranged in a transform hierarchy.
//!
//! ## Architecture
//!
//! ```text
//! Scene (root, background, fog, override material)
//!      ↓
//! SceneGraph (arena of nodes, parent/child links)
//!      ↓
//! Node = Object3D (transform, flags) + NodeKind (mesh, light, camera, ...)
//! ```
//!
//! World matrices flow down the hierarchy on
//! [`SceneGraph::update_matrix_world`]; the renderer reads them when it
//! builds render lists.

pub mod camera;
pub mod graph;
pub mod layers;
pub mod light;
pub mod object;
#[allow(clippy::module_inception)]
pub mod scene;

pub use camera::{Camera, CameraError, OrthographicParams, PerspectiveParams, Projection, ViewOffset};
pub use graph::{Node, NodeKey, NodeKind, Renderable, SceneError, SceneGraph};
pub use layers::Layers;
pub use light::{Light, LightKind, LightShadow};
pub use object::{Object3D, UserValue};
pub use scene::{Background, Fog, Scene};
