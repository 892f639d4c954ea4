//! # Scene Engine
//!
//! Scene-graph core of a real-time 3D renderer.
//!
//! ## Features
//!
//! - **Transform hierarchy**: arena-backed scene graph with local/world matrix propagation
//! - **Cameras**: perspective and orthographic projections with view offsets
//! - **Lights**: ambient, directional, point, spot, hemisphere and area lights with shadow matrices
//! - **Render lists**: per-frame opaque/transparent buckets sorted for submission
//! - **Backend boundary**: a small trait any GPU backend can implement
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use scene_engine::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ids = IdAllocator::new();
//! let mut scene = Scene::new(ids.clone());
//!
//! let camera = scene.spawn(NodeKind::Camera(Camera::perspective(75.0, 16.0 / 9.0, 0.1, 100.0)?))?;
//! scene.graph.object_mut(camera)?.position = Vec3::new(0.0, 0.0, 5.0);
//!
//! let geometry = Arc::new(box_geometry(&ids, 1.0, 1.0, 1.0)?);
//! let material = Arc::new(Material::basic(&ids, Color::WHITE));
//! scene.spawn(NodeKind::Mesh(Renderable::new(geometry, material)))?;
//!
//! let mut renderer = Renderer::new(RendererConfig::default());
//! let mut backend = RecordingBackend::new();
//! renderer.render(&mut scene, camera, &mut backend)?;
//! assert_eq!(backend.draws().count(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{CameraDefaults, Config, EngineConfig, RendererConfig},
        foundation::{
            bounds::{Frustum, Sphere, AABB},
            color::Color,
            euler::{Euler, EulerOrder},
            ids::{IdAllocator, ObjectId},
            math::{Mat4, Quat, Transform, Vec3},
        },
        render::{
            box_geometry, plane_geometry, sphere_geometry, BufferAttribute, BufferGeometry, Material,
            MaterialKind, RecordingBackend, RenderBackend, RenderError, Renderer, Texture,
        },
        scene::{
            Background, Camera, Fog, Light, NodeKey, NodeKind, Object3D, Renderable, Scene, SceneError,
            SceneGraph,
        },
    };
}
