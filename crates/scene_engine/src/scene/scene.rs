//! Scene root
//!
//! A [`Scene`] owns a [`SceneGraph`] and the root node everything rendered
//! hangs from, together with the global render settings: background, fog
//! and an optional material overriding every object's own.

use std::sync::Arc;

use crate::foundation::color::Color;
use crate::foundation::ids::{IdAllocator, ObjectId};
use crate::render::material::Material;
use crate::render::texture::{CubeTexture, RenderTarget, Texture};
use crate::scene::graph::{NodeKey, NodeKind, SceneError, SceneGraph};
use crate::scene::object::Object3D;

/// What is drawn behind the scene
#[derive(Debug, Clone)]
pub enum Background {
    /// Solid clear color
    Color(Color),
    /// Screen-filling texture
    Texture(Arc<Texture>),
    /// Environment cube
    CubeTexture(Arc<CubeTexture>),
    /// Output of another render pass
    RenderTarget(Arc<RenderTarget>),
}

/// Distance fog
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fog {
    /// Density grows linearly between `near` and `far`
    Linear {
        /// Fog color
        color: Color,
        /// Distance where fog starts
        near: f32,
        /// Distance where fog is opaque
        far: f32,
    },
    /// Density grows exponentially with squared distance
    Exp2 {
        /// Fog color
        color: Color,
        /// Density
        density: f32,
    },
}

impl Fog {
    /// Linear fog from 1 to 1000 units
    pub fn linear(color: Color) -> Self {
        Self::Linear { color, near: 1.0, far: 1000.0 }
    }

    /// Exponential fog with the default density
    pub fn exp2(color: Color) -> Self {
        Self::Exp2 { color, density: 0.000_25 }
    }

    /// Fog color
    pub fn color(&self) -> Color {
        match *self {
            Self::Linear { color, .. } | Self::Exp2 { color, .. } => color,
        }
    }

    /// Fraction of fog color mixed in at `distance` from the camera, in [0, 1]
    pub fn factor(&self, distance: f32) -> f32 {
        match *self {
            Self::Linear { near, far, .. } => {
                if far <= near {
                    return if distance >= far { 1.0 } else { 0.0 };
                }
                ((distance - near) / (far - near)).clamp(0.0, 1.0)
            }
            Self::Exp2 { density, .. } => {
                let d = density * distance;
                (1.0 - (-d * d).exp()).clamp(0.0, 1.0)
            }
        }
    }
}

/// Root of a renderable hierarchy
#[derive(Debug, Clone)]
pub struct Scene {
    /// Nodes of this scene, cameras included
    pub graph: SceneGraph,
    root: NodeKey,
    /// Drawn behind everything; `None` keeps the renderer's clear color
    pub background: Option<Background>,
    /// Distance fog
    pub fog: Option<Fog>,
    /// Material used for every object instead of its own
    pub override_material: Option<Arc<Material>>,
    /// Update world matrices from the root before rendering
    pub auto_update: bool,
}

impl Scene {
    /// Empty scene; ids of its nodes come from `ids`
    pub fn new(ids: IdAllocator) -> Self {
        let mut graph = SceneGraph::new(ids);
        let object = Object3D::new(graph.ids()).with_name("Scene");
        let root = graph.insert(object, NodeKind::Empty);
        Self {
            graph,
            root,
            background: None,
            fog: None,
            override_material: None,
            auto_update: true,
        }
    }

    /// Root node
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Object id of the root, identifying the scene
    pub fn id(&self) -> ObjectId {
        self.graph.object(self.root).map_or_else(|_| ObjectId::default(), Object3D::id)
    }

    /// Shared id allocator
    pub fn ids(&self) -> &IdAllocator {
        self.graph.ids()
    }

    /// Create a node and attach it under the root
    pub fn spawn(&mut self, kind: NodeKind) -> Result<NodeKey, SceneError> {
        let key = self.graph.create(kind);
        self.graph.add(self.root, key)?;
        Ok(key)
    }

    /// Insert a prepared object and attach it under `parent`
    pub fn spawn_under(&mut self, parent: NodeKey, object: Object3D, kind: NodeKind) -> Result<NodeKey, SceneError> {
        let key = self.graph.insert(object, kind);
        if let Err(error) = self.graph.add(parent, key) {
            self.graph.remove_subtree(key)?;
            return Err(error);
        }
        Ok(key)
    }

    /// Attach an existing node under the root
    pub fn add(&mut self, child: NodeKey) -> Result<(), SceneError> {
        self.graph.add(self.root, child)
    }

    /// Detach a node from the root
    pub fn remove(&mut self, child: NodeKey) -> bool {
        self.graph.remove(self.root, child)
    }

    /// Update world matrices of the whole scene
    pub fn update_matrix_world(&mut self, force: bool) -> Result<(), SceneError> {
        self.graph.update_matrix_world(self.root, force)
    }

    /// Replace the background
    pub fn set_background(&mut self, background: Option<Background>) {
        self.background = background;
    }

    /// Background color, when the background is a plain color
    pub fn background_color(&self) -> Option<Color> {
        match self.background {
            Some(Background::Color(color)) => Some(color),
            _ => None,
        }
    }

    /// Release everything the scene holds; only the empty root remains
    pub fn dispose(&mut self) {
        self.background = None;
        self.fog = None;
        self.override_material = None;

        let children = self.graph.children(self.root).to_vec();
        let mut freed = 0;
        for child in children {
            freed += self.graph.remove_subtree(child).unwrap_or(0);
        }
        let detached: Vec<NodeKey> = self.graph.roots().filter(|&k| k != self.root).collect();
        for key in detached {
            freed += self.graph.remove_subtree(key).unwrap_or(0);
        }
        log::debug!("Disposed scene {}: {freed} node(s) released", self.id());
    }
}
