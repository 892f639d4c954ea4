//! Renderer front-end
//!
//! Turns a [`Scene`] seen through a camera into an ordered stream of backend
//! commands. A frame has two phases:
//!
//! 1. [`Renderer::prepare`] updates world matrices, culls against the camera
//!    frustum and fills the (scene, camera) render list, then sorts it.
//! 2. [`Renderer::submit`] clears the framebuffer and hands every list item
//!    to the backend, opaque items before transparent ones.
//!
//! [`Renderer::render`] runs both.

use std::f32::consts::FRAC_1_SQRT_2;

use thiserror::Error;

use crate::core::config::RendererConfig;
use crate::foundation::bounds::{Frustum, Sphere};
use crate::foundation::ids::ObjectId;
use crate::foundation::math::{Mat4, Mat4Ext, Point3, Vec3};
use crate::render::backend::{BackendError, ClearRequest, DrawCall, RenderBackend};
use crate::render::geometry::BufferGeometry;
use crate::render::render_list::{
    painter_sort_stable, reverse_painter_sort_stable, RenderList, RenderLists, SortFn,
};
use crate::scene::graph::{NodeKey, NodeKind, SceneError, SceneGraph};
use crate::scene::layers::Layers;
use crate::scene::light::Light;
use crate::scene::object::Object3D;
use crate::scene::scene::Scene;

/// Errors that abort a frame
#[derive(Debug, Error)]
pub enum RenderError {
    /// The scene or camera is not in a renderable state
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// The backend rejected a command
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Light gathered for the current frame
#[derive(Debug, Clone)]
pub struct LightEntry {
    /// Light node
    pub object: NodeKey,
    /// Id of the light node
    pub id: ObjectId,
    /// Light parameters, shadow matrices included
    pub light: Light,
    /// World-space position
    pub position: Vec3,
    /// World-space direction for aimed lights
    pub direction: Option<Vec3>,
}

/// Per-frame lighting state
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    /// Visible lights in traversal order
    pub lights: Vec<LightEntry>,
    /// Lights that cast shadows this frame
    pub shadows: Vec<NodeKey>,
}

impl RenderState {
    fn clear(&mut self) {
        self.lights.clear();
        self.shadows.clear();
    }
}

/// Counters for the most recent frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Frames submitted so far
    pub frame: u64,
    /// Draw calls issued in the last frame
    pub calls: usize,
    /// Opaque items in the last render list
    pub opaque: usize,
    /// Transparent items in the last render list
    pub transparent: usize,
    /// Renderable objects rejected by frustum culling
    pub culled: usize,
    /// Lights gathered in the last frame
    pub lights: usize,
}

/// Scene-to-backend front-end
pub struct Renderer {
    config: RendererConfig,
    lists: RenderLists,
    state: RenderState,
    info: RenderInfo,
    opaque_sort: Option<SortFn>,
    transparent_sort: Option<SortFn>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("lists", &self.lists.len())
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Create a renderer
    pub fn new(config: RendererConfig) -> Self {
        log::debug!("Creating renderer: {config:?}");
        Self {
            lists: RenderLists::new(config.render_list_capacity),
            config,
            state: RenderState::default(),
            info: RenderInfo::default(),
            opaque_sort: None,
            transparent_sort: None,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Mutable configuration; takes effect on the next frame
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// Counters for the last frame
    pub fn info(&self) -> &RenderInfo {
        &self.info
    }

    /// Lights gathered by the last [`prepare`](Self::prepare)
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Render list of a scene/camera pair, if it has been prepared
    pub fn render_list(&self, scene: ObjectId, camera: ObjectId) -> Option<&RenderList> {
        self.lists.find(scene, camera)
    }

    /// Replace the opaque ordering; `None` restores the default
    pub fn set_opaque_sort(&mut self, sort: Option<SortFn>) {
        self.opaque_sort = sort;
    }

    /// Replace the transparent ordering; `None` restores the default
    pub fn set_transparent_sort(&mut self, sort: Option<SortFn>) {
        self.transparent_sort = sort;
    }

    /// Build and sort the render list for `scene` seen from `camera`
    ///
    /// `camera` must be a camera node of the scene's graph. It does not have
    /// to be attached under the scene root; a camera outside the root's
    /// subtree is refreshed together with its own ancestors.
    pub fn prepare(&mut self, scene: &mut Scene, camera: NodeKey) -> Result<(), RenderError> {
        scene.graph.camera(camera)?;

        if scene.auto_update {
            scene.update_matrix_world(false)?;
        }
        if scene.graph.parent(camera).is_none() {
            scene.graph.update_matrix_world(camera, false)?;
        } else if !scene.graph.is_ancestor_or_self(scene.root(), camera) {
            scene.graph.update_world_matrix(camera, true, false)?;
        }

        let camera_object = scene.graph.object(camera)?;
        let camera_id = camera_object.id();
        let camera_layers = camera_object.layers;
        let camera_state = scene.graph.camera(camera)?;
        let proj_screen = camera_state.projection_matrix() * camera_state.matrix_world_inverse();

        self.state.clear();
        let scene_id = scene.id();
        let list = self.lists.get(scene_id, camera_id);
        list.init();

        let mut projector = Projector {
            graph: &scene.graph,
            frustum: Frustum::from_matrix(&proj_screen),
            proj_screen,
            camera_layers,
            sort_objects: self.config.sort_objects,
            list,
            lights: Vec::new(),
            shadows: Vec::new(),
            culled: 0,
        };
        projector.project(scene.root());
        let Projector { lights, shadows, culled, .. } = projector;

        if self.config.sort_objects {
            self.lists.get(scene_id, camera_id).sort_with(
                self.opaque_sort.unwrap_or(painter_sort_stable),
                self.transparent_sort.unwrap_or(reverse_painter_sort_stable),
            );
        }

        self.gather_lights(&mut scene.graph, &lights, &shadows)?;

        let list = self.lists.get(scene_id, camera_id);
        self.info.opaque = list.opaque().len();
        self.info.transparent = list.transparent().len();
        self.info.culled = culled;
        self.info.lights = self.state.lights.len();
        log::trace!(
            "Prepared scene {scene_id} for camera {camera_id}: {} opaque, {} transparent, {culled} culled",
            self.info.opaque,
            self.info.transparent
        );
        Ok(())
    }

    fn gather_lights(
        &mut self,
        graph: &mut SceneGraph,
        lights: &[NodeKey],
        shadows: &[NodeKey],
    ) -> Result<(), RenderError> {
        for &key in shadows {
            let position = graph.object(key)?.matrix_world().translation_part();
            let light = graph.light_mut(key)?;
            let target = light.target().unwrap_or(position - Vec3::y());
            if let Some(shadow) = light.shadow.as_mut() {
                shadow.update_matrices(&position, &target);
            } else {
                log::debug!("Light {key:?} casts shadows but has no shadow configuration");
            }
        }

        for &key in lights {
            let node = graph.get(key).ok_or(SceneError::MissingNode(key))?;
            let Some(light) = node.kind.as_light() else {
                continue;
            };
            let position = node.object.matrix_world().translation_part();
            let direction = light
                .target()
                .and_then(|target| (target - position).try_normalize(f32::EPSILON));
            self.state.lights.push(LightEntry {
                object: key,
                id: node.object.id(),
                light: light.clone(),
                position,
                direction,
            });
        }
        self.state.shadows.extend_from_slice(shadows);
        Ok(())
    }

    /// Send the prepared render list of `scene`/`camera` to `backend`
    pub fn submit<B>(&mut self, scene: &Scene, camera: NodeKey, backend: &mut B) -> Result<(), RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        let camera_state = scene.graph.camera(camera)?;
        let camera_id = scene.graph.object(camera)?.id();
        let view = *camera_state.matrix_world_inverse();
        let projection = *camera_state.projection_matrix();

        backend.set_lights(&self.state)?;

        let flags = self.config.clear_flags();
        if !flags.is_empty() || scene.background.is_some() {
            let (color, alpha) = match scene.background_color() {
                Some(color) => (color, 1.0),
                None => (self.config.clear_color, self.config.clear_alpha),
            };
            backend.clear(&ClearRequest {
                flags,
                color,
                alpha,
                background: scene.background.clone(),
            })?;
        }

        let mut calls = 0;
        if let Some(list) = self.lists.find(scene.id(), camera_id) {
            let passes = list
                .opaque()
                .map(|item| (false, item))
                .chain(list.transparent().map(|item| (true, item)));

            for (transparent, item) in passes {
                let object = scene.graph.object(item.object)?;
                let material = scene.override_material.as_ref().unwrap_or(&item.material);
                let model_view = view * object.matrix_world();

                backend.draw(&DrawCall {
                    object: item.object,
                    object_id: item.id,
                    geometry: item.geometry.clone(),
                    material: material.clone(),
                    program: material.program_id(),
                    group: item.group,
                    model_view,
                    normal_matrix: object.normal_matrix(&view),
                    projection,
                    transparent,
                })?;
                calls += 1;
            }
        } else {
            log::warn!("Submitting scene {} for camera {camera_id} before it was prepared", scene.id());
        }

        backend.end_frame()?;
        self.info.calls = calls;
        self.info.frame += 1;
        Ok(())
    }

    /// Prepare and submit one frame
    pub fn render<B>(&mut self, scene: &mut Scene, camera: NodeKey, backend: &mut B) -> Result<(), RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        self.prepare(scene, camera)?;
        self.submit(scene, camera, backend)
    }

    /// Drop the render lists of a scene
    pub fn dispose_scene(&mut self, scene: &Scene) {
        self.lists.dispose_scene(scene.id());
    }

    /// Drop every render list and the gathered lights
    pub fn dispose(&mut self) {
        self.lists.dispose();
        self.state.clear();
    }
}

// Walks the scene once per frame, pushing visible renderables into the list
struct Projector<'a> {
    graph: &'a SceneGraph,
    frustum: Frustum,
    proj_screen: Mat4,
    camera_layers: Layers,
    sort_objects: bool,
    list: &'a mut RenderList,
    lights: Vec<NodeKey>,
    shadows: Vec<NodeKey>,
    culled: usize,
}

impl Projector<'_> {
    fn project(&mut self, root: NodeKey) {
        let mut stack = vec![(root, 0_i32)];
        while let Some((key, mut group_order)) = stack.pop() {
            let Some(node) = self.graph.get(key) else {
                continue;
            };
            let object = &node.object;
            if !object.visible {
                continue;
            }

            if object.layers.test(&self.camera_layers) {
                match &node.kind {
                    NodeKind::Group => group_order = object.render_order,
                    NodeKind::Light(_) => {
                        self.lights.push(key);
                        if object.cast_shadow {
                            self.shadows.push(key);
                        }
                    }
                    NodeKind::Sprite(renderable) => {
                        if !object.frustum_culled || self.sprite_in_frustum(object) {
                            let z = self.depth(object);
                            if let Some(material) = renderable.material().filter(|m| m.visible) {
                                self.list.push(key, object, &renderable.geometry, material, group_order, z, None);
                            }
                        } else {
                            self.culled += 1;
                        }
                    }
                    NodeKind::Mesh(renderable) | NodeKind::Line(renderable) | NodeKind::Points(renderable) => {
                        if !object.frustum_culled || self.in_frustum(object, &renderable.geometry) {
                            let z = self.depth(object);
                            if renderable.is_multi_material() {
                                for group in renderable.geometry.groups() {
                                    let material = renderable.materials.get(group.material_index);
                                    if let Some(material) = material.filter(|m| m.visible) {
                                        self.list.push(
                                            key,
                                            object,
                                            &renderable.geometry,
                                            material,
                                            group_order,
                                            z,
                                            Some(*group),
                                        );
                                    }
                                }
                            } else if let Some(material) = renderable.material().filter(|m| m.visible) {
                                self.list.push(key, object, &renderable.geometry, material, group_order, z, None);
                            }
                        } else {
                            self.culled += 1;
                        }
                    }
                    NodeKind::Empty | NodeKind::Camera(_) => {}
                }
            }

            stack.extend(node.children().iter().rev().map(|&child| (child, group_order)));
        }
    }

    // Normalized device depth of the object's world position
    fn depth(&self, object: &Object3D) -> f32 {
        if !self.sort_objects {
            return 0.0;
        }
        let position = object.matrix_world().translation_part();
        self.proj_screen.transform_point(&Point3::from(position)).z
    }

    fn in_frustum(&self, object: &Object3D, geometry: &BufferGeometry) -> bool {
        match geometry.bounding_sphere_or_compute() {
            Ok(sphere) if !sphere.is_empty() => {
                self.frustum.intersects_sphere(&sphere.transformed(object.matrix_world()))
            }
            Ok(_) => false,
            Err(error) => {
                log::warn!("Culling object {}: {error}", object.id());
                false
            }
        }
    }

    fn sprite_in_frustum(&self, object: &Object3D) -> bool {
        let sphere = Sphere::new(Vec3::zeros(), FRAC_1_SQRT_2).transformed(object.matrix_world());
        self.frustum.intersects_sphere(&sphere)
    }
}
