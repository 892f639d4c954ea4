use std::sync::Arc;

use approx::assert_relative_eq;

use crate::core::config::RendererConfig;
use crate::foundation::color::Color;
use crate::foundation::ids::{IdAllocator, ObjectId};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::backend::{ClearFlags, RecordingBackend};
use crate::render::geometry::BufferGeometry;
use crate::render::material::Material;
use crate::render::primitives::box_geometry;
use crate::render::renderer::{RenderError, Renderer};
use crate::scene::camera::Camera;
use crate::scene::graph::{NodeKey, NodeKind, Renderable, SceneError};
use crate::scene::light::{Light, LightShadow};
use crate::scene::scene::{Background, Scene};

struct Harness {
    ids: IdAllocator,
    scene: Scene,
    camera: NodeKey,
    geometry: Arc<BufferGeometry>,
    renderer: Renderer,
    backend: RecordingBackend,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(RendererConfig::default())
    }

    fn with_config(config: RendererConfig) -> Self {
        let ids = IdAllocator::new();
        let mut scene = Scene::new(ids.clone());
        let camera = Camera::perspective(75.0, 1.0, 0.1, 100.0).unwrap();
        let camera = scene.spawn(NodeKind::Camera(camera)).unwrap();
        scene.graph.object_mut(camera).unwrap().position = Vec3::new(0.0, 0.0, 10.0);
        let geometry = Arc::new(box_geometry(&ids, 1.0, 1.0, 1.0).unwrap());

        Self {
            ids,
            scene,
            camera,
            geometry,
            renderer: Renderer::new(config),
            backend: RecordingBackend::new(),
        }
    }

    fn material(&self, transparent: bool) -> Arc<Material> {
        let mut material = Material::lambert(&self.ids, Color::WHITE);
        material.transparent = transparent;
        Arc::new(material)
    }

    fn mesh_under(&mut self, parent: NodeKey, material: &Arc<Material>, position: Vec3) -> NodeKey {
        let renderable = Renderable::new(Arc::clone(&self.geometry), Arc::clone(material));
        let key = self.scene.graph.create(NodeKind::Mesh(renderable));
        self.scene.graph.object_mut(key).unwrap().position = position;
        self.scene.graph.add(parent, key).unwrap();
        key
    }

    fn mesh(&mut self, material: &Arc<Material>, z: f32) -> NodeKey {
        let root = self.scene.root();
        self.mesh_under(root, material, Vec3::new(0.0, 0.0, z))
    }

    fn render(&mut self) -> Result<(), RenderError> {
        self.backend.reset();
        self.renderer.render(&mut self.scene, self.camera, &mut self.backend)
    }

    fn drawn(&self) -> Vec<NodeKey> {
        self.backend.draws().map(|call| call.object).collect()
    }

    fn camera_id(&self) -> ObjectId {
        self.scene.graph.object(self.camera).unwrap().id()
    }
}

#[test]
fn test_opaque_front_to_back_then_transparent_back_to_front() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let glass = h.material(true);
    let mid = h.mesh(&solid, 0.0);
    let far = h.mesh(&solid, -5.0);
    let near = h.mesh(&solid, 3.0);
    let glass_near = h.mesh(&glass, 2.0);
    let glass_far = h.mesh(&glass, -2.0);

    h.render().unwrap();

    assert_eq!(h.drawn(), vec![near, mid, far, glass_far, glass_near]);
    let flags: Vec<bool> = h.backend.draws().map(|call| call.transparent).collect();
    assert_eq!(flags, vec![false, false, false, true, true]);
    assert_eq!(h.renderer.info().calls, 5);
    assert_eq!(h.renderer.info().opaque, 3);
    assert_eq!(h.renderer.info().transparent, 2);
}

#[test]
fn test_projected_depth_is_monotone_in_distance() {
    let mut h = Harness::new();
    let solid = h.material(false);
    for z in [-40.0, -20.0, -5.0, 0.0, 5.0] {
        h.mesh(&solid, z);
    }

    h.render().unwrap();

    let list = h.renderer.render_list(h.scene.id(), h.camera_id()).unwrap();
    let depths: Vec<f32> = list.opaque().map(|item| item.z).collect();
    assert_eq!(depths.len(), 5);
    for pair in depths.windows(2) {
        assert!(pair[0] < pair[1], "depths not increasing: {depths:?}");
    }
    assert!(depths.iter().all(|z| (-1.0..=1.0).contains(z)));
}

#[test]
fn test_invisible_parent_prunes_subtree() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let root = h.scene.root();
    let group = h.scene.spawn(NodeKind::Group).unwrap();
    let hidden_child = h.mesh_under(group, &solid, Vec3::zeros());
    let shown = h.mesh(&solid, 0.0);
    h.scene.graph.object_mut(group).unwrap().visible = false;

    h.render().unwrap();

    assert_eq!(h.drawn(), vec![shown]);
    assert!(!h.drawn().contains(&hidden_child));
    assert_eq!(h.scene.graph.parent(group), Some(root));
}

#[test]
fn test_layer_mismatch_skips_object_but_not_children() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let parent = h.mesh(&solid, 0.0);
    let child = h.mesh_under(parent, &solid, Vec3::new(1.0, 0.0, 0.0));
    h.scene.graph.object_mut(parent).unwrap().layers.set(3);

    h.render().unwrap();
    assert_eq!(h.drawn(), vec![child]);

    h.scene.graph.object_mut(h.camera).unwrap().layers.enable(3);
    h.render().unwrap();
    assert_eq!(h.drawn().len(), 2);
}

#[test]
fn test_frustum_culling() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let visible = h.mesh(&solid, 0.0);
    let behind = h.mesh(&solid, 20.0);

    h.render().unwrap();
    assert_eq!(h.drawn(), vec![visible]);
    assert_eq!(h.renderer.info().culled, 1);

    h.scene.graph.object_mut(behind).unwrap().frustum_culled = false;
    h.render().unwrap();
    assert_eq!(h.drawn().len(), 2);
    assert_eq!(h.renderer.info().culled, 0);
}

#[test]
fn test_multi_material_mesh_draws_each_visible_group() {
    let mut h = Harness::new();
    let mut materials: Vec<Arc<Material>> = (0..6).map(|_| h.material(false)).collect();
    let mut hidden = Material::basic(&h.ids, Color::BLACK);
    hidden.visible = false;
    materials[2] = Arc::new(hidden);

    let renderable = Renderable::with_materials(Arc::clone(&h.geometry), materials);
    let key = h.scene.spawn(NodeKind::Mesh(renderable)).unwrap();

    h.render().unwrap();

    let groups: Vec<usize> = h
        .backend
        .draws()
        .map(|call| call.group.unwrap().material_index)
        .collect();
    assert_eq!(groups.len(), 5);
    assert!(!groups.contains(&2));
    assert!(h.backend.draws().all(|call| call.object == key));
}

#[test]
fn test_group_render_order_outranks_depth() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let group = h.scene.spawn(NodeKind::Group).unwrap();
    h.scene.graph.object_mut(group).unwrap().render_order = 5;
    let grouped_near = h.mesh_under(group, &solid, Vec3::new(0.0, 0.0, 5.0));
    let loose_far = h.mesh(&solid, -10.0);

    h.render().unwrap();

    assert_eq!(h.drawn(), vec![loose_far, grouped_near]);
}

#[test]
fn test_override_material_replaces_every_material() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let glass = h.material(true);
    h.mesh(&solid, 0.0);
    h.mesh(&glass, 1.0);
    let depth = Arc::new(Material::depth(&h.ids));
    h.scene.override_material = Some(Arc::clone(&depth));

    h.render().unwrap();

    assert_eq!(h.backend.draws().count(), 2);
    assert!(h.backend.draws().all(|call| call.material.id() == depth.id()));
    assert!(h.backend.draws().all(|call| call.program == depth.program_id()));
}

#[test]
fn test_clear_uses_background_color_and_config_flags() {
    let config = RendererConfig::default().with_auto_clear(true, true, false);
    let mut h = Harness::with_config(config);
    h.scene.set_background(Some(Background::Color(Color::new(0.2, 0.3, 0.4))));

    h.render().unwrap();

    let clear = h.backend.clears().next().unwrap();
    assert_eq!(clear.flags, ClearFlags::COLOR | ClearFlags::DEPTH);
    assert_eq!(clear.color, Color::new(0.2, 0.3, 0.4));
    assert_relative_eq!(clear.alpha, 1.0);
}

#[test]
fn test_no_clear_without_flags_or_background() {
    let config = RendererConfig::default().with_auto_clear(false, false, false);
    let mut h = Harness::with_config(config);
    let solid = h.material(false);
    h.mesh(&solid, 0.0);

    h.render().unwrap();

    assert_eq!(h.backend.clears().count(), 0);
    assert_eq!(h.backend.draws().count(), 1);
}

#[test]
fn test_backend_error_aborts_frame() {
    let mut h = Harness::new();
    h.backend = RecordingBackend::new().fail_after(1);
    let solid = h.material(false);
    h.mesh(&solid, 0.0);
    h.mesh(&solid, 1.0);

    let result = h.render();

    assert!(matches!(result, Err(RenderError::Backend(_))));
    assert_eq!(h.backend.draws().count(), 1);
    assert_eq!(h.backend.frames(), 0);
}

#[test]
fn test_rendering_through_non_camera_fails() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let mesh = h.mesh(&solid, 0.0);

    let result = h.renderer.render(&mut h.scene, mesh, &mut h.backend);

    assert!(matches!(
        result,
        Err(RenderError::Scene(SceneError::WrongKind { expected: "camera", .. }))
    ));
}

#[test]
fn test_detached_camera_is_updated() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let target = h.mesh(&solid, 0.0);
    let camera = h.scene.graph.create(NodeKind::Camera(Camera::perspective(50.0, 1.0, 0.1, 50.0).unwrap()));
    h.scene.graph.object_mut(camera).unwrap().position = Vec3::new(0.0, 0.0, 4.0);

    h.renderer.render(&mut h.scene, camera, &mut h.backend).unwrap();

    let call = h.backend.draws().next().unwrap();
    assert_eq!(call.object, target);
    let expected = Mat4::new_translation(&Vec3::new(0.0, 0.0, -4.0));
    assert_relative_eq!(call.model_view, expected, epsilon = 1e-5);
    assert_eq!(h.renderer.info().frame, 1);
}

#[test]
fn test_camera_under_detached_rig_is_updated() {
    let mut h = Harness::new();
    let solid = h.material(false);
    let target = h.mesh(&solid, 0.0);
    let rig = h.scene.graph.create(NodeKind::Group);
    h.scene.graph.object_mut(rig).unwrap().position = Vec3::new(0.0, 0.0, 4.0);
    let camera = h.scene.graph.create(NodeKind::Camera(Camera::perspective(50.0, 1.0, 0.1, 50.0).unwrap()));
    h.scene.graph.object_mut(camera).unwrap().position = Vec3::new(0.0, 0.0, 2.0);
    h.scene.graph.add(rig, camera).unwrap();

    h.renderer.render(&mut h.scene, camera, &mut h.backend).unwrap();

    let call = h.backend.draws().next().unwrap();
    assert_eq!(call.object, target);
    let expected = Mat4::new_translation(&Vec3::new(0.0, 0.0, -6.0));
    assert_relative_eq!(call.model_view, expected, epsilon = 1e-5);
    assert_relative_eq!(
        *h.scene.graph.camera(camera).unwrap().matrix_world_inverse(),
        expected,
        epsilon = 1e-5
    );
}

#[test]
fn test_unsorted_lists_keep_traversal_order() {
    let config = RendererConfig::default().with_sort_objects(false);
    let mut h = Harness::with_config(config);
    let solid = h.material(false);
    let far = h.mesh(&solid, -5.0);
    let near = h.mesh(&solid, 3.0);

    h.render().unwrap();

    assert_eq!(h.drawn(), vec![far, near]);
    let list = h.renderer.render_list(h.scene.id(), h.camera_id()).unwrap();
    assert!(list.opaque().all(|item| item.z == 0.0));
}

#[test]
fn test_lights_gathered_and_shadows_updated() {
    let mut h = Harness::new();
    let sun = Light::directional(Color::WHITE, 1.0).with_shadow(LightShadow::directional().unwrap());
    let sun = h.scene.spawn(NodeKind::Light(sun)).unwrap();
    h.scene.graph.object_mut(sun).unwrap().position = Vec3::new(0.0, 10.0, 0.1);
    h.scene.graph.object_mut(sun).unwrap().cast_shadow = true;
    h.scene.spawn(NodeKind::Light(Light::ambient(Color::WHITE, 0.2))).unwrap();

    h.render().unwrap();

    let state = h.renderer.state();
    assert_eq!(state.lights.len(), 2);
    assert_eq!(state.shadows, vec![sun]);
    assert_eq!(h.backend.light_count(), 2);

    let entry = &state.lights[0];
    assert_relative_eq!(entry.position, Vec3::new(0.0, 10.0, 0.1), epsilon = 1e-5);
    let direction = entry.direction.unwrap();
    assert!(direction.y < -0.99);
    let shadow = entry.light.shadow.as_ref().unwrap();
    assert_ne!(*shadow.matrix(), Mat4::identity());
}

#[test]
fn test_pool_reused_across_frames() {
    let mut h = Harness::new();
    let solid = h.material(false);
    h.mesh(&solid, 0.0);
    h.mesh(&solid, 1.0);

    h.render().unwrap();
    h.render().unwrap();

    let list = h.renderer.render_list(h.scene.id(), h.camera_id()).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.pool_size(), 2);
    assert_eq!(h.renderer.info().frame, 2);

    h.renderer.dispose_scene(&h.scene);
    assert!(h.renderer.render_list(h.scene.id(), h.camera_id()).is_none());
}
