//! Headless scene demo
//!
//! Builds a small scene (ground plane, a spinning group of boxes, a glass
//! sphere and two lights), renders a few frames into the recording backend
//! and logs the resulting draw order.
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use std::path::PathBuf;
use std::sync::Arc;

use scene_engine::core::config::{Config, ConfigError, EngineConfig};
use scene_engine::foundation::color::Color;
use scene_engine::foundation::ids::IdAllocator;
use scene_engine::foundation::logging;
use scene_engine::foundation::math::Vec3;
use scene_engine::render::{
    box_geometry, plane_geometry, sphere_geometry, GeometryError, Material, RecordingBackend,
    RenderError, Renderer,
};
use scene_engine::scene::{
    Background, CameraError, Fog, Light, LightShadow, NodeKey, NodeKind, Renderable, Scene,
    SceneError,
};
use thiserror::Error;

const FRAMES: usize = 3;

#[derive(Debug, Error)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

struct Demo {
    scene: Scene,
    camera: NodeKey,
    spinner: NodeKey,
}

impl Demo {
    fn build(config: &EngineConfig) -> Result<Self, DemoError> {
        let ids = IdAllocator::new();
        let mut scene = Scene::new(ids.clone());
        scene.set_background(Some(Background::Color(Color::from_hex(0x20_20_30))));
        scene.fog = Some(Fog::linear(Color::from_hex(0x20_20_30)));

        let camera = config.camera.build_perspective(16.0 / 9.0)?;
        let camera = scene.spawn(NodeKind::Camera(camera))?;
        scene.graph.object_mut(camera)?.position = Vec3::new(4.0, 3.0, 10.0);
        scene.graph.look_at(camera, &Vec3::zeros())?;

        let ground = Renderable::new(
            Arc::new(plane_geometry(&ids, 20.0, 20.0, 4, 4)?),
            Arc::new(Material::lambert(&ids, Color::from_hex(0x55_77_55)).with_name("ground")),
        );
        let ground = scene.spawn(NodeKind::Mesh(ground))?;
        {
            let object = scene.graph.object_mut(ground)?;
            object.name = "ground".to_string();
            object.rotate_x(-std::f32::consts::FRAC_PI_2);
            object.receive_shadow = true;
        }

        let spinner = scene.spawn(NodeKind::Group)?;
        scene.graph.object_mut(spinner)?.name = "spinner".to_string();
        let cube = Arc::new(box_geometry(&ids, 1.0, 1.0, 1.0)?);
        let crate_material = Arc::new(Material::phong(&ids, Color::from_hex(0xcc_88_44), 30.0));
        for (i, x) in [-2.0_f32, 0.0, 2.0].into_iter().enumerate() {
            let key = scene.graph.create(NodeKind::Mesh(Renderable::new(
                Arc::clone(&cube),
                Arc::clone(&crate_material),
            )));
            let object = scene.graph.object_mut(key)?;
            object.name = format!("box-{i}");
            object.position = Vec3::new(x, 0.5, 0.0);
            object.cast_shadow = true;
            scene.graph.add(spinner, key)?;
        }

        let glass = Material::standard(&ids, Color::from_hex(0x88_cc_ff), 0.1, 0.0)
            .with_transparency(0.4);
        let sphere = Renderable::new(
            Arc::new(sphere_geometry(&ids, 0.75, 24, 16)?),
            Arc::new(glass),
        );
        let sphere = scene.spawn(NodeKind::Mesh(sphere))?;
        {
            let object = scene.graph.object_mut(sphere)?;
            object.name = "glass".to_string();
            object.position = Vec3::new(0.0, 1.5, 2.0);
        }

        let mut sun = Light::directional(Color::WHITE, 1.5).with_shadow(LightShadow::directional()?);
        sun.set_target(Vec3::zeros());
        let sun = scene.spawn(NodeKind::Light(sun))?;
        {
            let object = scene.graph.object_mut(sun)?;
            object.name = "sun".to_string();
            object.position = Vec3::new(5.0, 10.0, 7.5);
            object.cast_shadow = true;
        }
        scene.spawn(NodeKind::Light(Light::ambient(Color::WHITE, 0.3)))?;

        log::info!("Scene built with {} node(s)", scene.graph.len());
        Ok(Self { scene, camera, spinner })
    }

    fn step(&mut self, angle: f32) -> Result<(), DemoError> {
        self.scene.graph.object_mut(self.spinner)?.rotate_y(angle);
        Ok(())
    }

    fn log_draws(&self, frame: usize, backend: &RecordingBackend) {
        for (order, call) in backend.draws().enumerate() {
            let name = self
                .scene
                .graph
                .object(call.object)
                .map(|object| object.name.as_str())
                .unwrap_or("?");
            log::info!(
                "frame {frame} draw {order}: {name} (object {}, material {}, {})",
                call.object_id,
                call.material.id(),
                if call.transparent { "transparent" } else { "opaque" }
            );
        }
    }
}

fn load_config() -> Result<EngineConfig, ConfigError> {
    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            let config = EngineConfig::load_from_file(&path)?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init_with_filter(&config.log_level);
    log::info!("Starting scene demo");

    let mut demo = Demo::build(&config)?;
    let mut renderer = Renderer::new(config.renderer.clone());
    let mut backend = RecordingBackend::new();

    for frame in 0..FRAMES {
        backend.reset();
        demo.step(0.25)?;
        renderer.render(&mut demo.scene, demo.camera, &mut backend)?;
        demo.log_draws(frame, &backend);

        let info = renderer.info();
        log::info!(
            "frame {frame}: {} call(s), {} opaque, {} transparent, {} culled, {} light(s)",
            info.calls,
            info.opaque,
            info.transparent,
            info.culled,
            info.lights
        );
    }

    renderer.dispose_scene(&demo.scene);
    demo.scene.dispose();
    log::info!("Scene demo finished after {} frame(s)", backend.frames());
    Ok(())
}
