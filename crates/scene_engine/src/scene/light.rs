//! Lighting system
//!
//! Lights are scene nodes; their position comes from the node's world
//! matrix. Directional and spot lights aim at a world-space target point.

use crate::foundation::color::Color;
use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3};
use crate::scene::camera::{Camera, CameraError};
use crate::scene::object::default_up;

/// Light kinds and their kind-specific parameters
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Uniform light from every direction
    Ambient,
    /// Parallel rays (like sunlight) travelling from the light towards `target`
    Directional {
        /// World-space point the light aims at
        target: Vec3,
    },
    /// Omnidirectional light (like a lightbulb)
    Point {
        /// Cutoff distance, 0 for none
        distance: f32,
        /// Falloff exponent
        decay: f32,
    },
    /// Cone of light (like a flashlight)
    Spot {
        /// World-space point the light aims at
        target: Vec3,
        /// Cutoff distance, 0 for none
        distance: f32,
        /// Cone half-angle in radians
        angle: f32,
        /// Fraction of the cone attenuated by the penumbra
        penumbra: f32,
        /// Falloff exponent
        decay: f32,
    },
    /// Sky/ground gradient light
    Hemisphere {
        /// Color from below
        ground_color: Color,
    },
    /// Emitting rectangle
    RectArea {
        /// Rectangle width
        width: f32,
        /// Rectangle height
        height: f32,
    },
}

/// Light source
#[derive(Debug, Clone)]
pub struct Light {
    /// Light color (sky color for hemisphere lights)
    pub color: Color,
    /// Light intensity
    pub intensity: f32,
    /// Light type and parameters
    pub kind: LightKind,
    /// Shadow configuration, for kinds that can cast shadows
    pub shadow: Option<LightShadow>,
}

const DEFAULT_INTENSITY: f32 = 1.0;

impl Light {
    fn with_kind(color: Color, intensity: f32, kind: LightKind) -> Self {
        Self { color, intensity, kind, shadow: None }
    }

    /// Create an ambient light
    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self::with_kind(color, intensity, LightKind::Ambient)
    }

    /// Create a directional light aimed at the origin
    pub fn directional(color: Color, intensity: f32) -> Self {
        Self::with_kind(color, intensity, LightKind::Directional { target: Vec3::zeros() })
    }

    /// Create a point light
    pub fn point(color: Color, intensity: f32, distance: f32, decay: f32) -> Self {
        Self::with_kind(color, intensity, LightKind::Point { distance, decay })
    }

    /// Create a spot light aimed at the origin
    pub fn spot(color: Color, intensity: f32, distance: f32, angle: f32, penumbra: f32) -> Self {
        Self::with_kind(
            color,
            intensity,
            LightKind::Spot { target: Vec3::zeros(), distance, angle, penumbra, decay: 1.0 },
        )
    }

    /// Create a hemisphere light
    pub fn hemisphere(sky_color: Color, ground_color: Color, intensity: f32) -> Self {
        Self::with_kind(sky_color, intensity, LightKind::Hemisphere { ground_color })
    }

    /// Create a rectangular area light
    pub fn rect_area(color: Color, intensity: f32, width: f32, height: f32) -> Self {
        Self::with_kind(color, intensity, LightKind::RectArea { width, height })
    }

    /// Attach a shadow configuration
    pub fn with_shadow(mut self, shadow: LightShadow) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Aim point for directional and spot lights
    pub fn target(&self) -> Option<Vec3> {
        match self.kind {
            LightKind::Directional { target } | LightKind::Spot { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Move the aim point; ignored by kinds without one
    pub fn set_target(&mut self, new_target: Vec3) {
        if let LightKind::Directional { target } | LightKind::Spot { target, .. } = &mut self.kind {
            *target = new_target;
        } else {
            log::debug!("Light of kind {:?} has no target", self.kind);
        }
    }

    /// Luminous power of a point or spot light, derived from intensity
    pub fn power(&self) -> Option<f32> {
        match self.kind {
            LightKind::Point { .. } => Some(self.intensity * 4.0 * std::f32::consts::PI),
            LightKind::Spot { .. } => Some(self.intensity * std::f32::consts::PI),
            _ => None,
        }
    }

    /// Whether this kind supports shadow maps
    pub fn can_cast_shadow(&self) -> bool {
        matches!(
            self.kind,
            LightKind::Directional { .. } | LightKind::Point { .. } | LightKind::Spot { .. }
        )
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::ambient(Color::WHITE, DEFAULT_INTENSITY)
    }
}

// Maps clip space [-1, 1] to texture space [0, 1]
fn shadow_bias_matrix() -> Mat4 {
    Mat4::new(
        0.5, 0.0, 0.0, 0.5,
        0.0, 0.5, 0.0, 0.5,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Shadow map settings and the matrices of the shadow camera
#[derive(Debug, Clone)]
pub struct LightShadow {
    /// Camera rendering the shadow map
    pub camera: Camera,
    /// Depth bias applied when sampling
    pub bias: f32,
    /// Blur radius
    pub radius: f32,
    /// Shadow map resolution
    pub map_size: Vec2,
    matrix: Mat4,
}

impl LightShadow {
    /// Shadow rendered through an arbitrary camera
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            bias: 0.0,
            radius: 1.0,
            map_size: Vec2::new(512.0, 512.0),
            matrix: Mat4::identity(),
        }
    }

    /// Default shadow for directional lights
    pub fn directional() -> Result<Self, CameraError> {
        Ok(Self::new(Camera::orthographic(-5.0, 5.0, 5.0, -5.0, 0.5, 500.0)?))
    }

    /// Default shadow for spot lights
    pub fn spot() -> Result<Self, CameraError> {
        Ok(Self::new(Camera::perspective(50.0, 1.0, 0.5, 500.0)?))
    }

    /// Default shadow for point lights
    pub fn point() -> Result<Self, CameraError> {
        Ok(Self::new(Camera::perspective(90.0, 1.0, 0.5, 500.0)?))
    }

    /// World-to-shadow-texture matrix from the last update
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// Place the shadow camera at the light looking at `target` and refresh
    /// the shadow matrix
    pub fn update_matrices(&mut self, light_position: &Vec3, target: &Vec3) {
        let rotation = Mat4::look_at_rotation(light_position, target, &default_up());
        let mut world = rotation.to_homogeneous();
        world.fixed_view_mut::<3, 1>(0, 3).copy_from(light_position);

        self.camera.update_matrix_world_inverse(&world);
        self.matrix = shadow_bias_matrix() * self.camera.view_projection();
    }
}
