//! # Unified Configuration System
//!
//! Engine-wide settings that can be loaded from TOML or RON files. Every
//! section has defaults, so a config file only needs the keys it changes.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: log filter plus the sections below
//! - **Renderer Config**: sorting, auto-clear behaviour, render-list sizing
//! - **Camera Defaults**: projection parameters for cameras built from config

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};
use crate::foundation::color::Color;
use crate::render::backend::ClearFlags;
use crate::scene::camera::{Camera, CameraError};

/// # Renderer Configuration
///
/// Front-end behaviour of the renderer. Backend specifics live with the
/// backend implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Sort render lists before submission
    pub sort_objects: bool,
    /// Clear the color buffer at the start of a frame
    pub auto_clear_color: bool,
    /// Clear the depth buffer at the start of a frame
    pub auto_clear_depth: bool,
    /// Clear the stencil buffer at the start of a frame
    pub auto_clear_stencil: bool,
    /// Render items preallocated per render list
    pub render_list_capacity: usize,
    /// Clear color used when the scene has no background
    pub clear_color: Color,
    /// Alpha of the clear color
    pub clear_alpha: f32,
}

impl RendererConfig {
    /// Create a renderer configuration with defaults
    pub fn new() -> Self {
        Self {
            sort_objects: true,
            auto_clear_color: true,
            auto_clear_depth: true,
            auto_clear_stencil: true,
            render_list_capacity: 64,
            clear_color: Color::BLACK,
            clear_alpha: 1.0,
        }
    }

    /// Enable or disable render-list sorting
    pub fn with_sort_objects(mut self, enabled: bool) -> Self {
        self.sort_objects = enabled;
        self
    }

    /// Configure which buffers are cleared automatically
    pub fn with_auto_clear(mut self, color: bool, depth: bool, stencil: bool) -> Self {
        self.auto_clear_color = color;
        self.auto_clear_depth = depth;
        self.auto_clear_stencil = stencil;
        self
    }

    /// Set the initial render-list capacity
    pub fn with_render_list_capacity(mut self, capacity: usize) -> Self {
        self.render_list_capacity = capacity;
        self
    }

    /// Set the clear color and alpha
    pub fn with_clear_color(mut self, color: Color, alpha: f32) -> Self {
        self.clear_color = color;
        self.clear_alpha = alpha;
        self
    }

    /// Auto-clear settings as backend flags
    pub fn clear_flags(&self) -> ClearFlags {
        let mut flags = ClearFlags::empty();
        flags.set(ClearFlags::COLOR, self.auto_clear_color);
        flags.set(ClearFlags::DEPTH, self.auto_clear_depth);
        flags.set(ClearFlags::STENCIL, self.auto_clear_stencil);
        flags
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.clear_alpha) {
            return Err(ConfigError::Validation(format!(
                "Clear alpha must be within [0, 1], got {}",
                self.clear_alpha
            )));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Camera Defaults
///
/// Perspective parameters for cameras created from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDefaults {
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
}

impl CameraDefaults {
    /// Create camera defaults
    pub fn new() -> Self {
        Self { fov: 50.0, near: 0.1, far: 2000.0 }
    }

    /// Set the field of view in degrees
    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = fov;
        self
    }

    /// Set the clipping planes
    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Build a perspective camera for the given aspect ratio
    pub fn build_perspective(&self, aspect: f32) -> Result<Camera, CameraError> {
        Camera::perspective(self.fov, aspect, self.near, self.far)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(ConfigError::Validation(format!(
                "Camera fov must be within (0, 180) degrees, got {}",
                self.fov
            )));
        }
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(ConfigError::Validation(format!(
                "Camera clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near, self.far
            )));
        }
        Ok(())
    }
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self::new()
    }
}

/// # Engine Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
/// This is the main configuration structure applications should use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter handed to the logger, e.g. `"info"` or `"scene_engine=debug"`
    pub log_level: String,
    /// Renderer front-end configuration
    pub renderer: RendererConfig,
    /// Defaults for cameras built from configuration
    pub camera: CameraDefaults,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            renderer: RendererConfig::default(),
            camera: CameraDefaults::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set renderer configuration
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Set camera defaults
    pub fn with_camera(mut self, camera: CameraDefaults) -> Self {
        self.camera = camera;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Validation("Log level cannot be empty".to_string()));
        }
        self.renderer.validate()?;
        self.camera.validate()?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}
