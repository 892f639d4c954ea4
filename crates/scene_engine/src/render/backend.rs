//! Backend abstraction for the rendering system
//!
//! The renderer front-end decides *what* is drawn and in which order; a
//! [`RenderBackend`] turns the resulting clear requests and draw calls into
//! GPU work. [`RecordingBackend`] keeps them in memory instead, for headless
//! runs and tests.

use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::color::Color;
use crate::foundation::ids::ObjectId;
use crate::foundation::math::{Mat3, Mat4};
use crate::render::geometry::{BufferGeometry, GeometryGroup};
use crate::render::material::{Material, ProgramId};
use crate::render::renderer::RenderState;
use crate::scene::graph::NodeKey;
use crate::scene::scene::Background;

bitflags! {
    /// Framebuffer attachments cleared at the start of a frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// Color attachment
        const COLOR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
        /// Stencil attachment
        const STENCIL = 1 << 2;
    }
}

/// Error reported by a backend
#[derive(Debug, Error)]
#[error("Render backend error: {message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Error wrapping the backend's own error type
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Human-readable description
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Start-of-frame clear
#[derive(Debug, Clone)]
pub struct ClearRequest {
    /// Attachments to clear
    pub flags: ClearFlags,
    /// Clear color (the scene background color when it has one)
    pub color: Color,
    /// Clear alpha
    pub alpha: f32,
    /// Scene background to draw behind everything
    pub background: Option<Background>,
}

/// One draw of one geometry (or geometry group) with one material
#[derive(Debug, Clone)]
pub struct DrawCall {
    /// Object being drawn
    pub object: NodeKey,
    /// Id of the object being drawn
    pub object_id: ObjectId,
    /// Vertex data
    pub geometry: Arc<BufferGeometry>,
    /// Material, after any scene override
    pub material: Arc<Material>,
    /// Shader variant of `material`
    pub program: ProgramId,
    /// Restricts the draw to one group of the geometry
    pub group: Option<GeometryGroup>,
    /// Object-to-view transform
    pub model_view: Mat4,
    /// Inverse transpose of the model-view rotation/scale
    pub normal_matrix: Mat3,
    /// Camera projection
    pub projection: Mat4,
    /// Drawn during the transparent pass
    pub transparent: bool,
}

/// Main rendering backend trait
///
/// Calls arrive in frame order: optionally [`set_lights`](Self::set_lights),
/// then one [`clear`](Self::clear), then draws (opaque before transparent),
/// then [`end_frame`](Self::end_frame).
pub trait RenderBackend {
    /// Clear the framebuffer and draw the background
    fn clear(&mut self, request: &ClearRequest) -> BackendResult<()>;

    /// Issue one draw call
    fn draw(&mut self, call: &DrawCall) -> BackendResult<()>;

    /// Upload the lights gathered for this frame
    fn set_lights(&mut self, _state: &RenderState) -> BackendResult<()> {
        Ok(())
    }

    /// Finish and present the frame
    fn end_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }
}

/// Command captured by [`RecordingBackend`]
#[derive(Debug, Clone)]
pub enum RecordedCommand {
    /// A clear request
    Clear(ClearRequest),
    /// A draw call
    Draw(DrawCall),
}

/// Backend that records commands instead of executing them
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<RecordedCommand>,
    light_count: usize,
    frames: u64,
    fail_after_draws: Option<usize>,
    draws_this_frame: usize,
}

impl RecordingBackend {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the recorder fail the draw after `draws` successful draws in a frame
    pub fn fail_after(mut self, draws: usize) -> Self {
        self.fail_after_draws = Some(draws);
        self
    }

    /// Everything recorded since the last reset
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Recorded draw calls in submission order
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            RecordedCommand::Draw(call) => Some(call),
            RecordedCommand::Clear(_) => None,
        })
    }

    /// Recorded clear requests
    pub fn clears(&self) -> impl Iterator<Item = &ClearRequest> {
        self.commands.iter().filter_map(|command| match command {
            RecordedCommand::Clear(request) => Some(request),
            RecordedCommand::Draw(_) => None,
        })
    }

    /// Lights uploaded for the last frame
    pub fn light_count(&self) -> usize {
        self.light_count
    }

    /// Number of completed frames
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Forget recorded commands
    pub fn reset(&mut self) {
        self.commands.clear();
        self.draws_this_frame = 0;
    }
}

impl RenderBackend for RecordingBackend {
    fn clear(&mut self, request: &ClearRequest) -> BackendResult<()> {
        self.draws_this_frame = 0;
        self.commands.push(RecordedCommand::Clear(request.clone()));
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> BackendResult<()> {
        if self.fail_after_draws.is_some_and(|limit| self.draws_this_frame >= limit) {
            return Err(BackendError::new(format!(
                "injected failure drawing object {}",
                call.object_id
            )));
        }
        self.draws_this_frame += 1;
        self.commands.push(RecordedCommand::Draw(call.clone()));
        Ok(())
    }

    fn set_lights(&mut self, state: &RenderState) -> BackendResult<()> {
        self.light_count = state.lights.len();
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.frames += 1;
        self.draws_this_frame = 0;
        Ok(())
    }
}
