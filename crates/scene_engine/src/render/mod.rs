//! # Rendering System
//!
//! Front-end of the renderer: the resources objects are drawn with, the
//! per-frame render lists, and the boundary to a GPU backend.
//!
//! ## Architecture
//!
//! - **Resources**: [`BufferGeometry`], [`Material`] and [`Texture`], shared
//!   between scene nodes through `Arc`
//! - **Render lists**: pooled, sorted draw lists per (scene, camera) pair
//! - **Renderer**: projection pass, sorting and submission
//! - **Backend**: [`RenderBackend`] trait consumed in draw order; the
//!   [`RecordingBackend`] implementation captures commands for headless use
//!
//! Shader generation and GPU resource management belong to backend
//! implementations and are not part of this crate.

pub mod backend;
pub mod geometry;
pub mod material;
pub mod primitives;
pub mod render_list;
pub mod renderer;
pub mod texture;

#[cfg(test)]
mod tests;

pub use backend::{
    BackendError, BackendResult, ClearFlags, ClearRequest, DrawCall, RecordedCommand, RecordingBackend,
    RenderBackend,
};
pub use geometry::{AttributeData, BufferAttribute, BufferGeometry, DrawRange, GeometryError, GeometryGroup};
pub use material::{Blending, Material, MaterialKind, ProgramId, Side};
pub use primitives::{box_geometry, plane_geometry, sphere_geometry};
pub use render_list::{RenderItem, RenderList, RenderLists, SortFn};
pub use renderer::{LightEntry, RenderError, RenderInfo, RenderState, Renderer};
pub use texture::{CubeTexture, Image, RenderTarget, Texture, Wrapping};
