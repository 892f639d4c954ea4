//! Material definitions
//!
//! A [`Material`] pairs a shading model ([`MaterialKind`]) with the render
//! state every model shares: transparency, face culling, blending and depth
//! testing. Materials are shared between objects through `Arc`.
//!
//! # Program ids
//!
//! The render list sorts opaque items by material so state changes are
//! minimised. Each material also reports a [`ProgramId`] that identifies the
//! shader variant a backend would compile for it; materials that differ only
//! in uniform values share a program.

use std::sync::Arc;

use crate::foundation::color::Color;
use crate::foundation::ids::{IdAllocator, MaterialId};
use crate::render::texture::Texture;

/// Identifier of the shader variant a material needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Which faces are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Counter-clockwise faces
    #[default]
    Front,
    /// Clockwise faces
    Back,
    /// Both
    Double,
}

/// How fragments combine with the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blending {
    /// Overwrite
    None,
    /// Alpha blending
    #[default]
    Normal,
    /// Add source to destination
    Additive,
    /// Subtract source from destination
    Subtractive,
    /// Multiply source with destination
    Multiply,
}

/// Shading model and its parameters
#[derive(Debug, Clone)]
pub enum MaterialKind {
    /// Unlit flat color
    Basic {
        /// Base color
        color: Color,
        /// Color map
        map: Option<Arc<Texture>>,
    },
    /// Per-vertex diffuse lighting
    Lambert {
        /// Diffuse color
        color: Color,
        /// Self-illumination
        emissive: Color,
        /// Color map
        map: Option<Arc<Texture>>,
    },
    /// Blinn-Phong lighting
    Phong {
        /// Diffuse color
        color: Color,
        /// Highlight color
        specular: Color,
        /// Highlight exponent
        shininess: f32,
        /// Self-illumination
        emissive: Color,
        /// Color map
        map: Option<Arc<Texture>>,
    },
    /// Metallic-roughness PBR
    Standard {
        /// Albedo
        color: Color,
        /// 0 mirror, 1 fully rough
        roughness: f32,
        /// 0 dielectric, 1 metal
        metalness: f32,
        /// Self-illumination
        emissive: Color,
        /// Albedo map
        map: Option<Arc<Texture>>,
    },
    /// Writes view depth as color
    Depth,
    /// Colored lines
    LineBasic {
        /// Line color
        color: Color,
        /// Line width in pixels, where supported
        linewidth: f32,
    },
    /// Point sprites
    Points {
        /// Point color
        color: Color,
        /// Point size
        size: f32,
        /// Shrink points with distance
        size_attenuation: bool,
    },
    /// Camera-facing quads
    Sprite {
        /// Sprite color
        color: Color,
        /// Rotation in radians
        rotation: f32,
        /// Shrink sprites with distance
        size_attenuation: bool,
    },
}

impl MaterialKind {
    /// Variant name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Lambert { .. } => "lambert",
            Self::Phong { .. } => "phong",
            Self::Standard { .. } => "standard",
            Self::Depth => "depth",
            Self::LineBasic { .. } => "line_basic",
            Self::Points { .. } => "points",
            Self::Sprite { .. } => "sprite",
        }
    }

    fn index(&self) -> u32 {
        match self {
            Self::Basic { .. } => 0,
            Self::Lambert { .. } => 1,
            Self::Phong { .. } => 2,
            Self::Standard { .. } => 3,
            Self::Depth => 4,
            Self::LineBasic { .. } => 5,
            Self::Points { .. } => 6,
            Self::Sprite { .. } => 7,
        }
    }

    /// Color map, for kinds that take one
    pub fn map(&self) -> Option<&Arc<Texture>> {
        match self {
            Self::Basic { map, .. }
            | Self::Lambert { map, .. }
            | Self::Phong { map, .. }
            | Self::Standard { map, .. } => map.as_ref(),
            _ => None,
        }
    }

    /// Whether the shading model reacts to scene lights
    pub fn is_lit(&self) -> bool {
        matches!(self, Self::Lambert { .. } | Self::Phong { .. } | Self::Standard { .. })
    }
}

/// Surface appearance shared by any number of objects
#[derive(Debug, Clone)]
pub struct Material {
    id: MaterialId,
    /// Optional debug name
    pub name: String,
    /// Shading model
    pub kind: MaterialKind,
    /// Render in the transparent pass, back to front
    pub transparent: bool,
    /// Opacity in [0, 1]; only has an effect when `transparent`
    pub opacity: f32,
    /// Invisible materials are skipped when building render lists
    pub visible: bool,
    /// Rendered faces
    pub side: Side,
    /// Blend mode
    pub blending: Blending,
    /// Test fragments against the depth buffer
    pub depth_test: bool,
    /// Write fragments to the depth buffer
    pub depth_write: bool,
    /// Discard fragments with alpha below this value
    pub alpha_test: f32,
    /// Use the geometry's `color` attribute
    pub vertex_colors: bool,
    version: u32,
}

impl Material {
    /// Material with default render state
    pub fn new(ids: &IdAllocator, kind: MaterialKind) -> Self {
        Self {
            id: ids.next_material(),
            name: String::new(),
            kind,
            transparent: false,
            opacity: 1.0,
            visible: true,
            side: Side::default(),
            blending: Blending::default(),
            depth_test: true,
            depth_write: true,
            alpha_test: 0.0,
            vertex_colors: false,
            version: 0,
        }
    }

    /// Unlit material of one color
    pub fn basic(ids: &IdAllocator, color: Color) -> Self {
        Self::new(ids, MaterialKind::Basic { color, map: None })
    }

    /// Lambert material of one color
    pub fn lambert(ids: &IdAllocator, color: Color) -> Self {
        Self::new(ids, MaterialKind::Lambert { color, emissive: Color::BLACK, map: None })
    }

    /// Phong material with a white highlight
    pub fn phong(ids: &IdAllocator, color: Color, shininess: f32) -> Self {
        Self::new(
            ids,
            MaterialKind::Phong {
                color,
                specular: Color::from_hex(0x11_11_11),
                shininess,
                emissive: Color::BLACK,
                map: None,
            },
        )
    }

    /// Metallic-roughness material
    pub fn standard(ids: &IdAllocator, color: Color, roughness: f32, metalness: f32) -> Self {
        Self::new(
            ids,
            MaterialKind::Standard { color, roughness, metalness, emissive: Color::BLACK, map: None },
        )
    }

    /// Depth visualisation material
    pub fn depth(ids: &IdAllocator) -> Self {
        Self::new(ids, MaterialKind::Depth)
    }

    /// Line material
    pub fn line_basic(ids: &IdAllocator, color: Color) -> Self {
        Self::new(ids, MaterialKind::LineBasic { color, linewidth: 1.0 })
    }

    /// Point material
    pub fn points(ids: &IdAllocator, color: Color, size: f32) -> Self {
        Self::new(ids, MaterialKind::Points { color, size, size_attenuation: true })
    }

    /// Sprite material
    pub fn sprite(ids: &IdAllocator, color: Color) -> Self {
        let mut material = Self::new(ids, MaterialKind::Sprite { color, rotation: 0.0, size_attenuation: true });
        material.transparent = true;
        material
    }

    /// Builder-style name setter
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style transparency setter
    pub fn with_transparency(mut self, opacity: f32) -> Self {
        self.transparent = true;
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Builder-style side setter
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Stable numeric id
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Bumped whenever the program must be rebuilt
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Flag the material as modified
    pub fn mark_needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Shader variant for this material
    ///
    /// Packs the shading model with the features that change shader code;
    /// uniform-only parameters do not contribute.
    pub fn program_id(&self) -> ProgramId {
        let mut key = self.kind.index() << 8;
        if self.kind.map().is_some() {
            key |= 1;
        }
        if self.vertex_colors {
            key |= 1 << 1;
        }
        if self.alpha_test > 0.0 {
            key |= 1 << 2;
        }
        if self.side == Side::Double {
            key |= 1 << 3;
        }
        ProgramId(key)
    }

    /// Value copy under a fresh id
    pub fn clone_with_id(&self, ids: &IdAllocator) -> Self {
        let mut copy = self.clone();
        copy.id = ids.next_material();
        copy.version = 0;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ids = IdAllocator::new();
        let material = Material::basic(&ids, Color::WHITE);
        assert!(!material.transparent);
        assert!(material.visible);
        assert!(material.depth_test && material.depth_write);
        assert_eq!(material.side, Side::Front);
        assert_eq!(material.kind.name(), "basic");
        assert!(Material::sprite(&ids, Color::WHITE).transparent);
    }

    #[test]
    fn test_program_id_ignores_uniforms() {
        let ids = IdAllocator::new();
        let red = Material::phong(&ids, Color::new(1.0, 0.0, 0.0), 30.0);
        let blue = Material::phong(&ids, Color::new(0.0, 0.0, 1.0), 5.0);
        assert_ne!(red.id(), blue.id());
        assert_eq!(red.program_id(), blue.program_id());

        let double = blue.clone().with_side(Side::Double);
        assert_ne!(double.program_id(), red.program_id());
        assert_ne!(Material::lambert(&ids, Color::WHITE).program_id(), red.program_id());
    }

    #[test]
    fn test_transparency_builder_clamps() {
        let ids = IdAllocator::new();
        let material = Material::standard(&ids, Color::WHITE, 0.5, 0.0).with_transparency(1.5);
        assert!(material.transparent);
        assert_eq!(material.opacity, 1.0);
        assert!(material.kind.is_lit());
    }

    #[test]
    fn test_clone_with_id() {
        let ids = IdAllocator::new();
        let mut material = Material::depth(&ids).with_name("depth");
        material.mark_needs_update();
        let copy = material.clone_with_id(&ids);
        assert_ne!(copy.id(), material.id());
        assert_eq!(copy.name, "depth");
        assert_eq!(copy.version(), 0);
    }
}
