//! Texture descriptors
//!
//! Textures here are CPU-side descriptions only: decoded pixel data plus the
//! sampling and UV-transform parameters a backend needs when uploading.

use crate::foundation::ids::{IdAllocator, TextureId};
use crate::foundation::math::{Mat3, Vec2};

/// Decoded pixel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 pixels
    pub data: Vec<u8>,
}

impl Image {
    /// Image of a single color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        Self { width, height, data: rgba.repeat(pixels) }
    }
}

/// Behavior of UVs outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrapping {
    /// Tile the image
    Repeat,
    /// Clamp to the edge texel
    #[default]
    ClampToEdge,
    /// Tile, mirroring every other repetition
    MirroredRepeat,
}

/// 2D texture with its UV transform
#[derive(Debug, Clone)]
pub struct Texture {
    id: TextureId,
    /// Optional debug name
    pub name: String,
    /// Pixel data; `None` until loaded
    pub image: Option<Image>,
    /// Horizontal wrapping
    pub wrap_s: Wrapping,
    /// Vertical wrapping
    pub wrap_t: Wrapping,
    /// UV translation
    pub offset: Vec2,
    /// UV repetition
    pub repeat: Vec2,
    /// Pivot of `rotation`
    pub center: Vec2,
    /// UV rotation in radians
    pub rotation: f32,
    /// Flip the image vertically on upload
    pub flip_y: bool,
    version: u32,
}

impl Texture {
    /// Texture with default sampling parameters
    pub fn new(ids: &IdAllocator, image: Option<Image>) -> Self {
        Self {
            id: ids.next_texture(),
            name: String::new(),
            image,
            wrap_s: Wrapping::default(),
            wrap_t: Wrapping::default(),
            offset: Vec2::zeros(),
            repeat: Vec2::new(1.0, 1.0),
            center: Vec2::zeros(),
            rotation: 0.0,
            flip_y: true,
            version: 0,
        }
    }

    /// Stable numeric id
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Bumped whenever the image must be re-uploaded
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Flag the image as modified
    pub fn mark_needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Replace the pixel data
    pub fn set_image(&mut self, image: Image) {
        self.image = Some(image);
        self.mark_needs_update();
    }

    /// Homogeneous 2D matrix applying repeat, rotation about `center`, then offset
    pub fn uv_transform(&self) -> Mat3 {
        let (s, c) = self.rotation.sin_cos();
        let (sx, sy) = (self.repeat.x, self.repeat.y);
        let (cx, cy) = (self.center.x, self.center.y);
        let (tx, ty) = (self.offset.x, self.offset.y);

        Mat3::new(
            sx * c, sx * s, -sx * (c * cx + s * cy) + cx + tx,
            -sy * s, sy * c, -sy * (-s * cx + c * cy) + cy + ty,
            0.0, 0.0, 1.0,
        )
    }
}

/// Six-face environment texture ordered +X, -X, +Y, -Y, +Z, -Z
#[derive(Debug, Clone)]
pub struct CubeTexture {
    id: TextureId,
    /// Face images
    pub faces: [Option<Image>; 6],
}

impl CubeTexture {
    /// Cube texture from its face images
    pub fn new(ids: &IdAllocator, faces: [Option<Image>; 6]) -> Self {
        Self { id: ids.next_texture(), faces }
    }

    /// Stable numeric id
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// True when every face has pixel data
    pub fn is_complete(&self) -> bool {
        self.faces.iter().all(Option::is_some)
    }
}

/// Off-screen color/depth target
#[derive(Debug, Clone)]
pub struct RenderTarget {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color attachment
    pub texture: Texture,
    /// Target has a depth attachment
    pub depth_buffer: bool,
    /// Target has a stencil attachment
    pub stencil_buffer: bool,
}

impl RenderTarget {
    /// Render target with depth and no stencil
    pub fn new(ids: &IdAllocator, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texture: Texture::new(ids, None),
            depth_buffer: true,
            stencil_buffer: false,
        }
    }

    /// Resize, invalidating the color attachment
    pub fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.texture.mark_needs_update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_uv_transform_identity_by_default() {
        let texture = Texture::new(&IdAllocator::new(), None);
        assert_eq!(texture.uv_transform(), Mat3::identity());
    }

    #[test]
    fn test_uv_transform_repeat_and_offset() {
        let mut texture = Texture::new(&IdAllocator::new(), None);
        texture.repeat = Vec2::new(2.0, 3.0);
        texture.offset = Vec2::new(0.25, 0.5);

        let uv = texture.uv_transform() * Vec3::new(1.0, 1.0, 1.0);
        assert_relative_eq!(uv, Vec3::new(2.25, 3.5, 1.0));
    }

    #[test]
    fn test_uv_rotation_about_center_keeps_center() {
        let mut texture = Texture::new(&IdAllocator::new(), None);
        texture.center = Vec2::new(0.5, 0.5);
        texture.rotation = 1.0;

        let uv = texture.uv_transform() * Vec3::new(0.5, 0.5, 1.0);
        assert_relative_eq!(uv, Vec3::new(0.5, 0.5, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_image_and_targets() {
        let ids = IdAllocator::new();
        let image = Image::solid(2, 2, [255, 0, 0, 255]);
        assert_eq!(image.data.len(), 16);

        let mut texture = Texture::new(&ids, None);
        texture.set_image(image.clone());
        assert_eq!(texture.version(), 1);

        let cube = CubeTexture::new(&ids, [Some(image.clone()), None, None, None, None, None]);
        assert!(!cube.is_complete());

        let mut target = RenderTarget::new(&ids, 64, 64);
        target.set_size(128, 64);
        assert_eq!(target.texture.version(), 1);
        assert_ne!(target.texture.id(), texture.id());
    }
}
