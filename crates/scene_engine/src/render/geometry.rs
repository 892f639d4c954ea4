//! Vertex data containers
//!
//! A [`BufferGeometry`] is a set of named [`BufferAttribute`]s (`position`,
//! `normal`, `uv`, ...) plus an optional index buffer. Groups split the index
//! range so that each part can be drawn with its own material.
//!
//! Attribute storage is a flat typed array; [`BufferAttribute::as_bytes`]
//! exposes it for upload without copying.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::foundation::bounds::{Sphere, AABB};
use crate::foundation::ids::{GeometryId, IdAllocator};
use crate::foundation::math::{Mat4, Mat4Ext, Point3, Vec3};

/// Name of the attribute holding vertex positions
pub const POSITION: &str = "position";
/// Name of the attribute holding vertex normals
pub const NORMAL: &str = "normal";
/// Name of the attribute holding texture coordinates
pub const UV: &str = "uv";

/// Geometry errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// A required attribute is absent
    #[error("Geometry has no '{0}' attribute")]
    MissingAttribute(&'static str),

    /// Data length is not a multiple of the item size
    #[error("Attribute data of length {len} does not divide into items of size {item_size}")]
    InvalidLength {
        /// Number of scalars supplied
        len: usize,
        /// Scalars per item
        item_size: usize,
    },

    /// Item size outside 1..=4
    #[error("Unsupported attribute item size {0}")]
    InvalidItemSize(usize),
}

/// Typed backing store of an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    /// Floating point data (positions, normals, uvs)
    F32(Vec<f32>),
    /// Integer data (indices)
    U32(Vec<u32>),
}

impl AttributeData {
    /// Number of scalars
    pub fn len(&self) -> usize {
        match self {
            Self::F32(data) => data.len(),
            Self::U32(data) => data.len(),
        }
    }

    /// True when no scalars are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<f32> {
        match self {
            Self::F32(data) => data.get(index).copied(),
            #[allow(clippy::cast_precision_loss)]
            Self::U32(data) => data.get(index).map(|&v| v as f32),
        }
    }

    fn set(&mut self, index: usize, value: f32) {
        match self {
            Self::F32(data) => {
                if let Some(slot) = data.get_mut(index) {
                    *slot = value;
                }
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Self::U32(data) => {
                if let Some(slot) = data.get_mut(index) {
                    *slot = value as u32;
                }
            }
        }
    }
}

/// Flat vertex attribute array read `item_size` scalars at a time
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    data: AttributeData,
    item_size: usize,
    /// Integer data is normalized to [0, 1] when read by shaders
    pub normalized: bool,
    version: u32,
}

impl BufferAttribute {
    /// Create an attribute, checking that the data splits into whole items
    pub fn new(data: AttributeData, item_size: usize) -> Result<Self, GeometryError> {
        if !(1..=4).contains(&item_size) {
            return Err(GeometryError::InvalidItemSize(item_size));
        }
        if data.len() % item_size != 0 {
            return Err(GeometryError::InvalidLength { len: data.len(), item_size });
        }
        Ok(Self { data, item_size, normalized: false, version: 0 })
    }

    /// Float attribute
    pub fn from_f32(data: Vec<f32>, item_size: usize) -> Result<Self, GeometryError> {
        Self::new(AttributeData::F32(data), item_size)
    }

    /// Integer attribute
    pub fn from_u32(data: Vec<u32>, item_size: usize) -> Result<Self, GeometryError> {
        Self::new(AttributeData::U32(data), item_size)
    }

    /// Attribute holding 3-component vectors
    pub fn from_vec3s(values: &[Vec3]) -> Self {
        let data = values.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        Self { data: AttributeData::F32(data), item_size: 3, normalized: false, version: 0 }
    }

    /// Backing data
    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    /// Scalars per item
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of items
    pub fn count(&self) -> usize {
        self.data.len() / self.item_size
    }

    /// Bumped on every write so uploads can be skipped when unchanged
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Flag the data as modified
    pub fn mark_needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            AttributeData::F32(data) => bytemuck::cast_slice(data),
            AttributeData::U32(data) => bytemuck::cast_slice(data),
        }
    }

    fn component(&self, index: usize, offset: usize) -> Option<f32> {
        if offset >= self.item_size {
            return None;
        }
        self.data.get(index * self.item_size + offset)
    }

    /// First component of item `index`
    pub fn get_x(&self, index: usize) -> Option<f32> {
        self.component(index, 0)
    }

    /// Second component of item `index`
    pub fn get_y(&self, index: usize) -> Option<f32> {
        self.component(index, 1)
    }

    /// Third component of item `index`
    pub fn get_z(&self, index: usize) -> Option<f32> {
        self.component(index, 2)
    }

    /// Fourth component of item `index`
    pub fn get_w(&self, index: usize) -> Option<f32> {
        self.component(index, 3)
    }

    /// Item `index` as a vector, for attributes with at least 3 components
    pub fn get_vec3(&self, index: usize) -> Option<Vec3> {
        Some(Vec3::new(self.get_x(index)?, self.get_y(index)?, self.get_z(index)?))
    }

    /// Overwrite the first three components of item `index`
    pub fn set_xyz(&mut self, index: usize, x: f32, y: f32, z: f32) {
        if self.item_size < 3 || index >= self.count() {
            log::warn!("Ignoring set_xyz at {index} on attribute of {} item(s) of size {}", self.count(), self.item_size);
            return;
        }
        let base = index * self.item_size;
        self.data.set(base, x);
        self.data.set(base + 1, y);
        self.data.set(base + 2, z);
        self.mark_needs_update();
    }

    /// All items as vectors
    pub fn to_vec3s(&self) -> Vec<Vec3> {
        (0..self.count()).filter_map(|i| self.get_vec3(i)).collect()
    }
}

/// Range of indices (or vertices) drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    /// First index
    pub start: usize,
    /// Number of indices
    pub count: usize,
    /// Index into the owner's material list
    pub material_index: usize,
}

/// Subrange of the geometry that is drawn at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// First index
    pub start: usize,
    /// Number of indices, `usize::MAX` for everything
    pub count: usize,
}

impl Default for DrawRange {
    fn default() -> Self {
        Self { start: 0, count: usize::MAX }
    }
}

/// Indexed or non-indexed vertex data
#[derive(Debug, Clone)]
pub struct BufferGeometry {
    id: GeometryId,
    /// Optional debug name
    pub name: String,
    attributes: BTreeMap<String, BufferAttribute>,
    index: Option<BufferAttribute>,
    groups: Vec<GeometryGroup>,
    /// Part of the geometry to draw
    pub draw_range: DrawRange,
    bounding_box: Option<AABB>,
    bounding_sphere: Option<Sphere>,
}

impl BufferGeometry {
    /// Empty geometry
    pub fn new(ids: &IdAllocator) -> Self {
        Self {
            id: ids.next_geometry(),
            name: String::new(),
            attributes: BTreeMap::new(),
            index: None,
            groups: Vec::new(),
            draw_range: DrawRange::default(),
            bounding_box: None,
            bounding_sphere: None,
        }
    }

    /// Stable numeric id
    pub fn id(&self) -> GeometryId {
        self.id
    }

    /// Attach or replace an attribute; cached bounds are dropped when positions change
    pub fn set_attribute(&mut self, name: impl Into<String>, attribute: BufferAttribute) {
        let name = name.into();
        if name == POSITION {
            self.bounding_box = None;
            self.bounding_sphere = None;
        }
        self.attributes.insert(name, attribute);
    }

    /// Attribute by name
    pub fn attribute(&self, name: &str) -> Option<&BufferAttribute> {
        self.attributes.get(name)
    }

    /// Mutable attribute by name
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut BufferAttribute> {
        self.attributes.get_mut(name)
    }

    /// Remove an attribute; removing positions drops the cached bounds
    pub fn delete_attribute(&mut self, name: &str) -> Option<BufferAttribute> {
        if name == POSITION {
            self.bounding_box = None;
            self.bounding_sphere = None;
        }
        self.attributes.remove(name)
    }

    /// True when an attribute with this name exists
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attribute names in sorted order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Index buffer
    pub fn index(&self) -> Option<&BufferAttribute> {
        self.index.as_ref()
    }

    /// Set the index buffer from triangle indices
    pub fn set_index(&mut self, indices: Vec<u32>) {
        self.index = Some(BufferAttribute {
            data: AttributeData::U32(indices),
            item_size: 1,
            normalized: false,
            version: 0,
        });
    }

    /// Material groups
    pub fn groups(&self) -> &[GeometryGroup] {
        &self.groups
    }

    /// Add a material group
    pub fn add_group(&mut self, start: usize, count: usize, material_index: usize) {
        self.groups.push(GeometryGroup { start, count, material_index });
    }

    /// Remove all material groups
    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    /// Limit drawing to a subrange
    pub fn set_draw_range(&mut self, start: usize, count: usize) {
        self.draw_range = DrawRange { start, count };
    }

    /// Number of elements drawn: indices when indexed, vertices otherwise
    pub fn element_count(&self) -> usize {
        self.index
            .as_ref()
            .map(BufferAttribute::count)
            .or_else(|| self.attribute(POSITION).map(BufferAttribute::count))
            .unwrap_or(0)
    }

    /// Cached bounding box
    pub fn bounding_box(&self) -> Option<&AABB> {
        self.bounding_box.as_ref()
    }

    /// Cached bounding sphere
    pub fn bounding_sphere(&self) -> Option<&Sphere> {
        self.bounding_sphere.as_ref()
    }

    fn positions(&self) -> Result<Vec<Vec3>, GeometryError> {
        self.attribute(POSITION)
            .map(BufferAttribute::to_vec3s)
            .ok_or(GeometryError::MissingAttribute(POSITION))
    }

    /// Box enclosing every position
    pub fn compute_bounding_box(&mut self) -> Result<AABB, GeometryError> {
        let positions = self.positions()?;
        let aabb = AABB::from_points(positions.iter());
        if aabb.min.iter().chain(aabb.max.iter()).any(|v| v.is_nan()) {
            log::warn!("Computed bounding box of geometry {} contains NaN values", self.id);
        }
        self.bounding_box = Some(aabb);
        Ok(aabb)
    }

    /// Sphere enclosing every position, centered on the bounding box
    pub fn compute_bounding_sphere(&mut self) -> Result<Sphere, GeometryError> {
        let positions = self.positions()?;
        let sphere = Sphere::from_points(&positions);
        if sphere.radius.is_nan() {
            log::warn!("Computed bounding sphere of geometry {} has a NaN radius", self.id);
        }
        self.bounding_sphere = Some(sphere);
        Ok(sphere)
    }

    /// Bounding sphere from the cache, or computed without caching
    ///
    /// The fallback walks every position on each call. Geometry that is
    /// culled every frame should have its sphere computed up front with
    /// [`Self::compute_bounding_sphere`]; the primitive builders do so.
    pub fn bounding_sphere_or_compute(&self) -> Result<Sphere, GeometryError> {
        match self.bounding_sphere {
            Some(sphere) => Ok(sphere),
            None => Ok(Sphere::from_points(&self.positions()?)),
        }
    }

    /// Transform positions by `matrix` and normals by its normal matrix
    pub fn apply_matrix(&mut self, matrix: &Mat4) {
        if let Some(positions) = self.attributes.get_mut(POSITION) {
            for i in 0..positions.count() {
                if let Some(p) = positions.get_vec3(i) {
                    let p = matrix.transform_point(&Point3::from(p));
                    positions.set_xyz(i, p.x, p.y, p.z);
                }
            }
        }

        let normal_matrix = matrix.normal_matrix();
        if let Some(normals) = self.attributes.get_mut(NORMAL) {
            for i in 0..normals.count() {
                if let Some(n) = normals.get_vec3(i) {
                    let n = (normal_matrix * n).try_normalize(f32::EPSILON).unwrap_or(n);
                    normals.set_xyz(i, n.x, n.y, n.z);
                }
            }
        }

        if self.bounding_box.is_some() {
            if let Err(err) = self.compute_bounding_box() {
                log::warn!("Dropping bounding box of geometry {}: {err}", self.id);
                self.bounding_box = None;
            }
        }
        if self.bounding_sphere.is_some() {
            if let Err(err) = self.compute_bounding_sphere() {
                log::warn!("Dropping bounding sphere of geometry {}: {err}", self.id);
                self.bounding_sphere = None;
            }
        }
    }
}
