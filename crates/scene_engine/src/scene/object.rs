//! Spatial node state
//!
//! [`Object3D`] holds everything a scene node owns about itself: the local
//! transform, the derived local and world matrices, and the flags the render
//! pass reads. Parent/child links live in the [`SceneGraph`](super::graph::SceneGraph)
//! arena, so operations that need ancestors (world matrices, `look_at`,
//! `attach`) are graph methods.

use std::collections::HashMap;

use crate::foundation::euler::{Euler, EulerOrder};
use crate::foundation::ids::{IdAllocator, ObjectId};
use crate::foundation::math::{Mat4, Mat4Ext, Quat, Rotation3, Transform, Unit, Vec3};
use crate::scene::layers::Layers;

/// Default `up` direction for new objects
pub fn default_up() -> Vec3 {
    Vec3::y()
}

/// Value stored in an object's user data map
#[derive(Debug, Clone, PartialEq)]
pub enum UserValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
}

/// Transform, matrices and render flags of one scene node
#[derive(Debug, Clone)]
pub struct Object3D {
    id: ObjectId,

    /// Optional name, used by name lookups
    pub name: String,
    /// Local position
    pub position: Vec3,
    /// Local rotation
    pub quaternion: Quat,
    /// Local scale
    pub scale: Vec3,
    /// Up direction used by `look_at`
    pub up: Vec3,

    matrix: Mat4,
    matrix_world: Mat4,
    matrix_pinned: bool,

    /// Recompose the local matrix from position/quaternion/scale during world updates
    pub matrix_auto_update: bool,
    /// Recompute the world matrix during the next world update
    pub matrix_world_needs_update: bool,

    /// Layer membership tested against the camera's layers
    pub layers: Layers,
    /// Invisible objects and their descendants are skipped when rendering
    pub visible: bool,
    /// Object casts shadows
    pub cast_shadow: bool,
    /// Object receives shadows
    pub receive_shadow: bool,
    /// Test against the camera frustum before rendering
    pub frustum_culled: bool,
    /// Explicit ordering key, lower renders first
    pub render_order: i32,
    /// Application data attached to the object
    pub user_data: HashMap<String, UserValue>,
}

impl Object3D {
    /// Create an object at the origin with identity transform
    pub fn new(ids: &IdAllocator) -> Self {
        Self {
            id: ids.next_object(),
            name: String::new(),
            position: Vec3::zeros(),
            quaternion: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            up: default_up(),
            matrix: Mat4::identity(),
            matrix_world: Mat4::identity(),
            matrix_pinned: false,
            matrix_auto_update: true,
            matrix_world_needs_update: true,
            layers: Layers::default(),
            visible: true,
            cast_shadow: false,
            receive_shadow: false,
            frustum_culled: true,
            render_order: 0,
            user_data: HashMap::new(),
        }
    }

    /// Builder-style name setter
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style position setter
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Stable numeric id
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Local matrix as of the last update
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// World matrix as of the last world update
    pub fn matrix_world(&self) -> &Mat4 {
        &self.matrix_world
    }

    /// True while a matrix injected with [`set_matrix`](Self::set_matrix) is in effect
    pub fn is_matrix_pinned(&self) -> bool {
        self.matrix_pinned
    }

    pub(crate) fn set_matrix_world(&mut self, matrix_world: Mat4) {
        self.matrix_world = matrix_world;
    }

    /// Local transform as a value
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.quaternion,
            scale: self.scale,
        }
    }

    /// Recompose the local matrix from position/quaternion/scale
    ///
    /// Works regardless of `matrix_auto_update` and releases a pinned matrix.
    pub fn update_matrix(&mut self) {
        self.matrix = Transform::compose(&self.position, &self.quaternion, &self.scale);
        self.matrix_pinned = false;
        self.matrix_world_needs_update = true;
    }

    /// Inject a local matrix directly
    ///
    /// The matrix stays in effect, even if `matrix_auto_update` is on, until
    /// the next explicit [`update_matrix`](Self::update_matrix).
    /// Position/quaternion/scale are left as they were.
    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
        self.matrix_pinned = true;
        self.matrix_world_needs_update = true;
    }

    /// Recompose the local matrix if automatic updates apply to it
    pub(crate) fn auto_update_matrix(&mut self) {
        if self.matrix_auto_update && !self.matrix_pinned {
            self.update_matrix();
        }
    }

    /// Premultiply the local transform by `matrix` and decompose the result
    /// back into position/quaternion/scale
    pub fn apply_matrix(&mut self, matrix: &Mat4) {
        self.auto_update_matrix();
        self.matrix = matrix * self.matrix;

        let decomposed = Transform::from_matrix(&self.matrix);
        self.position = decomposed.position;
        self.quaternion = decomposed.rotation;
        self.scale = decomposed.scale;
        self.matrix_world_needs_update = true;
    }

    /// Rotate by `q` in parent space
    pub fn apply_quaternion(&mut self, q: &Quat) -> &mut Self {
        self.quaternion = q * self.quaternion;
        self
    }

    /// Rotation as XYZ Euler angles
    pub fn rotation(&self) -> Euler {
        Euler::from_quaternion(&self.quaternion, EulerOrder::Xyz)
    }

    /// Rotation as Euler angles in the given order
    pub fn rotation_with_order(&self, order: EulerOrder) -> Euler {
        Euler::from_quaternion(&self.quaternion, order)
    }

    /// Set the rotation from Euler angles
    pub fn set_rotation_from_euler(&mut self, euler: &Euler) {
        self.quaternion = euler.to_quaternion();
    }

    /// Set the rotation from a normalized axis and an angle in radians
    pub fn set_rotation_from_axis_angle(&mut self, axis: &Unit<Vec3>, angle: f32) {
        self.quaternion = Quat::from_axis_angle(axis, angle);
    }

    /// Set the rotation from the upper 3x3 of `m`, which must be unscaled
    pub fn set_rotation_from_matrix(&mut self, m: &Mat4) {
        let rotation = Rotation3::from_matrix_unchecked(m.fixed_view::<3, 3>(0, 0).into_owned());
        self.quaternion = Quat::from_rotation_matrix(&rotation);
    }

    /// Set the rotation from a unit quaternion
    pub fn set_rotation_from_quaternion(&mut self, q: &Quat) {
        self.quaternion = *q;
    }

    /// Rotate about an axis in object space
    pub fn rotate_on_axis(&mut self, axis: &Unit<Vec3>, angle: f32) -> &mut Self {
        self.quaternion *= Quat::from_axis_angle(axis, angle);
        self
    }

    /// Rotate about an axis in world space, assuming no rotated parent
    pub fn rotate_on_world_axis(&mut self, axis: &Unit<Vec3>, angle: f32) -> &mut Self {
        self.quaternion = Quat::from_axis_angle(axis, angle) * self.quaternion;
        self
    }

    /// Rotate about the local X axis
    pub fn rotate_x(&mut self, angle: f32) -> &mut Self {
        self.rotate_on_axis(&Vec3::x_axis(), angle)
    }

    /// Rotate about the local Y axis
    pub fn rotate_y(&mut self, angle: f32) -> &mut Self {
        self.rotate_on_axis(&Vec3::y_axis(), angle)
    }

    /// Rotate about the local Z axis
    pub fn rotate_z(&mut self, angle: f32) -> &mut Self {
        self.rotate_on_axis(&Vec3::z_axis(), angle)
    }

    /// Move along an axis in object space
    pub fn translate_on_axis(&mut self, axis: &Unit<Vec3>, distance: f32) -> &mut Self {
        self.position += self.quaternion * axis.into_inner() * distance;
        self
    }

    /// Move along the local X axis
    pub fn translate_x(&mut self, distance: f32) -> &mut Self {
        self.translate_on_axis(&Vec3::x_axis(), distance)
    }

    /// Move along the local Y axis
    pub fn translate_y(&mut self, distance: f32) -> &mut Self {
        self.translate_on_axis(&Vec3::y_axis(), distance)
    }

    /// Move along the local Z axis
    pub fn translate_z(&mut self, distance: f32) -> &mut Self {
        self.translate_on_axis(&Vec3::z_axis(), distance)
    }

    /// Point the object's rotation along a precomputed look-at basis
    pub(crate) fn set_rotation_from_basis(&mut self, basis: &crate::foundation::math::Mat3) {
        self.quaternion = Quat::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*basis));
    }

    /// Copy transform, matrices and flags from `source`, keeping this object's id
    pub fn copy_from(&mut self, source: &Object3D) {
        let id = self.id;
        *self = source.clone();
        self.id = id;
    }

    /// Value copy of this object under a fresh id
    pub fn clone_with_id(&self, ids: &IdAllocator) -> Self {
        let mut copy = self.clone();
        copy.id = ids.next_object();
        copy
    }

    /// Normal matrix for this object seen from a camera
    pub fn normal_matrix(&self, view: &Mat4) -> crate::foundation::math::Mat3 {
        (view * self.matrix_world).normal_matrix()
    }
}
