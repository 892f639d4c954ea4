//! Math utilities and types
//!
//! Provides fundamental math types for the scene graph. Matrices follow the
//! OpenGL clip-space convention (right-handed view space, camera looking down
//! -Z, NDC depth in [-1, 1]).

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Rotation3,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Compose a TRS matrix (translation * rotation * scale)
    pub fn compose(position: &Vec3, rotation: &Quat, scale: &Vec3) -> Mat4 {
        Mat4::new_translation(position)
            * rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(scale)
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Self::compose(&self.position, &self.rotation, &self.scale)
    }

    /// Decompose an affine matrix into position, rotation and scale.
    ///
    /// A negative determinant is folded into the X scale so the remaining
    /// basis is a proper rotation. Shear is not representable and is lost.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);

        let mut scale_x = Vec3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]).magnitude();
        let scale_y = Vec3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]).magnitude();
        let scale_z = Vec3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]).magnitude();

        let linear: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if linear.determinant() < 0.0 {
            scale_x = -scale_x;
        }

        let safe = |s: f32| if s.abs() > f32::EPSILON { 1.0 / s } else { 0.0 };
        let (inv_x, inv_y, inv_z) = (safe(scale_x), safe(scale_y), safe(scale_z));

        let rotation_matrix = Mat3::new(
            linear[(0, 0)] * inv_x, linear[(0, 1)] * inv_y, linear[(0, 2)] * inv_z,
            linear[(1, 0)] * inv_x, linear[(1, 1)] * inv_y, linear[(1, 2)] * inv_z,
            linear[(2, 0)] * inv_x, linear[(2, 1)] * inv_y, linear[(2, 2)] * inv_z,
        );
        let rotation = Quat::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));

        Self {
            position,
            rotation,
            scale: Vec3::new(scale_x, scale_y, scale_z),
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create an off-axis perspective projection matrix from frustum bounds
    /// on the near plane.
    fn make_perspective(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix.
    fn make_orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Mat4;

    /// Rotation-only basis whose +Z axis points from `target` towards `eye`.
    fn look_at_rotation(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat3;

    /// Translation column of an affine matrix
    fn translation_part(&self) -> Vec3;

    /// Largest basis-vector length, used to scale bounding radii
    fn max_scale_on_axis(&self) -> f32;

    /// Inverse transpose of the upper 3x3 block
    fn normal_matrix(&self) -> Mat3;

    /// Upper 3x3 block with the scale of each column removed
    fn extract_rotation(&self) -> Mat3;
}

impl Mat4Ext for Mat4 {
    fn make_perspective(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Mat4 {
        let x = 2.0 * near / (right - left);
        let y = 2.0 * near / (top - bottom);

        let a = (right + left) / (right - left);
        let b = (top + bottom) / (top - bottom);
        let c = -(far + near) / (far - near);
        let d = -2.0 * far * near / (far - near);

        Mat4::new(
            x,   0.0, a,    0.0,
            0.0, y,   b,    0.0,
            0.0, 0.0, c,    d,
            0.0, 0.0, -1.0, 0.0,
        )
    }

    fn make_orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Mat4 {
        let w = 1.0 / (right - left);
        let h = 1.0 / (top - bottom);
        let p = 1.0 / (far - near);

        let x = (right + left) * w;
        let y = (top + bottom) * h;
        let z = (far + near) * p;

        Mat4::new(
            2.0 * w, 0.0,     0.0,      -x,
            0.0,     2.0 * h, 0.0,      -y,
            0.0,     0.0,     -2.0 * p, -z,
            0.0,     0.0,     0.0,      1.0,
        )
    }

    fn look_at_rotation(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat3 {
        let mut z = eye - target;
        if z.norm_squared() == 0.0 {
            // eye and target coincide
            z.z = 1.0;
        }
        z.normalize_mut();

        let mut x = up.cross(&z);
        if x.norm_squared() == 0.0 {
            // up and z are parallel
            if (up.z.abs() - 1.0).abs() < f32::EPSILON {
                z.x += 0.0001;
            } else {
                z.z += 0.0001;
            }
            z.normalize_mut();
            x = up.cross(&z);
        }
        x.normalize_mut();

        let y = z.cross(&x);

        Mat3::from_columns(&[x, y, z])
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }

    fn max_scale_on_axis(&self) -> f32 {
        let sx = Vec3::new(self[(0, 0)], self[(1, 0)], self[(2, 0)]).norm_squared();
        let sy = Vec3::new(self[(0, 1)], self[(1, 1)], self[(2, 1)]).norm_squared();
        let sz = Vec3::new(self[(0, 2)], self[(1, 2)], self[(2, 2)]).norm_squared();
        sx.max(sy).max(sz).sqrt()
    }

    fn normal_matrix(&self) -> Mat3 {
        let linear: Mat3 = self.fixed_view::<3, 3>(0, 0).into_owned();
        match linear.try_inverse() {
            Some(inverse) => inverse.transpose(),
            None => {
                log::warn!("Normal matrix requested for a singular transform, using identity");
                Mat3::identity()
            }
        }
    }

    fn extract_rotation(&self) -> Mat3 {
        let mut rotation: Mat3 = self.fixed_view::<3, 3>(0, 0).into_owned();
        for mut column in rotation.column_iter_mut() {
            let length = column.norm();
            if length > f32::EPSILON {
                column /= length;
            }
        }
        rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_compose_decompose_round_trip() {
        let original = Transform {
            position: Vec3::new(1.0, -2.0, 3.5),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
            scale: Vec3::new(2.0, 0.5, 1.5),
        };

        let decomposed = Transform::from_matrix(&original.to_matrix());

        assert_relative_eq!(decomposed.position, original.position, epsilon = EPSILON);
        assert_relative_eq!(decomposed.scale, original.scale, epsilon = EPSILON);
        assert_relative_eq!(
            decomposed.rotation.to_rotation_matrix().into_inner(),
            original.rotation.to_rotation_matrix().into_inner(),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_decompose_mirrored_matrix() {
        let mirrored = Mat4::new_nonuniform_scaling(&Vec3::new(-1.0, 1.0, 1.0));
        let decomposed = Transform::from_matrix(&mirrored);

        assert_relative_eq!(decomposed.scale, Vec3::new(-1.0, 1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(decomposed.to_matrix(), mirrored, epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_maps_near_and_far_planes() {
        let projection = Mat4::make_perspective(-1.0, 1.0, 1.0, -1.0, 1.0, 10.0);

        let near = projection.transform_point(&Point3::new(0.0, 0.0, -1.0));
        let far = projection.transform_point(&Point3::new(0.0, 0.0, -10.0));

        assert_relative_eq!(near.z, -1.0, epsilon = EPSILON);
        assert_relative_eq!(far.z, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_orthographic_maps_box_to_ndc() {
        let projection = Mat4::make_orthographic(-2.0, 2.0, 1.0, -1.0, 0.0, 10.0);

        let corner = projection.transform_point(&Point3::new(2.0, 1.0, -10.0));
        assert_relative_eq!(corner.coords, Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_rotation_faces_target() {
        let rotation = Mat4::look_at_rotation(&Vec3::zeros(), &Vec3::new(0.0, 0.0, -5.0), &Vec3::y());

        // Columns form an orthonormal basis; +Z points back towards the eye
        assert_relative_eq!(rotation.column(2).into_owned(), Vec3::z(), epsilon = EPSILON);
        assert_relative_eq!(rotation.determinant(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_max_scale_on_axis() {
        let m = Transform::compose(&Vec3::zeros(), &Quat::identity(), &Vec3::new(1.0, 4.0, 2.0));
        assert_relative_eq!(m.max_scale_on_axis(), 4.0, epsilon = EPSILON);
    }

    #[test]
    fn test_degree_conversion() {
        assert_relative_eq!(utils::deg_to_rad(180.0), constants::PI, epsilon = EPSILON);
        assert_relative_eq!(utils::rad_to_deg(constants::PI * 0.5), 90.0, epsilon = 1e-4);
    }
}
