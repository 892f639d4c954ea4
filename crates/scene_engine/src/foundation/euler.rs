//! Euler angle view of node rotations
//!
//! Nodes store their rotation as a quaternion; Euler angles are derived on
//! demand and converted back when set, so the two never drift apart.

use crate::foundation::math::{Mat3, Quat, Vec3};

/// Axis application order. `Xyz` means the rotation matrix is `Rx * Ry * Rz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EulerOrder {
    /// X, then Y, then Z
    #[default]
    Xyz,
    /// Y, then X, then Z
    Yxz,
    /// Z, then X, then Y
    Zxy,
    /// Z, then Y, then X
    Zyx,
    /// Y, then Z, then X
    Yzx,
    /// X, then Z, then Y
    Xzy,
}

/// Rotation angles in radians about the X, Y and Z axes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Euler {
    /// Angle about the X axis
    pub x: f32,
    /// Angle about the Y axis
    pub y: f32,
    /// Angle about the Z axis
    pub z: f32,
    /// Composition order
    pub order: EulerOrder,
}

// Rotations whose pitch sine exceeds this are treated as gimbal locked
const GIMBAL_THRESHOLD: f32 = 0.999_999_9;

impl Euler {
    /// Create Euler angles with the default XYZ order
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, order: EulerOrder::Xyz }
    }

    /// Create Euler angles with an explicit order
    pub fn with_order(x: f32, y: f32, z: f32, order: EulerOrder) -> Self {
        Self { x, y, z, order }
    }

    /// Angles as a vector (x, y, z)
    pub fn to_vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Convert to a unit quaternion
    pub fn to_quaternion(&self) -> Quat {
        let qx = Quat::from_axis_angle(&Vec3::x_axis(), self.x);
        let qy = Quat::from_axis_angle(&Vec3::y_axis(), self.y);
        let qz = Quat::from_axis_angle(&Vec3::z_axis(), self.z);

        match self.order {
            EulerOrder::Xyz => qx * qy * qz,
            EulerOrder::Yxz => qy * qx * qz,
            EulerOrder::Zxy => qz * qx * qy,
            EulerOrder::Zyx => qz * qy * qx,
            EulerOrder::Yzx => qy * qz * qx,
            EulerOrder::Xzy => qx * qz * qy,
        }
    }

    /// Extract angles from a pure rotation matrix
    pub fn from_rotation_matrix(m: &Mat3, order: EulerOrder) -> Self {
        let m11 = m[(0, 0)];
        let m12 = m[(0, 1)];
        let m13 = m[(0, 2)];
        let m21 = m[(1, 0)];
        let m22 = m[(1, 1)];
        let m23 = m[(1, 2)];
        let m31 = m[(2, 0)];
        let m32 = m[(2, 1)];
        let m33 = m[(2, 2)];

        let (x, y, z) = match order {
            EulerOrder::Xyz => {
                let y = m13.clamp(-1.0, 1.0).asin();
                if m13.abs() < GIMBAL_THRESHOLD {
                    ((-m23).atan2(m33), y, (-m12).atan2(m11))
                } else {
                    (m32.atan2(m22), y, 0.0)
                }
            }
            EulerOrder::Yxz => {
                let x = (-m23.clamp(-1.0, 1.0)).asin();
                if m23.abs() < GIMBAL_THRESHOLD {
                    (x, m13.atan2(m33), m21.atan2(m22))
                } else {
                    (x, (-m31).atan2(m11), 0.0)
                }
            }
            EulerOrder::Zxy => {
                let x = m32.clamp(-1.0, 1.0).asin();
                if m32.abs() < GIMBAL_THRESHOLD {
                    (x, (-m31).atan2(m33), (-m12).atan2(m22))
                } else {
                    (x, 0.0, m21.atan2(m11))
                }
            }
            EulerOrder::Zyx => {
                let y = (-m31.clamp(-1.0, 1.0)).asin();
                if m31.abs() < GIMBAL_THRESHOLD {
                    (m32.atan2(m33), y, m21.atan2(m11))
                } else {
                    (0.0, y, (-m12).atan2(m22))
                }
            }
            EulerOrder::Yzx => {
                let z = m21.clamp(-1.0, 1.0).asin();
                if m21.abs() < GIMBAL_THRESHOLD {
                    ((-m23).atan2(m22), (-m31).atan2(m11), z)
                } else {
                    (0.0, m13.atan2(m33), z)
                }
            }
            EulerOrder::Xzy => {
                let z = (-m12.clamp(-1.0, 1.0)).asin();
                if m12.abs() < GIMBAL_THRESHOLD {
                    (m32.atan2(m22), m13.atan2(m11), z)
                } else {
                    ((-m23).atan2(m33), 0.0, z)
                }
            }
        };

        Self { x, y, z, order }
    }

    /// Extract angles from a unit quaternion
    pub fn from_quaternion(q: &Quat, order: EulerOrder) -> Self {
        Self::from_rotation_matrix(q.to_rotation_matrix().matrix(), order)
    }
}
