//! Bounding volumes and view frustum
//!
//! Provides the spatial primitives used for culling during render-list
//! construction: axis-aligned boxes, spheres, planes and the six-plane
//! frustum extracted from a combined projection * view matrix.

use crate::foundation::math::{Mat4, Mat4Ext, Point3, Vec3};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Default for AABB {
    fn default() -> Self {
        Self::empty()
    }
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any point expands
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand_by_point(point);
        }
        aabb
    }

    /// True when no point has been added (or min > max on any axis)
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Grow the box to include `point`
    pub fn expand_by_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Box enclosing this one after an affine transform
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let moved: Vec<Vec3> = corners
            .iter()
            .map(|c| matrix.transform_point(&Point3::from(*c)).coords)
            .collect();
        Self::from_points(moved.iter())
    }
}

/// Bounding sphere; a negative radius marks it empty
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center of the sphere
    pub center: Vec3,
    /// Radius of the sphere
    pub radius: f32,
}

impl Default for Sphere {
    fn default() -> Self {
        Self { center: Vec3::zeros(), radius: -1.0 }
    }
}

impl Sphere {
    /// Create a sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the points' bounding box, just large enough to hold all of them
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let center = AABB::from_points(points.iter()).center();
        let radius_sq = points
            .iter()
            .map(|p| (p - center).norm_squared())
            .fold(0.0_f32, f32::max);
        Self { center, radius: radius_sq.sqrt() }
    }

    /// True when the radius is negative
    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }

    /// Sphere after an affine transform; the radius grows by the largest axis scale
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            center: matrix.transform_point(&Point3::from(self.center)).coords,
            radius: self.radius * matrix.max_scale_on_axis(),
        }
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// This uses the Gribb-Hartmann method: every clip plane is the fourth
    /// row of the matrix plus or minus one of the other three. Plane normals
    /// point into the frustum.
    pub fn from_matrix(vp_matrix: &Mat4) -> Self {
        let row = |i: usize| vp_matrix.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Check if a sphere is inside or intersects the frustum
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        let negative_radius = -sphere.radius;
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= negative_radius)
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        // For each plane, check if the AABB is completely outside
        for plane in &self.planes {
            // Corner furthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
            if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
            if plane.normal.z >= 0.0 { p.z = aabb.max.z; }

            // If this point is outside the plane, the entire AABB is outside
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }

        // AABB is inside or intersecting the frustum
        true
    }

    /// Check if a point lies inside the frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane from `ax + by + cz + d = 0` coefficients, normalized
    fn from_coefficients(c: crate::foundation::math::Vec4) -> Self {
        let normal = Vec3::new(c.x, c.y, c.z);
        let length = normal.norm();
        if length > f32::EPSILON {
            Self { normal: normal / length, distance: c.w / length }
        } else {
            log::warn!("Degenerate frustum plane extracted, culling against it is disabled");
            Self { normal: Vec3::zeros(), distance: 0.0 }
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube_frustum() -> Frustum {
        Frustum::from_matrix(&Mat4::make_orthographic(-1.0, 1.0, 1.0, -1.0, 0.0, 2.0))
    }

    #[test]
    fn test_aabb_from_points() {
        let points = [Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 4.0)];
        let aabb = AABB::from_points(points.iter());

        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 4.0));
        assert!(!aabb.is_empty());
        assert!(AABB::empty().is_empty());
    }

    #[test]
    fn test_aabb_transformed_by_rotation() {
        let aabb = AABB::new(Vec3::new(-1.0, -2.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
        let rotation = Mat4::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let moved = aabb.transformed(&rotation);

        assert_relative_eq!(moved.max, Vec3::new(2.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_from_points_and_transform() {
        let points = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        let sphere = Sphere::from_points(&points);
        assert_relative_eq!(sphere.radius, 1.0);

        let moved = sphere.transformed(&Mat4::new_scaling(3.0).append_translation(&Vec3::new(0.0, 5.0, 0.0)));
        assert_relative_eq!(moved.center, Vec3::new(0.0, 5.0, 0.0));
        assert_relative_eq!(moved.radius, 3.0);
        assert!(Sphere::from_points(&[]).is_empty());
    }

    #[test]
    fn test_frustum_contains_points() {
        let frustum = unit_cube_frustum();

        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -1.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 1.0)));
        assert!(!frustum.contains_point(Vec3::new(1.5, 0.0, -1.0)));
    }

    #[test]
    fn test_frustum_sphere_straddling_plane_is_visible() {
        let frustum = unit_cube_frustum();

        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(1.4, 0.0, -1.0), 0.5)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(1.6, 0.0, -1.0), 0.5)));
    }

    #[test]
    fn test_frustum_aabb() {
        let frustum = unit_cube_frustum();

        let inside = AABB::from_center_extents(Vec3::new(0.0, 0.0, -1.0), Vec3::repeat(0.25));
        let outside = AABB::from_center_extents(Vec3::new(0.0, 5.0, -1.0), Vec3::repeat(0.25));
        assert!(frustum.intersects_aabb(&inside));
        assert!(!frustum.intersects_aabb(&outside));
    }
}
