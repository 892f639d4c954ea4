//! Built-in geometry generators
//!
//! Each builder returns an indexed [`BufferGeometry`] with `position`,
//! `normal` and `uv` attributes and a precomputed bounding sphere.

use crate::foundation::ids::IdAllocator;
use crate::foundation::math::Vec3;
use crate::render::geometry::{BufferAttribute, BufferGeometry, GeometryError, NORMAL, POSITION, UV};

#[derive(Default)]
struct MeshBuilder {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<f32>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    #[allow(clippy::cast_possible_truncation)]
    fn vertex(&mut self, position: Vec3, normal: Vec3, u: f32, v: f32) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.extend([u, v]);
        (self.positions.len() - 1) as u32
    }

    fn build(self, ids: &IdAllocator, name: &str) -> Result<BufferGeometry, GeometryError> {
        let mut geometry = BufferGeometry::new(ids);
        geometry.name = name.to_string();
        geometry.set_attribute(POSITION, BufferAttribute::from_vec3s(&self.positions));
        geometry.set_attribute(NORMAL, BufferAttribute::from_vec3s(&self.normals));
        geometry.set_attribute(UV, BufferAttribute::from_f32(self.uvs, 2)?);
        geometry.set_index(self.indices);
        geometry.compute_bounding_sphere()?;
        Ok(geometry)
    }
}

// Grid of (segments_u + 1) x (segments_v + 1) vertices on a face spanned by
// `u_axis` and `v_axis` around `center`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn face(
    builder: &mut MeshBuilder,
    center: Vec3,
    u_axis: Vec3,
    v_axis: Vec3,
    normal: Vec3,
    segments_u: u32,
    segments_v: u32,
) {
    let first = builder.positions.len() as u32;
    for iy in 0..=segments_v {
        let v = iy as f32 / segments_v as f32;
        for ix in 0..=segments_u {
            let u = ix as f32 / segments_u as f32;
            let position = center + u_axis * (u - 0.5) + v_axis * (0.5 - v);
            builder.vertex(position, normal, u, 1.0 - v);
        }
    }

    let row = segments_u + 1;
    for iy in 0..segments_v {
        for ix in 0..segments_u {
            let a = first + ix + row * iy;
            let b = first + ix + row * (iy + 1);
            let c = first + ix + 1 + row * (iy + 1);
            let d = first + ix + 1 + row * iy;
            builder.indices.extend([a, b, d, b, c, d]);
        }
    }
}

/// Axis-aligned box centered on the origin, one geometry group per face
///
/// Groups are ordered +X, -X, +Y, -Y, +Z, -Z and use material indices 0..6.
pub fn box_geometry(ids: &IdAllocator, width: f32, height: f32, depth: f32) -> Result<BufferGeometry, GeometryError> {
    let (hw, hh, hd) = (width / 2.0, height / 2.0, depth / 2.0);
    let faces = [
        (Vec3::new(hw, 0.0, 0.0), Vec3::new(0.0, 0.0, -depth), Vec3::new(0.0, height, 0.0), Vec3::x()),
        (Vec3::new(-hw, 0.0, 0.0), Vec3::new(0.0, 0.0, depth), Vec3::new(0.0, height, 0.0), -Vec3::x()),
        (Vec3::new(0.0, hh, 0.0), Vec3::new(width, 0.0, 0.0), Vec3::new(0.0, 0.0, -depth), Vec3::y()),
        (Vec3::new(0.0, -hh, 0.0), Vec3::new(width, 0.0, 0.0), Vec3::new(0.0, 0.0, depth), -Vec3::y()),
        (Vec3::new(0.0, 0.0, hd), Vec3::new(width, 0.0, 0.0), Vec3::new(0.0, height, 0.0), Vec3::z()),
        (Vec3::new(0.0, 0.0, -hd), Vec3::new(-width, 0.0, 0.0), Vec3::new(0.0, height, 0.0), -Vec3::z()),
    ];

    let mut builder = MeshBuilder::default();
    let mut groups = Vec::with_capacity(faces.len());
    for (material_index, (center, u_axis, v_axis, normal)) in faces.into_iter().enumerate() {
        let start = builder.indices.len();
        face(&mut builder, center, u_axis, v_axis, normal, 1, 1);
        groups.push((start, builder.indices.len() - start, material_index));
    }

    let mut geometry = builder.build(ids, "box")?;
    for (start, count, material_index) in groups {
        geometry.add_group(start, count, material_index);
    }
    Ok(geometry)
}

/// Plane in the XY plane facing +Z
pub fn plane_geometry(
    ids: &IdAllocator,
    width: f32,
    height: f32,
    width_segments: u32,
    height_segments: u32,
) -> Result<BufferGeometry, GeometryError> {
    let mut builder = MeshBuilder::default();
    face(
        &mut builder,
        Vec3::zeros(),
        Vec3::new(width, 0.0, 0.0),
        Vec3::new(0.0, height, 0.0),
        Vec3::z(),
        width_segments.max(1),
        height_segments.max(1),
    );
    builder.build(ids, "plane")
}

/// UV sphere centered on the origin
#[allow(clippy::cast_precision_loss)]
pub fn sphere_geometry(
    ids: &IdAllocator,
    radius: f32,
    width_segments: u32,
    height_segments: u32,
) -> Result<BufferGeometry, GeometryError> {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut builder = MeshBuilder::default();

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let theta = v * std::f32::consts::PI;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * std::f32::consts::TAU;
            let normal = Vec3::new(-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
            builder.vertex(normal * radius, normal, u, 1.0 - v);
        }
    }

    let row = width_segments + 1;
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = row * iy + ix + 1;
            let b = row * iy + ix;
            let c = row * (iy + 1) + ix;
            let d = row * (iy + 1) + ix + 1;
            // Poles collapse one triangle of each quad
            if iy != 0 {
                builder.indices.extend([a, b, d]);
            }
            if iy != height_segments - 1 {
                builder.indices.extend([b, c, d]);
            }
        }
    }

    builder.build(ids, "sphere")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_has_one_group_per_face() {
        let geometry = box_geometry(&IdAllocator::new(), 2.0, 4.0, 6.0).unwrap();
        assert_eq!(geometry.groups().len(), 6);
        assert_eq!(geometry.attribute(POSITION).unwrap().count(), 24);
        assert_eq!(geometry.element_count(), 36);
        assert_eq!(geometry.groups()[5].material_index, 5);
        assert_eq!(geometry.groups()[5].start, 30);

        let sphere = geometry.bounding_sphere().unwrap();
        assert_relative_eq!(sphere.radius, (1.0_f32 + 4.0 + 9.0).sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_box_faces_point_outwards() {
        let mut geometry = box_geometry(&IdAllocator::new(), 1.0, 1.0, 1.0).unwrap();
        let aabb = geometry.compute_bounding_box().unwrap();
        assert_relative_eq!(aabb.max, Vec3::new(0.5, 0.5, 0.5));

        let positions = geometry.attribute(POSITION).unwrap();
        let normals = geometry.attribute(NORMAL).unwrap();
        for i in 0..positions.count() {
            let p = positions.get_vec3(i).unwrap();
            let n = normals.get_vec3(i).unwrap();
            assert_relative_eq!(p.dot(&n), 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_plane_segments() {
        let geometry = plane_geometry(&IdAllocator::new(), 2.0, 2.0, 2, 3).unwrap();
        assert_eq!(geometry.attribute(POSITION).unwrap().count(), 3 * 4);
        assert_eq!(geometry.element_count(), 2 * 3 * 6);
        assert!(geometry.groups().is_empty());
    }

    #[test]
    fn test_sphere_vertices_lie_on_surface() {
        let geometry = sphere_geometry(&IdAllocator::new(), 3.0, 8, 6).unwrap();
        let positions = geometry.attribute(POSITION).unwrap();
        for i in 0..positions.count() {
            assert_relative_eq!(positions.get_vec3(i).unwrap().norm(), 3.0, epsilon = 1e-5);
        }
        assert_relative_eq!(geometry.bounding_sphere().unwrap().radius, 3.0, epsilon = 1e-4);
    }
}
