#![warn(missing_docs)]

//! Watertight primitive tessellation for the arbor CAD core.
//!
//! Constructs closed, outward-oriented triangle meshes for the standard
//! solid primitives: box and cylinder. All primitives are centered at the
//! origin; the cylinder's axis runs along +Z.

use std::f64::consts::PI;

use arbor_math::Point3;
use arbor_mesh::TriangleMesh;
use thiserror::Error;

/// Default circular resolution for curved primitives.
pub const DEFAULT_SEGMENTS: u32 = 32;

/// Errors raised by primitive construction.
#[derive(Error, Debug)]
pub enum PrimitiveError {
    /// A dimension was zero, negative, or not finite.
    #[error("invalid dimension: {name} = {value} (must be finite and > 0)")]
    InvalidDimension {
        /// Name of the offending parameter.
        name: &'static str,
        /// Its value.
        value: f64,
    },

    /// The requested primitive kind is not implemented.
    #[error("unsupported primitive: {0}")]
    UnsupportedPrimitive(&'static str),
}

fn check_dimension(name: &'static str, value: f64) -> Result<(), PrimitiveError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PrimitiveError::InvalidDimension { name, value });
    }
    Ok(())
}

/// Tessellate an axis-aligned box centered at the origin.
///
/// 8 vertices at `(±w/2, ±h/2, ±d/2)`, 12 outward-facing triangles
/// (two per face). Vertex layout:
/// ```text
///     v7----v6
///    /|    /|
///   v4----v5|    z
///   | v3--|-v2   | y
///   |/    |/     |/
///   v0----v1     +---x
/// ```
pub fn tessellate_box(width: f64, height: f64, depth: f64) -> Result<TriangleMesh, PrimitiveError> {
    check_dimension("width", width)?;
    check_dimension("height", height)?;
    check_dimension("depth", depth)?;

    let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
    let vertices = vec![
        Point3::new(-x, -y, -z),
        Point3::new(x, -y, -z),
        Point3::new(x, y, -z),
        Point3::new(-x, y, -z),
        Point3::new(-x, -y, z),
        Point3::new(x, -y, z),
        Point3::new(x, y, z),
        Point3::new(-x, y, z),
    ];

    // Two triangles per face, CCW when viewed from outside.
    let faces = vec![
        // bottom (-Z)
        [0, 2, 1],
        [0, 3, 2],
        // top (+Z)
        [4, 5, 6],
        [4, 6, 7],
        // front (-Y)
        [0, 1, 5],
        [0, 5, 4],
        // back (+Y)
        [2, 3, 7],
        [2, 7, 6],
        // left (-X)
        [0, 4, 7],
        [0, 7, 3],
        // right (+X)
        [1, 2, 6],
        [1, 6, 5],
    ];

    Ok(TriangleMesh { vertices, faces })
}

/// Tessellate a cylinder centered at the origin with its axis along +Z.
///
/// With circular resolution `n` the mesh has `2n + 2` vertices (two rims
/// plus one cap center per end) and `4n` triangles: `2n` on the side
/// (each quad split along its lower-left diagonal) and `n` per cap,
/// fanned from the cap center. All normals face outward.
pub fn tessellate_cylinder(
    radius: f64,
    height: f64,
    segments: u32,
) -> Result<TriangleMesh, PrimitiveError> {
    check_dimension("radius", radius)?;
    check_dimension("height", height)?;
    let n = segments.max(3);

    let half = height / 2.0;
    let mut vertices = Vec::with_capacity(2 * n as usize + 2);
    // Bottom rim: indices 0..n, top rim: n..2n
    for ring_z in [-half, half] {
        for i in 0..n {
            let theta = 2.0 * PI * i as f64 / n as f64;
            vertices.push(Point3::new(
                radius * theta.cos(),
                radius * theta.sin(),
                ring_z,
            ));
        }
    }
    let bottom_center = 2 * n;
    let top_center = 2 * n + 1;
    vertices.push(Point3::new(0.0, 0.0, -half));
    vertices.push(Point3::new(0.0, 0.0, half));

    let mut faces = Vec::with_capacity(4 * n as usize);
    for i in 0..n {
        let j = (i + 1) % n;
        let (b0, b1) = (i, j);
        let (t0, t1) = (n + i, n + j);
        // Side quad split along the diagonal from its lower-left corner
        faces.push([b0, b1, t1]);
        faces.push([b0, t1, t0]);
    }
    for i in 0..n {
        let j = (i + 1) % n;
        // Bottom cap faces -Z, so the rim is traversed clockwise from above
        faces.push([bottom_center, j, i]);
        // Top cap faces +Z
        faces.push([top_center, n + i, n + j]);
    }

    Ok(TriangleMesh { vertices, faces })
}

/// Sphere tessellation is advertised by the original design but was never
/// implemented; arbor rejects it explicitly rather than approximating.
pub fn tessellate_sphere(_radius: f64, _segments: u32) -> Result<TriangleMesh, PrimitiveError> {
    Err(PrimitiveError::UnsupportedPrimitive("sphere"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_math::Vec3;

    #[test]
    fn test_box_counts() {
        let mesh = tessellate_box(10.0, 20.0, 30.0).unwrap();
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_triangles(), 12);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_box_is_watertight() {
        let mesh = tessellate_box(1.0, 1.0, 1.0).unwrap();
        // A closed mesh has no manifold defect to warn about
        assert!(mesh.validate().is_ok());
        assert!((mesh.volume() - 1.0).abs() < 1e-12);
        assert!((mesh.surface_area() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_box_normals_point_away_from_origin() {
        let mesh = tessellate_box(2.0, 4.0, 6.0).unwrap();
        for i in 0..mesh.num_triangles() {
            let [a, b, c] = mesh.triangle(i);
            let centroid = Vec3::new(
                (a.x + b.x + c.x) / 3.0,
                (a.y + b.y + c.y) / 3.0,
                (a.z + b.z + c.z) / 3.0,
            );
            assert!(
                mesh.face_normal(i).dot(&centroid) > 0.0,
                "inward-facing triangle {i}"
            );
        }
    }

    #[test]
    fn test_box_invalid_dimensions() {
        assert!(matches!(
            tessellate_box(0.0, 1.0, 1.0),
            Err(PrimitiveError::InvalidDimension { name: "width", .. })
        ));
        assert!(matches!(
            tessellate_box(1.0, -2.0, 1.0),
            Err(PrimitiveError::InvalidDimension { name: "height", .. })
        ));
        assert!(matches!(
            tessellate_box(1.0, 1.0, f64::NAN),
            Err(PrimitiveError::InvalidDimension { name: "depth", .. })
        ));
    }

    #[test]
    fn test_cylinder_counts() {
        let n = 32;
        let mesh = tessellate_cylinder(5.0, 10.0, n).unwrap();
        assert_eq!(mesh.num_vertices(), (2 * n + 2) as usize);
        assert_eq!(mesh.num_triangles(), (4 * n) as usize);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_cylinder_volume_approaches_analytic() {
        let mesh = tessellate_cylinder(3.0, 7.0, 256).unwrap();
        let analytic = PI * 3.0 * 3.0 * 7.0;
        let rel = (mesh.volume() - analytic).abs() / analytic;
        // Inscribed polygon underestimates; 256 segments is well under 0.1%
        assert!(rel < 1e-3, "relative error {rel}");
    }

    #[test]
    fn test_cylinder_normals_outward() {
        let mesh = tessellate_cylinder(2.0, 5.0, 16).unwrap();
        for i in 0..mesh.num_triangles() {
            let [a, b, c] = mesh.triangle(i);
            let centroid = Vec3::new(
                (a.x + b.x + c.x) / 3.0,
                (a.y + b.y + c.y) / 3.0,
                (a.z + b.z + c.z) / 3.0,
            );
            assert!(
                mesh.face_normal(i).dot(&centroid) > 0.0,
                "inward-facing triangle {i}"
            );
        }
    }

    #[test]
    fn test_cylinder_invalid_dimensions() {
        assert!(matches!(
            tessellate_cylinder(0.0, 1.0, 32),
            Err(PrimitiveError::InvalidDimension { name: "radius", .. })
        ));
        assert!(matches!(
            tessellate_cylinder(1.0, f64::INFINITY, 32),
            Err(PrimitiveError::InvalidDimension { name: "height", .. })
        ));
    }

    #[test]
    fn test_sphere_rejected() {
        assert!(matches!(
            tessellate_sphere(1.0, 32),
            Err(PrimitiveError::UnsupportedPrimitive("sphere"))
        ));
    }
}
