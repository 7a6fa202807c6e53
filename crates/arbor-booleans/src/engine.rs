//! Default boolean backend over the manifold polyhedral engine.

use arbor_mesh::{PolygonMesh, TriangleMesh};
use arbor_math::Point3;
use manifold_rs::{Manifold, Mesh};

use crate::{BoolOp, BooleanEngine};

/// Boolean engine backed by the manifold library.
///
/// Stateless; the conversion to and from the engine's flat `f32` buffers
/// happens per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifoldEngine;

impl BooleanEngine for ManifoldEngine {
    fn execute(
        &self,
        op: BoolOp,
        a: &TriangleMesh,
        b: &TriangleMesh,
    ) -> Result<PolygonMesh, String> {
        let lhs = to_engine(a);
        let rhs = to_engine(b);
        let result = match op {
            BoolOp::Union => lhs.union(&rhs),
            BoolOp::Difference => lhs.difference(&rhs),
            BoolOp::Intersection => lhs.intersection(&rhs),
        };
        Ok(from_engine(&result.to_mesh()))
    }
}

fn to_engine(mesh: &TriangleMesh) -> Manifold {
    let mut vertices = Vec::with_capacity(mesh.num_vertices() * 3);
    for v in &mesh.vertices {
        vertices.push(v.x as f32);
        vertices.push(v.y as f32);
        vertices.push(v.z as f32);
    }
    let indices: Vec<u32> = mesh.faces.iter().flatten().copied().collect();
    Mesh::new(&vertices, &indices).into()
}

fn from_engine(mesh: &Mesh) -> PolygonMesh {
    // Vertices come back as a flat f32 buffer with `num_props` values per
    // vertex; the first three are always the position.
    let flat = mesh.vertices();
    let stride = (mesh.num_props() as usize).max(3);
    let vertices: Vec<Point3> = flat
        .chunks_exact(stride)
        .map(|chunk| Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64))
        .collect();
    let faces: Vec<Vec<u32>> = mesh
        .indices()
        .chunks_exact(3)
        .map(|tri| tri.to_vec())
        .collect();
    PolygonMesh { vertices, faces }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_roundtrip_counts() {
        // Triangulated cube through the engine and back
        let cube: Manifold = Manifold::cube(2.0, 2.0, 2.0);
        let poly = from_engine(&cube.to_mesh());
        let mesh = poly.triangulate().unwrap();
        assert!(mesh.num_triangles() >= 12);
        assert!((mesh.volume() - 8.0).abs() / 8.0 < 1e-4);
    }
}
