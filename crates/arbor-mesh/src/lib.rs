#![warn(missing_docs)]

//! Indexed triangle mesh kernel for the arbor CAD core.
//!
//! Triangle meshes are the sole geometric representation inside arbor:
//! primitives tessellate into them, booleans consume and produce them,
//! and every exporter streams from them. This crate provides the mesh
//! type itself, structural validation for meshes arriving from external
//! engines, affine transformation, and the standard mesh measures
//! (volume, surface area, bounding box).

use std::collections::HashMap;

use arbor_math::{Point3, Transform, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by mesh construction and validation.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no vertices.
    #[error("invalid mesh: no vertices")]
    NoVertices,

    /// The mesh has no faces.
    #[error("invalid mesh: no faces")]
    NoFaces,

    /// A face references a vertex index outside the vertex table.
    #[error("invalid mesh: face {face} references vertex {index} but only {count} vertices exist")]
    IndexOutOfRange {
        /// Offending face index.
        face: usize,
        /// Offending vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        count: usize,
    },

    /// A face uses the same vertex index more than once.
    #[error("invalid mesh: face {face} repeats vertex index {index}")]
    RepeatedIndex {
        /// Offending face index.
        face: usize,
        /// The repeated vertex index.
        index: u32,
    },

    /// A polygon face has fewer than three vertices.
    #[error("invalid mesh: face {face} has only {arity} vertices")]
    ShortFace {
        /// Offending face index.
        face: usize,
        /// Number of vertices in the face.
        arity: usize,
    },
}

/// An indexed triangle mesh.
///
/// Vertices are `f64` points; faces are counter-clockwise index triples
/// (outward-facing by the right-hand rule for closed solids).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangle faces as vertex index triples.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.faces.len()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the mesh carries no geometry at all.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// The three corner points of triangle `i`.
    pub fn triangle(&self, i: usize) -> [Point3; 3] {
        let [a, b, c] = self.faces[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Unit normal of triangle `i` from its winding, or the zero vector
    /// for a degenerate triangle.
    pub fn face_normal(&self, i: usize) -> Vec3 {
        let [a, b, c] = self.triangle(i);
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len > 1e-12 {
            n / len
        } else {
            Vec3::zeros()
        }
    }

    /// Merge another mesh into this one, offsetting its indices by the
    /// running vertex count.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces
            .extend(other.faces.iter().map(|f| f.map(|i| i + offset)));
    }

    /// Apply an affine transform, producing a new mesh.
    ///
    /// For an orientation-reversing transform (negative determinant of the
    /// linear block) the face winding is flipped so normals stay outward.
    pub fn transformed(&self, transform: &Transform) -> TriangleMesh {
        let vertices = self
            .vertices
            .iter()
            .map(|v| transform.apply_point(v))
            .collect();
        let mut faces = self.faces.clone();
        if transform.det3() < 0.0 {
            for f in &mut faces {
                f.swap(1, 2);
            }
        }
        TriangleMesh { vertices, faces }
    }

    /// Structurally validate the mesh.
    ///
    /// Hard failures: empty vertex or face table, out-of-range indices,
    /// repeated indices within a face. Closure and orientation consistency
    /// are checked but not required: a violation logs a warning and the
    /// mesh is accepted.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.is_empty() {
            return Err(MeshError::NoVertices);
        }
        if self.faces.is_empty() {
            return Err(MeshError::NoFaces);
        }
        let count = self.vertices.len();
        for (fi, f) in self.faces.iter().enumerate() {
            for &i in f {
                if i as usize >= count {
                    return Err(MeshError::IndexOutOfRange {
                        face: fi,
                        index: i,
                        count,
                    });
                }
            }
            if f[0] == f[1] || f[1] == f[2] || f[0] == f[2] {
                let index = if f[0] == f[1] || f[0] == f[2] {
                    f[0]
                } else {
                    f[1]
                };
                return Err(MeshError::RepeatedIndex { face: fi, index });
            }
        }

        if let Some(reason) = self.manifold_defect() {
            tracing::warn!("mesh is not a closed orientable manifold: {reason}");
        }
        Ok(())
    }

    /// Check that every directed edge appears exactly once and is matched
    /// by its reverse. Returns a description of the first defect found.
    fn manifold_defect(&self) -> Option<String> {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for f in &self.faces {
            for k in 0..3 {
                let e = (f[k], f[(k + 1) % 3]);
                *directed.entry(e).or_insert(0) += 1;
            }
        }
        for (&(a, b), &n) in &directed {
            if n > 1 {
                return Some(format!("directed edge ({a},{b}) used {n} times"));
            }
            if !directed.contains_key(&(b, a)) {
                return Some(format!("boundary edge ({a},{b}) has no mate"));
            }
        }
        None
    }

    /// Enclosed volume via signed tetrahedra against the origin.
    ///
    /// Only meaningful for closed, consistently oriented meshes.
    pub fn volume(&self) -> f64 {
        let mut vol = 0.0;
        for f in &self.faces {
            let a = self.vertices[f[0] as usize].coords;
            let b = self.vertices[f[1] as usize].coords;
            let c = self.vertices[f[2] as usize].coords;
            vol += a.dot(&b.cross(&c));
        }
        (vol / 6.0).abs()
    }

    /// Total surface area of all triangles.
    pub fn surface_area(&self) -> f64 {
        let mut area = 0.0;
        for (i, _) in self.faces.iter().enumerate() {
            let [a, b, c] = self.triangle(i);
            area += (b - a).cross(&(c - a)).norm() / 2.0;
        }
        area
    }

    /// Axis-aligned bounding box as `(min, max)`.
    ///
    /// Returns `None` for a mesh with no vertices.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v[i]);
                max[i] = max[i].max(v[i]);
            }
        }
        Some((min, max))
    }
}

/// A mesh whose faces may have any arity, as produced by external engines.
///
/// Accepted into the kernel by [`PolygonMesh::triangulate`], which
/// fan-triangulates every face around its first vertex.
#[derive(Debug, Clone, Default)]
pub struct PolygonMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Faces as vertex index rings.
    pub faces: Vec<Vec<u32>>,
}

impl PolygonMesh {
    /// Fan-triangulate into a [`TriangleMesh`] and validate the result.
    ///
    /// An entirely empty polygon mesh triangulates to the empty triangle
    /// mesh (a legal boolean result); a non-empty one must pass structural
    /// validation.
    pub fn triangulate(&self) -> Result<TriangleMesh, MeshError> {
        if self.faces.is_empty() {
            return Ok(TriangleMesh::new());
        }
        let mut faces = Vec::with_capacity(self.faces.len());
        for (fi, ring) in self.faces.iter().enumerate() {
            if ring.len() < 3 {
                return Err(MeshError::ShortFace {
                    face: fi,
                    arity: ring.len(),
                });
            }
            for k in 1..ring.len() - 1 {
                faces.push([ring[0], ring[k], ring[k + 1]]);
            }
        }
        let mesh = TriangleMesh {
            vertices: self.vertices.clone(),
            faces,
        };
        mesh.validate()?;
        Ok(mesh)
    }
}
