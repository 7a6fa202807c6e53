#![warn(missing_docs)]

//! arbor — Parametric CAD in Rust
//!
//! Solid primitives, regularized CSG composition, a history-bearing
//! document model, binary STL / AP214 STEP export, and a geometric
//! constraint solver over 3D points.
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor::Part;
//!
//! let block = Part::cube("block", 20.0, 10.0, 5.0).unwrap();
//! let hole = Part::cylinder("hole", 3.0, 12.0).unwrap();
//! let result = block.difference(&hole).unwrap();
//! result.write_stl("block_with_hole.stl").unwrap();
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod document;
pub mod export;
mod geometry;

pub use arbor_booleans::{BoolOp, BooleanEngine, BooleanError};
pub use arbor_constraints::{
    Constraint, ConstraintSolver, PointVar, SolveError, SolveReport, SolverConfig,
};
pub use arbor_math::{Axis, Point3, Tolerance, Transform, Vec3};
pub use arbor_mesh::{MeshError, PolygonMesh, TriangleMesh};
pub use arbor_primitives::{PrimitiveError, DEFAULT_SEGMENTS};
pub use arbor_step::{Compound, StepError, StepWriter, SCHEMA_AP214};
pub use document::Document;
pub use geometry::{GeometryData, PrimitiveKind};

#[cfg(feature = "manifold")]
use arbor_booleans::boolean_op;

/// Errors returned by CAD operations.
#[derive(Error, Debug)]
pub enum CadError {
    /// An I/O error occurred during export.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid primitive dimension or unsupported primitive kind.
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),

    /// A mesh failed structural validation.
    #[error(transparent)]
    InvalidMesh(#[from] MeshError),

    /// The boolean engine rejected the inputs or produced invalid output.
    #[error(transparent)]
    Boolean(#[from] BooleanError),

    /// BRep export failed or its backend is not installed.
    #[error(transparent)]
    Step(#[from] StepError),

    /// The export format is not recognized.
    #[error("unsupported export format: {0:?}")]
    UnsupportedFormat(String),

    /// Document serialization glue failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A named, immutable geometric value object.
///
/// Create primitives with [`Part::cube`] and [`Part::cylinder`], then
/// combine them with the boolean methods or derive new parts with the
/// transform methods — the original part is never mutated. `parameters`
/// are free-form user annotations, not solver variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Human-readable part name.
    pub name: String,
    geometry: GeometryData,
    /// Free-form user annotations.
    pub parameters: HashMap<String, serde_json::Value>,
}

impl Part {
    fn with_geometry(name: impl Into<String>, geometry: GeometryData) -> Self {
        Self {
            name: name.into(),
            geometry,
            parameters: HashMap::new(),
        }
    }

    // =========================================================================
    // Primitive factories
    // =========================================================================

    /// Create a box centered at the origin. All dimensions must be
    /// finite and strictly positive.
    pub fn cube(name: impl Into<String>, width: f64, height: f64, depth: f64) -> Result<Self, CadError> {
        let mesh = arbor_primitives::tessellate_box(width, height, depth)?;
        Ok(Self::with_geometry(
            name,
            GeometryData::boxed(width, height, depth, mesh),
        ))
    }

    /// Create a cylinder along +Z centered at the origin, with the
    /// default circular resolution.
    pub fn cylinder(name: impl Into<String>, radius: f64, height: f64) -> Result<Self, CadError> {
        Self::cylinder_with_segments(name, radius, height, DEFAULT_SEGMENTS)
    }

    /// Create a cylinder with an explicit circular resolution.
    pub fn cylinder_with_segments(
        name: impl Into<String>,
        radius: f64,
        height: f64,
        segments: u32,
    ) -> Result<Self, CadError> {
        let mesh = arbor_primitives::tessellate_cylinder(radius, height, segments)?;
        Ok(Self::with_geometry(
            name,
            GeometryData::cylindrical(radius, height, segments, mesh),
        ))
    }

    /// Wrap an externally produced mesh as a part. The mesh is validated
    /// on the way in.
    pub fn from_mesh(name: impl Into<String>, mesh: TriangleMesh) -> Result<Self, CadError> {
        mesh.validate()?;
        Ok(Self::with_geometry(name, GeometryData::from_mesh(mesh)))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The geometric payload (descriptor plus authoritative mesh).
    pub fn geometry(&self) -> &GeometryData {
        &self.geometry
    }

    /// The part's triangle mesh.
    pub fn mesh(&self) -> &TriangleMesh {
        &self.geometry.mesh
    }

    /// Whether the part carries no geometry.
    pub fn is_empty(&self) -> bool {
        self.geometry.mesh.is_empty()
    }

    /// Enclosed volume of the part's mesh.
    pub fn volume(&self) -> f64 {
        self.geometry.mesh.volume()
    }

    /// Surface area of the part's mesh.
    pub fn surface_area(&self) -> f64 {
        self.geometry.mesh.surface_area()
    }

    /// Axis-aligned bounding box, or `None` for an empty part.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        self.geometry.mesh.bounding_box()
    }

    /// Number of triangles in the part's mesh.
    pub fn num_triangles(&self) -> usize {
        self.geometry.mesh.num_triangles()
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// Translate the part, producing a new part.
    pub fn translate(&self, x: f64, y: f64, z: f64) -> Self {
        self.transformed(&Transform::translation(x, y, z))
    }

    /// Rotate the part about a principal axis by `angle` radians
    /// (right-hand rule), producing a new part.
    pub fn rotate(&self, angle: f64, axis: Axis) -> Self {
        self.transformed(&Transform::rotation_about(axis, angle))
    }

    /// Apply an arbitrary affine transform, producing a new part.
    ///
    /// A pure rigid motion keeps the primitive descriptor; scaling,
    /// shear, or mirroring collapses it to [`PrimitiveKind::Mesh`].
    pub fn transformed(&self, transform: &Transform) -> Self {
        let mesh = self.geometry.mesh.transformed(transform);
        let geometry = if transform.is_rigid() {
            GeometryData {
                kind: self.geometry.kind.clone(),
                parameters: self.geometry.parameters.clone(),
                mesh,
            }
        } else {
            GeometryData::from_mesh(mesh)
        };
        Self {
            name: self.name.clone(),
            geometry,
            parameters: self.parameters.clone(),
        }
    }

    // =========================================================================
    // Boolean operations
    // =========================================================================

    /// Regularized boolean union (self ∪ other).
    #[cfg(feature = "manifold")]
    pub fn union(&self, other: &Part) -> Result<Self, CadError> {
        self.boolean(other, BoolOp::Union, "union")
    }

    /// Regularized boolean difference (self − other).
    #[cfg(feature = "manifold")]
    pub fn difference(&self, other: &Part) -> Result<Self, CadError> {
        self.boolean(other, BoolOp::Difference, "diff")
    }

    /// Regularized boolean intersection (self ∩ other).
    #[cfg(feature = "manifold")]
    pub fn intersection(&self, other: &Part) -> Result<Self, CadError> {
        self.boolean(other, BoolOp::Intersection, "intersect")
    }

    #[cfg(feature = "manifold")]
    fn boolean(&self, other: &Part, op: BoolOp, suffix: &str) -> Result<Self, CadError> {
        let mesh = boolean_op(op, &self.geometry.mesh, &other.geometry.mesh)?;
        Ok(Self::with_geometry(
            format!("{}-{}", self.name, suffix),
            GeometryData::from_mesh(mesh),
        ))
    }

    // =========================================================================
    // Export shorthands
    // =========================================================================

    /// Encode this part alone as binary STL bytes.
    pub fn to_stl(&self) -> Result<Vec<u8>, CadError> {
        export::stl::to_stl_bytes(&self.geometry.mesh)
    }

    /// Write this part alone to a binary STL file (atomically).
    pub fn write_stl(&self, path: impl AsRef<std::path::Path>) -> Result<(), CadError> {
        export::stl::write_stl_file(&self.geometry.mesh, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_cube_counts() {
        let part = Part::cube("c", 10.0, 10.0, 10.0).unwrap();
        assert_eq!(part.mesh().num_vertices(), 8);
        assert_eq!(part.num_triangles(), 12);
        assert!((part.volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_cube_invalid_dimension() {
        assert!(matches!(
            Part::cube("c", -1.0, 1.0, 1.0),
            Err(CadError::Primitive(PrimitiveError::InvalidDimension { .. }))
        ));
    }

    #[test]
    fn test_cylinder_counts() {
        let part = Part::cylinder("cyl", 5.0, 10.0).unwrap();
        assert_eq!(part.mesh().num_vertices(), 2 * 32 + 2);
        assert_eq!(part.num_triangles(), 4 * 32);
    }

    #[test]
    fn test_translate_roundtrip() {
        let part = Part::cube("c", 2.0, 3.0, 4.0).unwrap();
        let roundtrip = part.translate(1.5, -2.0, 0.5).translate(-1.5, 2.0, -0.5);
        for (a, b) in part.mesh().vertices.iter().zip(&roundtrip.mesh().vertices) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_rotate_roundtrip() {
        let part = Part::cylinder("cyl", 2.0, 5.0).unwrap();
        let roundtrip = part.rotate(PI / 3.0, Axis::Y).rotate(-PI / 3.0, Axis::Y);
        for (a, b) in part.mesh().vertices.iter().zip(&roundtrip.mesh().vertices) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_rigid_transform_keeps_kind() {
        let part = Part::cube("c", 1.0, 2.0, 3.0).unwrap();
        let moved = part.translate(5.0, 0.0, 0.0).rotate(0.3, Axis::Z);
        assert!(matches!(
            moved.geometry().kind,
            PrimitiveKind::Box { .. }
        ));
        assert_eq!(moved.geometry().parameters["width"], 1.0);
    }

    #[test]
    fn test_scaling_collapses_kind() {
        let part = Part::cube("c", 1.0, 2.0, 3.0).unwrap();
        let scaled = part.transformed(&Transform::scale(2.0, 1.0, 1.0));
        assert_eq!(scaled.geometry().kind, PrimitiveKind::Mesh);
        assert!(scaled.geometry().parameters.is_empty());
    }

    #[test]
    fn test_transform_does_not_mutate_original() {
        let part = Part::cube("c", 1.0, 1.0, 1.0).unwrap();
        let before = part.mesh().clone();
        let _ = part.translate(10.0, 0.0, 0.0);
        assert_eq!(*part.mesh(), before);
    }

    #[test]
    fn test_from_mesh_validates() {
        let broken = TriangleMesh {
            vertices: vec![Point3::origin()],
            faces: vec![[0, 1, 2]],
        };
        assert!(matches!(
            Part::from_mesh("bad", broken),
            Err(CadError::InvalidMesh(_))
        ));
    }

    #[cfg(feature = "manifold")]
    #[test]
    fn test_boolean_result_is_mesh_kind() {
        let a = Part::cube("a", 10.0, 10.0, 10.0).unwrap();
        let b = Part::cube("b", 4.0, 4.0, 4.0).unwrap();
        let result = a.difference(&b).unwrap();
        assert_eq!(result.geometry().kind, PrimitiveKind::Mesh);
        assert_eq!(result.name, "a-diff");
        assert!(!result.is_empty());
    }
}
