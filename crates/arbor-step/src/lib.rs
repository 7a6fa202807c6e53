#![warn(missing_docs)]

//! Boundary-representation export seam for the arbor CAD core.
//!
//! arbor itself never writes STEP files. This crate translates triangle
//! meshes into the vocabulary an external boundary-representation writer
//! understands — vertex points, oriented edges, planar faces, compounds —
//! and submits the result through the [`StepWriter`] trait with the AP214
//! schema identifier. Installing a concrete writer is the embedder's job;
//! without one, export fails with [`StepError::BackendUnavailable`] rather
//! than silently falling back.

use arbor_math::Point3;
use arbor_mesh::TriangleMesh;
use thiserror::Error;

/// Schema identifier handed to the external writer.
pub const SCHEMA_AP214: &str = "AP214";

/// Errors raised by boundary-representation export.
#[derive(Error, Debug)]
pub enum StepError {
    /// No external writer is installed.
    #[error("BRep backend unavailable: no STEP writer installed")]
    BackendUnavailable,

    /// The external writer rejected the shape or failed on I/O.
    #[error("BRep export failure: {0}")]
    ExportFailure(String),
}

/// A vertex point entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexPoint {
    /// Position in model space.
    pub point: Point3,
}

/// An oriented edge between two vertex points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedEdge {
    /// Edge start.
    pub start: VertexPoint,
    /// Edge end.
    pub end: VertexPoint,
}

/// A planar face bounded by three oriented edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarFace {
    /// Boundary edges in winding order.
    pub edges: [OrientedEdge; 3],
}

/// A compound of planar faces representing one part.
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    /// Name of the originating part.
    pub name: String,
    /// All faces of the part.
    pub faces: Vec<PlanarFace>,
}

/// The external boundary-representation writer.
///
/// Implementations serialize a set of compounds under the given schema
/// and return an opaque byte stream.
pub trait StepWriter {
    /// Write the compounds; `schema` is e.g. [`SCHEMA_AP214`].
    fn write(&self, compounds: &[Compound], schema: &str) -> Result<Vec<u8>, String>;
}

/// Translate one part's mesh into a compound: every triangle becomes a
/// planar face from three edges over three vertex points.
pub fn build_compound(name: &str, mesh: &TriangleMesh) -> Compound {
    let mut faces = Vec::with_capacity(mesh.num_triangles());
    for i in 0..mesh.num_triangles() {
        let [a, b, c] = mesh.triangle(i);
        let (va, vb, vc) = (
            VertexPoint { point: a },
            VertexPoint { point: b },
            VertexPoint { point: c },
        );
        faces.push(PlanarFace {
            edges: [
                OrientedEdge { start: va, end: vb },
                OrientedEdge { start: vb, end: vc },
                OrientedEdge { start: vc, end: va },
            ],
        });
    }
    Compound {
        name: name.to_string(),
        faces,
    }
}

/// Export named meshes through the external writer with the AP214 schema.
///
/// `writer` being `None` means no backend is installed; the caller gets
/// [`StepError::BackendUnavailable`].
pub fn export_step(
    parts: &[(&str, &TriangleMesh)],
    writer: Option<&dyn StepWriter>,
) -> Result<Vec<u8>, StepError> {
    let writer = writer.ok_or(StepError::BackendUnavailable)?;
    let compounds: Vec<Compound> = parts
        .iter()
        .map(|(name, mesh)| build_compound(name, mesh))
        .collect();
    writer
        .write(&compounds, SCHEMA_AP214)
        .map_err(StepError::ExportFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            faces: vec![[0, 1, 2]],
        }
    }

    /// Writer stub that records what it was asked to serialize.
    struct RecordingWriter;

    impl StepWriter for RecordingWriter {
        fn write(&self, compounds: &[Compound], schema: &str) -> Result<Vec<u8>, String> {
            assert_eq!(schema, SCHEMA_AP214);
            Ok(format!("{} compounds", compounds.len()).into_bytes())
        }
    }

    /// Writer stub that always rejects.
    struct FailingWriter;

    impl StepWriter for FailingWriter {
        fn write(&self, _compounds: &[Compound], _schema: &str) -> Result<Vec<u8>, String> {
            Err("shape out of schema".to_string())
        }
    }

    #[test]
    fn test_compound_has_one_face_per_triangle() {
        let compound = build_compound("tri", &triangle_mesh());
        assert_eq!(compound.faces.len(), 1);
        let face = &compound.faces[0];
        // Edges chain: end of each edge is the start of the next
        for k in 0..3 {
            assert_eq!(face.edges[k].end, face.edges[(k + 1) % 3].start);
        }
    }

    #[test]
    fn test_no_backend_is_backend_unavailable() {
        let mesh = triangle_mesh();
        let err = export_step(&[("tri", &mesh)], None).unwrap_err();
        assert!(matches!(err, StepError::BackendUnavailable));
    }

    #[test]
    fn test_writer_receives_ap214_compounds() {
        let mesh = triangle_mesh();
        let bytes = export_step(&[("tri", &mesh)], Some(&RecordingWriter)).unwrap();
        assert_eq!(bytes, b"1 compounds");
    }

    #[test]
    fn test_writer_rejection_is_export_failure() {
        let mesh = triangle_mesh();
        let err = export_step(&[("tri", &mesh)], Some(&FailingWriter)).unwrap_err();
        assert!(matches!(err, StepError::ExportFailure(_)));
    }
}
