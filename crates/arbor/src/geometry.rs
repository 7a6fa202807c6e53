//! Geometric payload of a part: primitive descriptor plus cached mesh.

use std::collections::HashMap;

use arbor_mesh::TriangleMesh;
use serde::{Deserialize, Serialize};

/// Tagged primitive descriptor.
///
/// Advisory metadata for downstream readers; the cached mesh is the
/// authoritative geometric state. Boolean results and non-rigid
/// transforms carry [`PrimitiveKind::Mesh`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PrimitiveKind {
    /// Axis-aligned box centered at the origin.
    Box {
        /// Extent along X.
        width: f64,
        /// Extent along Y.
        height: f64,
        /// Extent along Z.
        depth: f64,
    },
    /// Cylinder along +Z centered at the origin.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Extent along Z.
        height: f64,
    },
    /// Shape carried entirely by the mesh cache.
    Mesh,
}

/// A primitive descriptor with its cached triangle mesh.
///
/// `kind` and `parameters` stay consistent with the mesh only while
/// mutations preserve analytical meaning: pure rigid motions keep them,
/// everything else collapses to [`PrimitiveKind::Mesh`] with an empty
/// parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryData {
    /// Advisory primitive tag.
    pub kind: PrimitiveKind,
    /// Advisory named parameters of the primitive.
    pub parameters: HashMap<String, f64>,
    /// The authoritative triangle mesh.
    pub mesh: TriangleMesh,
}

impl GeometryData {
    /// Wrap a bare mesh with no analytical descriptor.
    pub fn from_mesh(mesh: TriangleMesh) -> Self {
        Self {
            kind: PrimitiveKind::Mesh,
            parameters: HashMap::new(),
            mesh,
        }
    }

    /// Box descriptor around an already tessellated mesh.
    pub(crate) fn boxed(width: f64, height: f64, depth: f64, mesh: TriangleMesh) -> Self {
        let parameters = HashMap::from([
            ("width".to_string(), width),
            ("height".to_string(), height),
            ("depth".to_string(), depth),
        ]);
        Self {
            kind: PrimitiveKind::Box {
                width,
                height,
                depth,
            },
            parameters,
            mesh,
        }
    }

    /// Cylinder descriptor around an already tessellated mesh.
    pub(crate) fn cylindrical(radius: f64, height: f64, segments: u32, mesh: TriangleMesh) -> Self {
        let parameters = HashMap::from([
            ("radius".to_string(), radius),
            ("height".to_string(), height),
            ("segments".to_string(), segments as f64),
        ]);
        Self {
            kind: PrimitiveKind::Cylinder { radius, height },
            parameters,
            mesh,
        }
    }
}
