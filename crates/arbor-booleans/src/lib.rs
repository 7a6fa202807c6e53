#![warn(missing_docs)]

//! Regularized CSG boolean operations over triangle meshes.
//!
//! The actual polyhedral boolean runs in an external engine behind the
//! [`BooleanEngine`] trait; this crate owns the contract around it:
//! empty-operand shortcuts, re-triangulation of the engine's output, and
//! structural re-validation. Swapping the backend means implementing the
//! trait — the rest of the core never changes.

use arbor_mesh::{MeshError, PolygonMesh, TriangleMesh};
use thiserror::Error;

#[cfg(feature = "manifold")]
mod engine;

#[cfg(feature = "manifold")]
pub use engine::ManifoldEngine;

/// CSG boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Union: combine both solids.
    Union,
    /// Difference: subtract the tool from the target.
    Difference,
    /// Intersection: keep only the overlapping region.
    Intersection,
}

/// Errors raised by boolean composition.
#[derive(Error, Debug)]
pub enum BooleanError {
    /// The external engine rejected the inputs or failed internally.
    #[error("boolean engine failure: {0}")]
    BooleanFailure(String),

    /// The engine produced a mesh that failed structural validation.
    #[error(transparent)]
    InvalidMesh(#[from] MeshError),
}

/// An external polyhedral boolean engine.
///
/// Inputs are structurally valid triangle meshes; the output may use
/// polygon faces of any arity and is re-triangulated and re-validated by
/// the adapter before it re-enters the kernel.
pub trait BooleanEngine {
    /// Execute `op` over the two operand meshes.
    fn execute(
        &self,
        op: BoolOp,
        a: &TriangleMesh,
        b: &TriangleMesh,
    ) -> Result<PolygonMesh, String>;
}

/// Perform a regularized boolean with the default engine.
#[cfg(feature = "manifold")]
pub fn boolean_op(
    op: BoolOp,
    a: &TriangleMesh,
    b: &TriangleMesh,
) -> Result<TriangleMesh, BooleanError> {
    boolean_with(&ManifoldEngine, op, a, b)
}

/// Perform a regularized boolean with an explicit engine.
///
/// Empty operands short-circuit without consulting the engine:
/// union with the empty mesh is the other operand, difference with an
/// empty tool is the target, and intersection with an empty operand is
/// empty. Both operands are validated before the engine runs; the result
/// is re-triangulated and re-validated afterwards.
pub fn boolean_with(
    engine: &dyn BooleanEngine,
    op: BoolOp,
    a: &TriangleMesh,
    b: &TriangleMesh,
) -> Result<TriangleMesh, BooleanError> {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ok(TriangleMesh::new()),
        (true, false) => {
            return Ok(match op {
                BoolOp::Union => b.clone(),
                BoolOp::Difference | BoolOp::Intersection => TriangleMesh::new(),
            })
        }
        (false, true) => {
            return Ok(match op {
                BoolOp::Union | BoolOp::Difference => a.clone(),
                BoolOp::Intersection => TriangleMesh::new(),
            })
        }
        (false, false) => {}
    }

    a.validate()?;
    b.validate()?;

    let raw = engine
        .execute(op, a, b)
        .map_err(BooleanError::BooleanFailure)?;

    // Triangulation validates non-empty results; the empty mesh is a
    // legitimate outcome (e.g. difference of a solid with itself).
    Ok(raw.triangulate()?)
}
