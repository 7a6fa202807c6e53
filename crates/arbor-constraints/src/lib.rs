#![warn(missing_docs)]

//! Geometric constraint solver for the arbor CAD core.
//!
//! A set of free 3D points is driven by a damped Gauss-Newton /
//! Levenberg-Marquardt loop so that user-declared relations (distance,
//! angle, parallelism, perpendicularity) are simultaneously satisfied.
//! Every constraint kind supplies its residual and its analytic partial
//! derivatives; the solver assembles them into a global residual vector
//! and Jacobian and solves the damped normal equations.
//!
//! # Example
//!
//! ```
//! use arbor_constraints::{Constraint, ConstraintSolver};
//!
//! let mut solver = ConstraintSolver::new();
//! let a = solver.add_fixed_point(0.0, 0.0, 0.0);
//! let b = solver.add_point(3.0, 0.0, 0.0);
//! solver.add_constraint(Constraint::distance(a, b, 5.0));
//! let report = solver.solve().unwrap();
//! assert!(report.converged);
//! ```

mod constraint;
mod solver;

pub use constraint::Constraint;
pub use solver::{ConstraintSolver, SolveError, SolveReport, SolverConfig};

/// Handle to a 3D point variable in a [`ConstraintSolver`].
///
/// Each handle addresses three consecutive scalar unknowns (x, y, z) in
/// the solver's variable vector, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointVar(pub(crate) usize);

impl PointVar {
    /// Index of this point in the solver's point table.
    pub fn index(&self) -> usize {
        self.0
    }
}
