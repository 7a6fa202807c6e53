//! Damped Gauss-Newton / Levenberg-Marquardt solve loop.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::{Constraint, PointVar};
use arbor_math::Point3;

/// Solver tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Maximum number of accepted iterations.
    pub max_iterations: usize,
    /// Convergence tolerance on the residual infinity norm.
    pub residual_tolerance: f64,
    /// Stop when the step infinity norm falls below this.
    pub step_tolerance: f64,
    /// Initial Levenberg-Marquardt damping factor.
    pub lambda_init: f64,
    /// Lower clamp for the damping factor.
    pub lambda_min: f64,
    /// Upper clamp for the damping factor; saturation at this value with a
    /// singular normal matrix aborts the solve.
    pub lambda_max: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            residual_tolerance: 1e-6,
            step_tolerance: 1e-9,
            lambda_init: 1e-3,
            lambda_min: 1e-9,
            lambda_max: 1e9,
        }
    }
}

impl SolverConfig {
    /// Fast configuration: fewer iterations, looser tolerance.
    pub fn fast() -> Self {
        Self {
            max_iterations: 25,
            residual_tolerance: 1e-4,
            ..Default::default()
        }
    }

    /// Precise configuration: more iterations, tighter tolerance.
    pub fn precise() -> Self {
        Self {
            max_iterations: 500,
            residual_tolerance: 1e-9,
            ..Default::default()
        }
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Whether the residual infinity norm is below tolerance.
    pub converged: bool,
    /// Number of accepted iterations performed.
    pub iterations: usize,
    /// Euclidean norm of the final residual vector.
    pub final_residual_norm: f64,
    /// Human-readable outcome description.
    pub message: String,
}

/// Unrecoverable solver failures.
///
/// Plain non-convergence is not an error; it is reported in the
/// [`SolveReport`].
#[derive(Error, Debug)]
pub enum SolveError {
    /// The damped normal equations stayed singular at maximum damping.
    #[error("normal equations remained singular at maximum damping")]
    Singular,
}

/// Nonlinear least-squares solver over a table of 3D point variables.
///
/// Variables and constraints are registered up front; [`ConstraintSolver::solve`]
/// mutates the point values in place. Not re-entrant: concurrent use
/// requires external mutual exclusion. Given identical inputs and
/// insertion order the solve is bitwise deterministic.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSolver {
    values: Vec<f64>,
    fixed: Vec<bool>,
    constraints: Vec<Constraint>,
    config: SolverConfig,
}

impl ConstraintSolver {
    /// Create a solver with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with a custom configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Register a free point variable at the given initial position.
    pub fn add_point(&mut self, x: f64, y: f64, z: f64) -> PointVar {
        let var = PointVar(self.fixed.len());
        self.values.extend([x, y, z]);
        self.fixed.push(false);
        var
    }

    /// Register a fixed point: its Jacobian columns are zeroed and its
    /// value never changes across solves.
    pub fn add_fixed_point(&mut self, x: f64, y: f64, z: f64) -> PointVar {
        let var = self.add_point(x, y, z);
        self.fixed[var.0] = true;
        var
    }

    /// Change the fixed flag of an existing point.
    pub fn set_fixed(&mut self, var: PointVar, fixed: bool) {
        self.fixed[var.0] = fixed;
    }

    /// Register a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Current position of a point variable.
    pub fn get_point(&self, var: PointVar) -> Point3 {
        let i = 3 * var.0;
        Point3::new(self.values[i], self.values[i + 1], self.values[i + 2])
    }

    /// Number of registered points.
    pub fn num_points(&self) -> usize {
        self.fixed.len()
    }

    /// Number of registered constraints.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn residual_dim(&self) -> usize {
        self.constraints.iter().map(|c| c.residual_len()).sum()
    }

    fn residuals(&self, x: &[f64]) -> DVector<f64> {
        let mut r = DVector::zeros(self.residual_dim());
        let mut row = 0;
        for c in &self.constraints {
            let len = c.residual_len();
            c.write_residual(x, &mut r.as_mut_slice()[row..row + len]);
            row += len;
        }
        r
    }

    /// Assemble the Jacobian with fixed-variable columns zeroed, which
    /// removes those unknowns from the step without renumbering.
    fn jacobian(&self, x: &[f64]) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.residual_dim(), self.values.len());
        let mut row = 0;
        for c in &self.constraints {
            c.write_jacobian(x, &mut jac, row);
            row += c.residual_len();
        }
        for (p, &is_fixed) in self.fixed.iter().enumerate() {
            if is_fixed {
                for k in 0..3 {
                    jac.column_mut(3 * p + k).fill(0.0);
                }
            }
        }
        jac
    }

    /// Run the solve loop with per-call overrides of the iteration limit
    /// and residual tolerance. `None` keeps the configured value.
    pub fn solve_with(
        &mut self,
        max_iterations: Option<usize>,
        residual_tolerance: Option<f64>,
    ) -> Result<SolveReport, SolveError> {
        let saved = self.config;
        if let Some(max) = max_iterations {
            self.config.max_iterations = max;
        }
        if let Some(tol) = residual_tolerance {
            self.config.residual_tolerance = tol;
        }
        let result = self.solve();
        self.config = saved;
        result
    }

    /// Run the damped Gauss-Newton / Levenberg-Marquardt loop.
    ///
    /// Point values are updated in place. Returns the report on success;
    /// [`SolveError::Singular`] only when the damped normal matrix stays
    /// singular with the damping factor saturated.
    pub fn solve(&mut self) -> Result<SolveReport, SolveError> {
        let n = self.values.len();
        if self.constraints.is_empty() {
            return Ok(SolveReport {
                converged: true,
                iterations: 0,
                final_residual_norm: 0.0,
                message: "no constraints".to_string(),
            });
        }

        let tol_r = self.config.residual_tolerance;
        let mut x = DVector::from_column_slice(&self.values);
        let mut r = self.residuals(x.as_slice());

        if inf_norm(&r) < tol_r {
            return Ok(SolveReport {
                converged: true,
                iterations: 0,
                final_residual_norm: r.norm(),
                message: "satisfied at initial configuration".to_string(),
            });
        }

        let mut lambda = self.config.lambda_init;
        let mut iterations = 0;
        let mut converged = false;
        let mut stalled: Option<&str> = None;

        'outer: while iterations < self.config.max_iterations {
            iterations += 1;
            let jac = self.jacobian(x.as_slice());
            let jtj = jac.transpose() * &jac;
            let jtr = jac.transpose() * &r;

            // Inner damping loop: retries reuse the same residual and
            // Jacobian, only lambda changes.
            let delta = loop {
                let mut normal = jtj.clone();
                for i in 0..n {
                    normal[(i, i)] += lambda;
                }
                match normal.lu().solve(&(-&jtr)) {
                    Some(mut delta) => {
                        for (p, &is_fixed) in self.fixed.iter().enumerate() {
                            if is_fixed {
                                for k in 0..3 {
                                    delta[3 * p + k] = 0.0;
                                }
                            }
                        }
                        let candidate = &x + &delta;
                        let r_new = self.residuals(candidate.as_slice());
                        if r_new.norm() < r.norm() {
                            x = candidate;
                            r = r_new;
                            lambda = (lambda / 10.0).max(self.config.lambda_min);
                            break delta;
                        }
                        if lambda >= self.config.lambda_max {
                            stalled = Some("step rejected at maximum damping");
                            break 'outer;
                        }
                        lambda = (lambda * 10.0).min(self.config.lambda_max);
                    }
                    None => {
                        if lambda >= self.config.lambda_max {
                            return Err(SolveError::Singular);
                        }
                        lambda = (lambda * 10.0).min(self.config.lambda_max);
                    }
                }
            };

            tracing::debug!(
                iteration = iterations,
                residual_norm = r.norm(),
                lambda,
                "accepted step"
            );

            if inf_norm(&r) < tol_r {
                converged = true;
                break;
            }
            if inf_norm(&delta) < self.config.step_tolerance {
                stalled = Some("step below tolerance");
                break;
            }
        }

        self.values.copy_from_slice(x.as_slice());
        let converged = converged || inf_norm(&r) < tol_r;
        let final_residual_norm = r.norm();
        let message = match (converged, stalled) {
            (true, _) => "converged".to_string(),
            (false, Some(why)) => format!("{why}; residual norm {final_residual_norm:.3e}"),
            (false, None) => format!(
                "iteration limit reached; residual norm {final_residual_norm:.3e}"
            ),
        };

        Ok(SolveReport {
            converged,
            iterations,
            final_residual_norm,
            message,
        })
    }
}

fn inf_norm(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_distance_converges() {
        let mut solver = ConstraintSolver::new();
        let a = solver.add_fixed_point(0.0, 0.0, 0.0);
        let b = solver.add_point(3.0, 0.0, 0.0);
        solver.add_constraint(Constraint::distance(a, b, 5.0));
        let report = solver.solve().unwrap();
        assert!(report.converged, "{}", report.message);

        let pa = solver.get_point(a);
        let pb = solver.get_point(b);
        assert_abs_diff_eq!((pb - pa).norm(), 5.0, epsilon = 1e-6);
        // Fixed anchor did not move
        assert_eq!(pa, Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_satisfied_system_converges_in_zero_iterations() {
        let mut solver = ConstraintSolver::new();
        let a = solver.add_point(0.0, 0.0, 0.0);
        let b = solver.add_point(5.0, 0.0, 0.0);
        solver.add_constraint(Constraint::distance(a, b, 5.0));
        let report = solver.solve().unwrap();
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_empty_solver_is_trivially_converged() {
        let mut solver = ConstraintSolver::new();
        solver.add_point(1.0, 2.0, 3.0);
        let report = solver.solve().unwrap();
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_angle_converges_to_target() {
        let mut solver = ConstraintSolver::new();
        // Right angle at the apex, target 45 degrees
        let a = solver.add_point(1.0, 0.0, 0.0);
        let apex = solver.add_fixed_point(0.0, 0.0, 0.0);
        let c = solver.add_point(0.0, 1.0, 0.0);
        solver.add_constraint(Constraint::angle(a, apex, c, FRAC_PI_4));
        let report = solver.solve().unwrap();
        assert!(report.converged, "{}", report.message);

        let u = solver.get_point(a) - solver.get_point(apex);
        let v = solver.get_point(c) - solver.get_point(apex);
        let measured = (u.dot(&v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos();
        assert_abs_diff_eq!(measured, FRAC_PI_4, epsilon = 1e-6);
    }

    #[test]
    fn test_parallel_converges_from_skew() {
        let mut solver = ConstraintSolver::new();
        let a = solver.add_fixed_point(0.0, 0.0, 0.0);
        let b = solver.add_fixed_point(1.0, 0.0, 0.0);
        let c = solver.add_point(0.0, 1.0, 0.0);
        let d = solver.add_point(0.4, 1.6, 0.9);
        solver.add_constraint(Constraint::parallel(a, b, c, d));
        let report = solver.solve().unwrap();
        assert!(report.converged, "{}", report.message);

        let e1 = solver.get_point(b) - solver.get_point(a);
        let e2 = solver.get_point(d) - solver.get_point(c);
        let cross = e1.cross(&e2);
        assert!(cross.amax() < 1e-6, "cross product {cross:?}");
    }

    #[test]
    fn test_perpendicular_converges() {
        let mut solver = ConstraintSolver::new();
        let a = solver.add_fixed_point(0.0, 0.0, 0.0);
        let b = solver.add_fixed_point(1.0, 0.0, 0.0);
        let c = solver.add_point(0.0, 0.0, 1.0);
        let d = solver.add_point(1.0, 0.3, 1.0);
        solver.add_constraint(Constraint::perpendicular(a, b, c, d));
        let report = solver.solve().unwrap();
        assert!(report.converged, "{}", report.message);

        let e1 = solver.get_point(b) - solver.get_point(a);
        let e2 = solver.get_point(d) - solver.get_point(c);
        assert_abs_diff_eq!(e1.dot(&e2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_point_never_moves() {
        let mut solver = ConstraintSolver::new();
        let anchor = solver.add_fixed_point(1.0, 2.0, 3.0);
        let free = solver.add_point(1.5, 2.0, 3.0);
        solver.add_constraint(Constraint::distance(anchor, free, 4.0));
        for _ in 0..3 {
            solver.solve().unwrap();
            assert_eq!(solver.get_point(anchor), Point3::new(1.0, 2.0, 3.0));
        }
    }

    #[test]
    fn test_solve_with_iteration_cap() {
        let mut solver = ConstraintSolver::new();
        let a = solver.add_fixed_point(0.0, 0.0, 0.0);
        let b = solver.add_point(1.0, 0.0, 0.0);
        solver.add_constraint(Constraint::distance(a, b, 2.0));

        // A single damped step cannot reach 1e-6
        let report = solver.solve_with(Some(1), None).unwrap();
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);

        // The override does not stick
        let report = solver.solve().unwrap();
        assert!(report.converged, "{}", report.message);
    }

    #[test]
    fn test_contradictory_constraints_report_non_convergence() {
        let mut solver = ConstraintSolver::new();
        let a = solver.add_fixed_point(0.0, 0.0, 0.0);
        let b = solver.add_point(1.0, 0.0, 0.0);
        solver.add_constraint(Constraint::distance(a, b, 1.0));
        solver.add_constraint(Constraint::distance(a, b, 3.0));
        let report = solver.solve().unwrap();
        assert!(!report.converged);
        assert!(report.final_residual_norm > 0.1);
        assert!(!report.message.is_empty());
    }

    #[test]
    fn test_solve_is_deterministic() {
        let build = || {
            let mut solver = ConstraintSolver::new();
            let a = solver.add_point(0.1, 0.2, 0.3);
            let b = solver.add_point(2.0, 0.5, -0.4);
            let c = solver.add_point(-1.0, 1.0, 0.7);
            solver.add_constraint(Constraint::distance(a, b, 3.0));
            solver.add_constraint(Constraint::angle(a, b, c, FRAC_PI_2));
            (solver, [a, b, c])
        };
        let (mut s1, vars1) = build();
        let (mut s2, vars2) = build();
        s1.solve().unwrap();
        s2.solve().unwrap();
        for (v1, v2) in vars1.iter().zip(&vars2) {
            // Bitwise identical, not merely close
            assert_eq!(s1.get_point(*v1), s2.get_point(*v2));
        }
    }

    #[test]
    fn test_combined_system() {
        // A 3-4-5 style triangle driven from a degenerate start
        let mut solver = ConstraintSolver::new();
        let a = solver.add_fixed_point(0.0, 0.0, 0.0);
        let b = solver.add_point(1.0, 0.1, 0.0);
        let c = solver.add_point(0.1, 1.0, 0.0);
        solver.add_constraint(Constraint::distance(a, b, 3.0));
        solver.add_constraint(Constraint::distance(a, c, 4.0));
        solver.add_constraint(Constraint::distance(b, c, 5.0));
        let report = solver.solve().unwrap();
        assert!(report.converged, "{}", report.message);

        let pb = solver.get_point(b);
        let pc = solver.get_point(c);
        assert_abs_diff_eq!(pb.coords.norm(), 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pc.coords.norm(), 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!((pb - pc).norm(), 5.0, epsilon = 1e-6);
    }
}
