//! Constraint kinds: residual evaluation and analytic partial derivatives.

use arbor_math::Vec3;
use nalgebra::{DMatrix, Matrix3};

use crate::PointVar;

/// Threshold below which a configuration counts as degenerate
/// (coincident points, zero-length legs).
const DEGENERATE: f64 = 1e-12;

/// A geometric relation over solver points.
///
/// Each kind evaluates to one scalar residual, except [`Constraint::Parallel`]
/// which contributes the three components of the edge cross product.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Distance between two points equals `target`.
    Distance {
        /// First point.
        a: PointVar,
        /// Second point.
        b: PointVar,
        /// Target distance.
        target: f64,
    },
    /// Angle at `apex` between legs to `a` and `c` equals `target` radians.
    Angle {
        /// First leg endpoint.
        a: PointVar,
        /// Apex of the angle.
        apex: PointVar,
        /// Second leg endpoint.
        c: PointVar,
        /// Target angle in radians.
        target: f64,
    },
    /// Edge `(a, b)` is parallel to edge `(c, d)`.
    Parallel {
        /// First edge start.
        a: PointVar,
        /// First edge end.
        b: PointVar,
        /// Second edge start.
        c: PointVar,
        /// Second edge end.
        d: PointVar,
    },
    /// Edge `(a, b)` is perpendicular to edge `(c, d)`.
    Perpendicular {
        /// First edge start.
        a: PointVar,
        /// First edge end.
        b: PointVar,
        /// Second edge start.
        c: PointVar,
        /// Second edge end.
        d: PointVar,
    },
}

impl Constraint {
    /// Distance constraint between two points.
    pub fn distance(a: PointVar, b: PointVar, target: f64) -> Self {
        Self::Distance { a, b, target }
    }

    /// Angle constraint at `apex` between legs to `a` and `c`, in radians.
    pub fn angle(a: PointVar, apex: PointVar, c: PointVar, target: f64) -> Self {
        Self::Angle { a, apex, c, target }
    }

    /// Parallelism constraint between edges `(a, b)` and `(c, d)`.
    pub fn parallel(a: PointVar, b: PointVar, c: PointVar, d: PointVar) -> Self {
        Self::Parallel { a, b, c, d }
    }

    /// Perpendicularity constraint between edges `(a, b)` and `(c, d)`.
    pub fn perpendicular(a: PointVar, b: PointVar, c: PointVar, d: PointVar) -> Self {
        Self::Perpendicular { a, b, c, d }
    }

    /// Number of scalar residuals this constraint contributes.
    pub fn residual_len(&self) -> usize {
        match self {
            Constraint::Parallel { .. } => 3,
            _ => 1,
        }
    }

    /// Evaluate the residual(s) into `out` (length [`Self::residual_len`]).
    pub(crate) fn write_residual(&self, x: &[f64], out: &mut [f64]) {
        match *self {
            Constraint::Distance { a, b, target } => {
                let d = (point(x, a) - point(x, b)).norm();
                out[0] = d - target;
            }
            Constraint::Angle { a, apex, c, target } => {
                let u = point(x, a) - point(x, apex);
                let v = point(x, c) - point(x, apex);
                let (nu, nv) = (u.norm(), v.norm());
                if nu < DEGENERATE || nv < DEGENERATE {
                    // Zero-length leg: the angle is undefined; leave a
                    // singular row and let damping step the legs apart.
                    out[0] = 0.0;
                    return;
                }
                let cos = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
                out[0] = cos.acos() - target;
            }
            Constraint::Parallel { a, b, c, d } => {
                let e1 = point(x, b) - point(x, a);
                let e2 = point(x, d) - point(x, c);
                let r = e1.cross(&e2);
                out[0] = r.x;
                out[1] = r.y;
                out[2] = r.z;
            }
            Constraint::Perpendicular { a, b, c, d } => {
                let e1 = point(x, b) - point(x, a);
                let e2 = point(x, d) - point(x, c);
                out[0] = e1.dot(&e2);
            }
        }
    }

    /// Write analytic partial derivatives into the global Jacobian,
    /// starting at `row`. Columns for point `p` are `3p .. 3p+3`.
    pub(crate) fn write_jacobian(&self, x: &[f64], jac: &mut DMatrix<f64>, row: usize) {
        match *self {
            Constraint::Distance { a, b, .. } => {
                let diff = point(x, a) - point(x, b);
                let d = diff.norm();
                if d < DEGENERATE {
                    // Coincident points: singular row, handled by damping
                    return;
                }
                let g = diff / d;
                add_grad(jac, row, a, &g);
                add_grad(jac, row, b, &-g);
            }
            Constraint::Angle { a, apex, c, .. } => {
                let u = point(x, a) - point(x, apex);
                let v = point(x, c) - point(x, apex);
                let (nu, nv) = (u.norm(), v.norm());
                if nu < DEGENERATE || nv < DEGENERATE {
                    return;
                }
                let cos = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
                // acos' blows up at |cos| = 1; clamp keeps the row finite
                // near collinear configurations.
                let safe = cos.clamp(-1.0 + 1e-12, 1.0 - 1e-12);
                let dacos = -1.0 / (1.0 - safe * safe).sqrt();
                let dcos_du = v / (nu * nv) - u * (cos / (nu * nu));
                let dcos_dv = u / (nu * nv) - v * (cos / (nv * nv));
                let ga = dacos * dcos_du;
                let gc = dacos * dcos_dv;
                add_grad(jac, row, a, &ga);
                add_grad(jac, row, c, &gc);
                add_grad(jac, row, apex, &-(ga + gc));
            }
            Constraint::Parallel { a, b, c, d } => {
                let e1 = point(x, b) - point(x, a);
                let e2 = point(x, d) - point(x, c);
                // r = e1 x e2:  dr/de1 = -skew(e2),  dr/de2 = skew(e1)
                let de1 = -skew(&e2);
                let de2 = skew(&e1);
                add_block(jac, row, b, &de1);
                add_block(jac, row, a, &-de1);
                add_block(jac, row, d, &de2);
                add_block(jac, row, c, &-de2);
            }
            Constraint::Perpendicular { a, b, c, d } => {
                let e1 = point(x, b) - point(x, a);
                let e2 = point(x, d) - point(x, c);
                add_grad(jac, row, b, &e2);
                add_grad(jac, row, a, &-e2);
                add_grad(jac, row, d, &e1);
                add_grad(jac, row, c, &-e1);
            }
        }
    }
}

fn point(x: &[f64], v: PointVar) -> Vec3 {
    Vec3::new(x[3 * v.0], x[3 * v.0 + 1], x[3 * v.0 + 2])
}

fn skew(w: &Vec3) -> Matrix3<f64> {
    Matrix3::new(0.0, -w.z, w.y, w.z, 0.0, -w.x, -w.y, w.x, 0.0)
}

fn add_grad(jac: &mut DMatrix<f64>, row: usize, var: PointVar, g: &Vec3) {
    for k in 0..3 {
        jac[(row, 3 * var.0 + k)] += g[k];
    }
}

fn add_block(jac: &mut DMatrix<f64>, row: usize, var: PointVar, m: &Matrix3<f64>) {
    for r in 0..3 {
        for k in 0..3 {
            jac[(row + r, 3 * var.0 + k)] += m[(r, k)];
        }
    }
}
