//! Algebraic circle fit in the bend plane.
//!
//! The fit follows G. Taubin, "Estimation of planar curves, surfaces and
//! nonplanar space curves defined by implicit equations", IEEE Trans. PAMI
//! 13 (1991) 1115-1138: the circle parameters are recovered from the
//! smallest root of a cubic built from the centred second, third and
//! fourth moments of the points.
#![allow(clippy::cast_precision_loss, clippy::many_single_char_names)]

use tpcreco_core::FitError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on Newton steps for the characteristic polynomial.
pub const MAX_NEWTON_ITERATIONS: usize = 99;

/// Smallest `det(cov(x, y)) / mz²` accepted as a curved point set.
///
/// Points on a line give a covariance determinant at rounding level; a
/// real arc with sagitta `s` over chord `L` sits near `(s/L)²`.
pub const COLLINEAR_TOLERANCE: f64 = 1e-12;

/// Circle `(x − x0)² + (y − y0)² = radius²`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FittedCircle {
    /// Radius.
    pub radius: f64,
    /// Centre x.
    pub x0: f64,
    /// Centre y.
    pub y0: f64,
}

impl FittedCircle {
    /// Returns true if centre and radius are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.radius.is_finite() && self.x0.is_finite() && self.y0.is_finite()
    }
}

/// Taubin fit of a circle through `(x, y)` points.
///
/// Needs at least three non-collinear points. Collinear input, exact or
/// within [`COLLINEAR_TOLERANCE`], returns a non-finite circle; check
/// [`FittedCircle::is_finite`] before using it.
#[must_use]
pub fn fit_circle_taubin(points: &[(f64, f64)]) -> FittedCircle {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut mxx, mut myy, mut mxy, mut mxz, mut myz, mut mzz) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for &(px, py) in points {
        let xi = px - mean_x;
        let yi = py - mean_y;
        let zi = xi * xi + yi * yi;
        mxy += xi * yi;
        mxx += xi * xi;
        myy += yi * yi;
        mxz += xi * zi;
        myz += yi * zi;
        mzz += zi * zi;
    }
    mxx /= n;
    myy /= n;
    mxy /= n;
    mxz /= n;
    myz /= n;
    mzz /= n;

    let mz = mxx + myy;
    let cov_xy = mxx * myy - mxy * mxy;
    if cov_xy.is_nan() || cov_xy <= COLLINEAR_TOLERANCE * mz * mz {
        return FittedCircle {
            radius: f64::NAN,
            x0: f64::NAN,
            y0: f64::NAN,
        };
    }
    let var_z = mzz - mz * mz;
    let a3 = 4.0 * mz;
    let a2 = -3.0 * mz * mz - mzz;
    let a1 = var_z * mz + 4.0 * cov_xy * mz - mxz * mxz - myz * myz;
    let a0 = mxz * (mxz * myy - myz * mxy) + myz * (myz * mxx - mxz * mxy) - var_z * cov_xy;
    let a22 = a2 + a2;
    let a33 = a3 + a3 + a3;

    // Newton from x = 0 converges to the smallest root.
    let mut x = 0.0;
    let mut y = a0;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let dy = a1 + x * (a22 + a33 * x);
        let x_new = x - y / dy;
        if x_new == x || !x_new.is_finite() {
            break;
        }
        let y_new = a0 + x_new * (a1 + x_new * (a2 + x_new * a3));
        if y_new.abs() >= y.abs() {
            break;
        }
        x = x_new;
        y = y_new;
    }

    let det = x * x - x * mz + cov_xy;
    let x_center = (mxz * (myy - x) - myz * mxy) / det / 2.0;
    let y_center = (myz * (mxx - x) - mxz * mxy) / det / 2.0;

    FittedCircle {
        radius: (x_center * x_center + y_center * y_center + mz).sqrt(),
        x0: x_center + mean_x,
        y0: y_center + mean_y,
    }
}

/// Point on the circle closest to the origin.
///
/// Both stationary points of the distance lie on the line through the
/// origin and the centre. The x and y coordinates are chosen
/// independently, each as the candidate of smaller magnitude.
///
/// # Errors
/// [`FitError::UndefinedClosestPoint`] for a circle centred on the origin
/// or non-finite input.
pub fn closest_point_on_circle_to_origin(circle: &FittedCircle) -> Result<(f64, f64), FitError> {
    let FittedCircle { radius: r, x0, y0 } = *circle;
    let c2 = x0 * x0 + y0 * y0;
    if c2 == 0.0 || !circle.is_finite() {
        return Err(FitError::UndefinedClosestPoint);
    }

    let root = (x0 * x0 * r * r * y0 * y0 + r * r * y0.powi(4)).sqrt();
    let base = x0 * x0 * y0 + y0.powi(3);
    let miny = (root + base) / c2;
    let miny2 = (-root + base) / c2;

    // Rounding can push the radicand a hair below zero when x0 ≈ 0.
    let minx = (r * r - (miny - y0).powi(2)).max(0.0).sqrt() + x0;
    let minx2 = -(r * r - (miny2 - y0).powi(2)).max(0.0).sqrt() + x0;

    let x = if minx.abs() < minx2.abs() { minx } else { minx2 };
    let y = if miny.abs() < miny2.abs() { miny } else { miny2 };

    if x.is_finite() && y.is_finite() {
        Ok((x, y))
    } else {
        Err(FitError::UndefinedClosestPoint)
    }
}

/// Signed radial distance of each point from the circle.
#[must_use]
pub fn circle_residuals(points: &[(f64, f64)], circle: &FittedCircle) -> Vec<f64> {
    points
        .iter()
        .map(|&(x, y)| (x - circle.x0).hypot(y - circle.y0) - circle.radius)
        .collect()
}
