//! Straight-line fit of depth against radius.
#![allow(clippy::cast_precision_loss)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Line `z = a·r + b`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FittedLine {
    /// Slope `dz/dr`.
    pub a: f64,
    /// Intercept at `r = 0`.
    pub b: f64,
}

impl FittedLine {
    /// Depth predicted at radius `r`.
    #[inline]
    #[must_use]
    pub fn z_at(&self, r: f64) -> f64 {
        self.a * r + self.b
    }

    /// Dip angle `atan(a)`.
    #[inline]
    #[must_use]
    pub fn dip_angle(&self) -> f64 {
        self.a.atan()
    }

    /// Returns true if both parameters are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite()
    }
}

/// Unweighted least-squares fit of `z = a·r + b` over `(r, z)` points.
///
/// All points sharing one `r` leave the normal equations singular; the
/// result is then non-finite and callers check [`FittedLine::is_finite`].
#[must_use]
pub fn fit_line(points: &[(f64, f64)]) -> FittedLine {
    let n = points.len() as f64;
    let (mut sum_r, mut sum_z, mut sum_r2, mut sum_rz) = (0.0, 0.0, 0.0, 0.0);
    for &(r, z) in points {
        sum_r += r;
        sum_z += z;
        sum_r2 += r * r;
        sum_rz += r * z;
    }

    let denom = n * sum_r2 - sum_r * sum_r;
    FittedLine {
        a: (n * sum_rz - sum_r * sum_z) / denom,
        b: (sum_r2 * sum_z - sum_r * sum_rz) / denom,
    }
}

/// Signed distance of each point from the line in the `(r, z)` plane.
#[must_use]
pub fn line_residuals(points: &[(f64, f64)], line: &FittedLine) -> Vec<f64> {
    let norm = line.a.hypot(1.0);
    points
        .iter()
        .map(|&(r, z)| (-line.a * r + z - line.b) / norm)
        .collect()
}
