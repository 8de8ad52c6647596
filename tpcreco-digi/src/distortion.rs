//! Pluggable drift-field distortions.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Displacement of the primary ionization before drift.
///
/// Returns `(dz, drphi)`: the shift along z and along the circumference
/// for a charge created at `(r, phi, z)`. Any `Fn(f64, f64, f64) -> (f64, f64)`
/// is a model.
pub trait DistortionModel {
    /// Shift `(dz, drphi)` at `(r, phi, z)`.
    fn distort(&self, r: f64, phi: f64, z: f64) -> (f64, f64);
}

impl<F> DistortionModel for F
where
    F: Fn(f64, f64, f64) -> (f64, f64),
{
    fn distort(&self, r: f64, phi: f64, z: f64) -> (f64, f64) {
        self(r, phi, z)
    }
}

/// Identity model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoDistortion;

impl DistortionModel for NoDistortion {
    #[inline]
    fn distort(&self, _r: f64, _phi: f64, _z: f64) -> (f64, f64) {
        (0.0, 0.0)
    }
}

/// Uniform shift of every charge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantDistortion {
    /// Shift along z (cm).
    pub dz: f64,
    /// Shift along the circumference (cm).
    pub drphi: f64,
}

impl DistortionModel for ConstantDistortion {
    #[inline]
    fn distort(&self, _r: f64, _phi: f64, _z: f64) -> (f64, f64) {
        (self.dz, self.drphi)
    }
}
