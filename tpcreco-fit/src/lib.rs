//! tpcreco-fit: Helix projection fits for TPC track seeds.
//!
//! A charged track in a solenoid projects to a circle in the bend plane and
//! to a straight line in radius versus z. This crate provides:
//! - **Line fit** - closed-form least squares of z against r
//! - **Taubin circle fit** - algebraic fit with Newton root finding
//! - **DCA** - closed-form point of the circle closest to the beam line
//! - **Seed fitter** - per-track orchestration updating position and momentum
//!
#![warn(missing_docs)]

mod circle;
mod fitter;
mod line;

pub use circle::{
    circle_residuals, closest_point_on_circle_to_origin, fit_circle_taubin, FittedCircle,
    COLLINEAR_TOLERANCE, MAX_NEWTON_ITERATIONS,
};
pub use fitter::{
    tangent_phi, wrap_angle, FitStatistics, FitterConfig, TrackFit, TrackSeedFitter,
    MIN_FIT_CLUSTERS,
};
pub use line::{fit_line, line_residuals, FittedLine};

// Re-export core track types
pub use tpcreco_core::{ClusterKey, ClusterPoint, ClusterSource, FitError, TrackCandidate};
