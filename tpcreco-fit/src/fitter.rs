//! Per-track seed fitting: line and circle fits, DCA and momentum update.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::f64::consts::{PI, TAU};

use log::{debug, trace};
use rayon::prelude::*;
use tpcreco_core::{ClusterPoint, ClusterSource, FitError, TrackCandidate};

use crate::circle::{circle_residuals, closest_point_on_circle_to_origin, fit_circle_taubin, FittedCircle};
use crate::line::{fit_line, line_residuals, FittedLine};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fewest clusters a circle fit can be attempted with.
pub const MIN_FIT_CLUSTERS: usize = 3;

/// Fitter configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FitterConfig {
    /// Lowest layer whose clusters are used (inclusive).
    pub min_layer: u32,
    /// Highest layer whose clusters are used (inclusive).
    pub max_layer: u32,
    /// Minimum clusters after layer filtering; never below three.
    pub min_clusters: usize,
    /// Drop clusters further than this from the circle and refit once.
    pub xy_residual_cut: Option<f64>,
    /// Drop clusters further than this from the r-z line and refit once.
    pub z_residual_cut: Option<f64>,
    /// Fit the tracks of an event in parallel.
    pub parallel: bool,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            min_layer: 7,
            max_layer: 54,
            min_clusters: MIN_FIT_CLUSTERS,
            xy_residual_cut: None,
            z_residual_cut: None,
            parallel: false,
        }
    }
}

impl FitterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive layer window.
    #[must_use]
    pub fn with_layer_range(mut self, min_layer: u32, max_layer: u32) -> Self {
        self.min_layer = min_layer;
        self.max_layer = max_layer;
        self
    }

    /// Sets the minimum cluster count.
    #[must_use]
    pub fn with_min_clusters(mut self, min_clusters: usize) -> Self {
        self.min_clusters = min_clusters;
        self
    }

    /// Enables circle-residual outlier rejection.
    #[must_use]
    pub fn with_xy_residual_cut(mut self, cut: f64) -> Self {
        self.xy_residual_cut = Some(cut);
        self
    }

    /// Enables line-residual outlier rejection.
    #[must_use]
    pub fn with_z_residual_cut(mut self, cut: f64) -> Self {
        self.z_residual_cut = Some(cut);
        self
    }

    /// Sets whether to use parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn required_clusters(&self) -> usize {
        self.min_clusters.max(MIN_FIT_CLUSTERS)
    }

    fn accepts_layer(&self, layer: u32) -> bool {
        layer >= self.min_layer && layer <= self.max_layer
    }
}

/// Everything derived for one track.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackFit {
    /// z versus radius line.
    pub line: FittedLine,
    /// Bend-plane circle.
    pub circle: FittedCircle,
    /// Point of the circle closest to the origin.
    pub dca: (f64, f64),
    /// Azimuth of the momentum at the DCA.
    pub phi: f64,
    /// Dip angle `atan(a)` from the line fit.
    pub dip_angle: f64,
    /// Updated `[px, py, pz]`.
    pub momentum: [f64; 3],
    /// Clusters used in the final fit.
    pub n_clusters: usize,
    /// Distinct layers among those clusters.
    pub n_layers: usize,
}

impl TrackFit {
    /// Transverse momentum implied by the circle radius (cm) in a solenoid
    /// field of `bfield` tesla.
    #[must_use]
    pub fn circle_pt(&self, bfield: f64) -> f64 {
        0.3 * bfield * self.circle.radius * 0.01
    }
}

/// Tally of one batch of track fits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitStatistics {
    /// Tracks offered to the fitter.
    pub tracks_seen: usize,
    /// Tracks whose parameters were updated.
    pub tracks_fitted: usize,
    /// Tracks skipped for lack of clusters.
    pub skipped_too_few: usize,
    /// Tracks skipped for a degenerate fit.
    pub skipped_degenerate: usize,
}

impl FitStatistics {
    fn record(&mut self, outcome: &Result<TrackFit, FitError>) {
        self.tracks_seen += 1;
        match outcome {
            Ok(_) => self.tracks_fitted += 1,
            Err(FitError::TooFewClusters { .. }) => self.skipped_too_few += 1,
            Err(_) => self.skipped_degenerate += 1,
        }
    }
}

/// Fits track seeds against their clusters and updates them in place.
///
/// Holds no state between tracks.
#[derive(Debug, Clone, Default)]
pub struct TrackSeedFitter {
    config: FitterConfig,
}

impl TrackSeedFitter {
    /// Create with custom configuration.
    #[must_use]
    pub fn new(config: FitterConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    /// Resolves the track's clusters inside the layer window, in track order.
    pub fn track_clusters<S>(&self, track: &TrackCandidate, clusters: &S) -> Vec<ClusterPoint>
    where
        S: ClusterSource + ?Sized,
    {
        track
            .cluster_keys
            .iter()
            .filter_map(|&key| {
                let point = clusters.global_position(key);
                if point.is_none() {
                    trace!("track {}: cluster {:?} not found", track.id, key);
                }
                point
            })
            .filter(|point| self.config.accepts_layer(point.layer))
            .collect()
    }

    /// Fits ordered cluster points and derives new momentum from `pt`.
    ///
    /// # Errors
    /// Returns the reason the points cannot yield a valid track.
    pub fn fit_points(&self, points: &[ClusterPoint], pt: f64) -> Result<TrackFit, FitError> {
        let required = self.config.required_clusters();
        if points.len() < required {
            return Err(FitError::TooFewClusters {
                found: points.len(),
                required,
            });
        }

        let (mut line, mut circle) = fit_projections(points)?;
        let mut used = Cow::Borrowed(points);

        if self.config.xy_residual_cut.is_some() || self.config.z_residual_cut.is_some() {
            let kept = self.reject_outliers(points, &line, &circle);
            if kept.len() < points.len() {
                debug!(
                    "outlier rejection kept {} of {} clusters",
                    kept.len(),
                    points.len()
                );
                if kept.len() < required {
                    return Err(FitError::TooFewClusters {
                        found: kept.len(),
                        required,
                    });
                }
                (line, circle) = fit_projections(&kept)?;
                used = Cow::Owned(kept);
            }
        }

        let dca = closest_point_on_circle_to_origin(&circle)?;
        let phi = tangent_phi(&circle, dca, (used[0].x, used[0].y), (used[1].x, used[1].y));
        let dip_angle = line.dip_angle();

        let p_new = pt / dip_angle.cos();
        let momentum = [pt * phi.cos(), pt * phi.sin(), p_new * dip_angle.sin()];

        let n_layers = used.iter().map(|p| p.layer).collect::<BTreeSet<_>>().len();

        Ok(TrackFit {
            line,
            circle,
            dca,
            phi,
            dip_angle,
            momentum,
            n_clusters: used.len(),
            n_layers,
        })
    }

    /// Fits one track and, on success, moves it to the DCA with the new
    /// momentum. On error the track is left untouched.
    ///
    /// # Errors
    /// Propagates the skip reason from [`TrackSeedFitter::fit_points`].
    pub fn fit_track<S>(&self, track: &mut TrackCandidate, clusters: &S) -> Result<TrackFit, FitError>
    where
        S: ClusterSource + ?Sized,
    {
        let points = self.track_clusters(track, clusters);
        let fit = self.fit_points(&points, track.pt()).inspect_err(|err| {
            debug!("track {}: skipped, {}", track.id, err);
        })?;

        debug!(
            "track {}: {} clusters in {} layers, R {:.3} centre ({:.3}, {:.3}), z0 {:.3}",
            track.id,
            fit.n_clusters,
            fit.n_layers,
            fit.circle.radius,
            fit.circle.x0,
            fit.circle.y0,
            fit.line.b
        );
        trace!(
            "track {}: phi {:.4} -> {:.4}, momentum {:?} -> {:?}",
            track.id,
            track.phi(),
            fit.phi,
            track.momentum,
            fit.momentum
        );

        track.position = [fit.dca.0, fit.dca.1, fit.line.b];
        track.momentum = fit.momentum;
        Ok(fit)
    }

    /// Fits every track of an event, skipping the ones that fail.
    pub fn fit_tracks<S>(&self, tracks: &mut [TrackCandidate], clusters: &S) -> FitStatistics
    where
        S: ClusterSource + ?Sized,
    {
        let outcomes: Vec<Result<TrackFit, FitError>> = if self.config.parallel {
            tracks
                .par_iter_mut()
                .map(|track| self.fit_track(track, clusters))
                .collect()
        } else {
            tracks
                .iter_mut()
                .map(|track| self.fit_track(track, clusters))
                .collect()
        };

        let mut stats = FitStatistics::default();
        for outcome in &outcomes {
            stats.record(outcome);
        }
        debug!(
            "fitted {} of {} tracks ({} too few clusters, {} degenerate)",
            stats.tracks_fitted, stats.tracks_seen, stats.skipped_too_few, stats.skipped_degenerate
        );
        stats
    }

    fn reject_outliers(
        &self,
        points: &[ClusterPoint],
        line: &FittedLine,
        circle: &FittedCircle,
    ) -> Vec<ClusterPoint> {
        let (rz, xy) = projections(points);
        let xy_res = circle_residuals(&xy, circle);
        let z_res = line_residuals(&rz, line);
        points
            .iter()
            .zip(xy_res.iter().zip(&z_res))
            .filter(|(_, (dxy, dz))| {
                self.config.xy_residual_cut.map_or(true, |cut| dxy.abs() <= cut)
                    && self.config.z_residual_cut.map_or(true, |cut| dz.abs() <= cut)
            })
            .map(|(point, _)| *point)
            .collect()
    }
}

fn projections(points: &[ClusterPoint]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    points
        .iter()
        .map(|p| ((p.radius(), p.z), (p.x, p.y)))
        .unzip()
}

fn fit_projections(points: &[ClusterPoint]) -> Result<(FittedLine, FittedCircle), FitError> {
    let (rz, xy) = projections(points);
    let line = fit_line(&rz);
    if !line.is_finite() {
        return Err(FitError::DegenerateLine);
    }
    let circle = fit_circle_taubin(&xy);
    if !circle.is_finite() {
        return Err(FitError::DegenerateCircle);
    }
    Ok((line, circle))
}

/// Azimuth of the track direction at `dca`.
///
/// The tangent to the circle is ambiguous by π; the sign of the angular
/// step from `first` to `second` around the centre picks the branch, so
/// reversing the point order reverses the direction.
#[must_use]
pub fn tangent_phi(circle: &FittedCircle, dca: (f64, f64), first: (f64, f64), second: (f64, f64)) -> f64 {
    let dx = circle.x0 - dca.0;
    let dy = circle.y0 - dca.1;
    let mut phi = (-dx).atan2(dy);

    let phi0 = (first.1 - circle.y0).atan2(first.0 - circle.x0);
    let phi1 = (second.1 - circle.y0).atan2(second.0 - circle.x0);
    let dphi = wrap_angle(phi1 - phi0);

    if dphi < 0.0 {
        phi += PI;
        if phi > PI {
            phi -= TAU;
        }
    }
    phi
}

/// Wraps an angle difference into `(-π, π]`.
#[must_use]
pub fn wrap_angle(mut dphi: f64) -> f64 {
    if dphi > PI {
        dphi -= TAU;
    }
    if dphi <= -PI {
        dphi += TAU;
    }
    dphi
}
