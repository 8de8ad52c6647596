//! Per-hit charge transport and spreading into readout cells.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::f64::consts::{PI, TAU};
use std::ops::Range;

use log::{debug, trace, warn};
use tpcreco_core::{
    CellAccumulator, CellGeometry, CellKey, CylinderLayer, Error, LayerBinGrid, RawHit, Result,
};

use crate::config::{DigitizerConfig, SPEED_OF_LIGHT_CM_PER_NS};
use crate::diagnostics::{Diagnostics, NoDiagnostics};
use crate::distortion::{DistortionModel, NoDistortion};
use crate::random::{RandomStream, SeededStream};
use crate::spread::{
    phi_fraction, segment_count, segment_offset, window_half_width, z_fraction, CloudWidths,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What happened to one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Charge was added; `cells` counts the contributions.
    Deposited {
        /// Number of cell contributions.
        cells: usize,
    },
    /// The hit lies outside the integration window.
    OutsideTimeWindow,
    /// The corrected position falls outside the bin grid.
    OutOfRange,
    /// Neither ionization nor deposited energy is positive.
    NoIonization,
}

/// Tally of hits processed by [`Digitizer::digitize_event`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitizationStatistics {
    /// Hits offered to the digitizer.
    pub hits_seen: usize,
    /// Hits that contributed charge.
    pub hits_deposited: usize,
    /// Hits outside the integration window.
    pub outside_time_window: usize,
    /// Hits dropped by binning.
    pub out_of_range: usize,
    /// Hits without usable energy.
    pub no_ionization: usize,
    /// Cell contributions added.
    pub cell_contributions: usize,
}

impl DigitizationStatistics {
    /// Counts one outcome.
    pub fn record(&mut self, outcome: HitOutcome) {
        self.hits_seen += 1;
        match outcome {
            HitOutcome::Deposited { cells } => {
                self.hits_deposited += 1;
                self.cell_contributions += cells;
            }
            HitOutcome::OutsideTimeWindow => self.outside_time_window += 1,
            HitOutcome::OutOfRange => self.out_of_range += 1,
            HitOutcome::NoIonization => self.no_ionization += 1,
        }
    }

    /// Hits that were dropped for any reason.
    #[must_use]
    pub fn hits_dropped(&self) -> usize {
        self.outside_time_window + self.out_of_range + self.no_ionization
    }
}

/// Turns raw energy deposits into cell contents.
///
/// Owns the run-scoped state: configuration, bin grids, the random stream
/// and the distortion model. The per-event [`CellAccumulator`] belongs to
/// the caller.
#[derive(Debug)]
pub struct Digitizer<R = SeededStream, D = NoDistortion> {
    config: DigitizerConfig,
    geometry: CellGeometry,
    rng: R,
    distortion: D,
}

impl Digitizer {
    /// Builds the bin grids of `layers` and a seeded random stream.
    ///
    /// # Errors
    /// Returns an error for an invalid configuration, a layer without a
    /// cell size, or a layer exceeding the cell limit.
    pub fn new(config: DigitizerConfig, layers: &[CylinderLayer], seed: u64) -> Result<Self> {
        let geometry = CellGeometry::build(layers, &config.cell_sizes, config.cell_limit)?;
        Self::from_parts(config, geometry, SeededStream::new(seed), NoDistortion)
    }
}

impl<R: RandomStream, D: DistortionModel> Digitizer<R, D> {
    /// Assembles a digitizer from prebuilt parts.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn from_parts(config: DigitizerConfig, geometry: CellGeometry, rng: R, distortion: D) -> Result<Self> {
        config.validate()?;
        for grid in geometry.iter() {
            debug!(
                "layer {}: r {:.3}, {} phi bins of {:.5} rad, {} z bins of {:.4} cm from {:.2}",
                grid.layer, grid.radius, grid.phi_bins, grid.phi_step, grid.z_bins, grid.z_step, grid.z_min
            );
        }
        Ok(Self {
            config,
            geometry,
            rng,
            distortion,
        })
    }

    /// Replaces the distortion model.
    #[must_use]
    pub fn with_distortion<D2: DistortionModel>(self, distortion: D2) -> Digitizer<R, D2> {
        Digitizer {
            config: self.config,
            geometry: self.geometry,
            rng: self.rng,
            distortion,
        }
    }

    /// Replaces the random stream.
    #[must_use]
    pub fn with_random_stream<R2: RandomStream>(self, rng: R2) -> Digitizer<R2, D> {
        Digitizer {
            config: self.config,
            geometry: self.geometry,
            rng,
            distortion: self.distortion,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DigitizerConfig {
        &self.config
    }

    /// Bin grids of all layers.
    #[must_use]
    pub fn geometry(&self) -> &CellGeometry {
        &self.geometry
    }

    /// Digitizes every hit of an event into `cells`.
    ///
    /// # Errors
    /// Returns [`Error::MissingLayerGeometry`] for a hit in a layer without
    /// a bin grid. Hits already processed keep their contributions.
    pub fn digitize_event(&mut self, hits: &[RawHit], cells: &mut CellAccumulator) -> Result<DigitizationStatistics> {
        self.digitize_event_with(hits, cells, &mut NoDiagnostics)
    }

    /// [`Digitizer::digitize_event`] reporting to a diagnostics sink.
    ///
    /// # Errors
    /// See [`Digitizer::digitize_event`].
    pub fn digitize_event_with(
        &mut self,
        hits: &[RawHit],
        cells: &mut CellAccumulator,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<DigitizationStatistics> {
        let mut stats = DigitizationStatistics::default();
        for hit in hits {
            let outcome = self.digitize_hit(hit, cells, diagnostics)?;
            stats.record(outcome);
        }
        debug!(
            "digitized {} of {} hits into {} cells ({} contributions, {} dropped)",
            stats.hits_deposited,
            stats.hits_seen,
            cells.len(),
            stats.cell_contributions,
            stats.hits_dropped()
        );
        Ok(stats)
    }

    /// Digitizes one hit.
    ///
    /// # Errors
    /// Returns [`Error::MissingLayerGeometry`] if the hit's layer has no
    /// bin grid. Dropped hits are reported through [`HitOutcome`].
    pub fn digitize_hit(
        &mut self,
        hit: &RawHit,
        cells: &mut CellAccumulator,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<HitOutcome> {
        let Self {
            config,
            geometry,
            rng,
            distortion,
        } = self;
        let grid = geometry
            .layer(hit.layer)
            .ok_or(Error::MissingLayerGeometry(hit.layer))?;

        if let Some((start, end)) = config.integration_window {
            if hit.t_entry > end || hit.t_exit < start {
                trace!("hit {:?}: outside integration window", hit.id);
                return Ok(HitOutcome::OutsideTimeWindow);
            }
        }

        if config.is_pixel_layer(hit.layer) {
            return Ok(deposit_direct(hit, grid, cells, diagnostics));
        }

        let mut transport = Transport {
            config: &*config,
            grid,
            rng,
            cells,
            diagnostics,
        };
        Ok(transport.drift_and_spread(hit, &*distortion))
    }
}

/// Pixel and strip layers: the whole deposit goes into one cell.
fn deposit_direct(
    hit: &RawHit,
    grid: &LayerBinGrid,
    cells: &mut CellAccumulator,
    diagnostics: &mut dyn Diagnostics,
) -> HitOutcome {
    let [x, y, z] = hit.avg_position();
    let (Some(phi_bin), Some(z_bin)) = (grid.phi_bin(y.atan2(x)), grid.z_bin(z)) else {
        trace!("hit {:?}: outside layer {} grid", hit.id, hit.layer);
        return HitOutcome::OutOfRange;
    };
    diagnostics.edep(hit.layer, z, hit.edep);

    let key = CellKey::new(hit.layer, z_bin as u32, phi_bin as u32);
    cells.deposit(key, hit.id, hit.shower_id, hit.edep, hit.eion);
    diagnostics.cell_filled(key, hit.edep);
    HitOutcome::Deposited { cells: 1 }
}

/// Borrowed state for spreading one gas-layer hit.
struct Transport<'a, R> {
    config: &'a DigitizerConfig,
    grid: &'a LayerBinGrid,
    rng: &'a mut R,
    cells: &'a mut CellAccumulator,
    diagnostics: &'a mut dyn Diagnostics,
}

impl<R: RandomStream> Transport<'_, R> {
    fn drift_and_spread<D: DistortionModel + ?Sized>(&mut self, hit: &RawHit, distortion: &D) -> HitOutcome {
        let config = self.config;
        let grid = self.grid;
        let [x, y, avg_z] = hit.avg_position();
        let r = x.hypot(y);
        let mut phi = y.atan2(x);
        let mut z = avg_z;

        let (dz, drphi) = distortion.distort(r, phi, z);
        phi = wrap_phi(phi + drphi / r);
        z += dz;

        let path_length = (x * x + y * y + avg_z * avg_z).sqrt();
        let drift_shift = config.drift_velocity * (hit.avg_t() - path_length / SPEED_OF_LIGHT_CM_PER_NS);
        if z >= 0.0 {
            z -= drift_shift;
        } else {
            z += drift_shift;
        }

        if grid.phi_bin(phi).is_none() || grid.z_bin(z).is_none() {
            trace!("hit {:?}: corrected position ({phi:.4}, {z:.3}) off layer {}", hit.id, hit.layer);
            return HitOutcome::OutOfRange;
        }
        self.diagnostics.edep(hit.layer, z, hit.edep);

        let Some(eion) = ionization_energy(hit) else {
            trace!("hit {:?}: no ionization energy", hit.id);
            return HitOutcome::NoIonization;
        };
        let electrons = self.rng.poisson(config.electrons_per_gev * eion);
        self.diagnostics.electrons_generated(hit.layer, electrons);

        let cloud = CloudWidths::after_drift(config, avg_z);
        phi = wrap_phi(phi + config.rphi_smear_fraction * self.rng.gaussian(cloud.rphi) / r);
        z += config.z_smear_fraction * self.rng.gaussian(cloud.z_lead);

        let (Some(phi_bin), Some(_)) = (grid.phi_bin(phi), grid.z_bin(z)) else {
            trace!("hit {:?}: smeared off layer {}", hit.id, hit.layer);
            return HitOutcome::OutOfRange;
        };
        let phi_disp = phi - grid.phi_center(phi_bin);
        let cloud = cloud.widened(config.rphi_smear_fraction, config.z_smear_fraction);
        self.diagnostics.cloud_size(hit.layer, z, cloud.rphi, cloud.z_lead);

        let z_range = hit.z_extent();
        let nseg = segment_count(z_range, cloud.z_lead, config.segment_sigma_scale);
        let share = config.avalanche_gain / nseg as f64 * electrons;

        let n_phi = window_half_width(config.window_sigmas * cloud.rphi, r * grid.phi_step);
        let n_z = window_half_width(config.window_sigmas * cloud.z_mean(), grid.z_step);
        self.diagnostics.window_size(hit.layer, z, n_phi, n_z);

        let phi_weights: Vec<(usize, f64)> = phi_window(grid, phi_bin, n_phi)
            .map(|(offset, bin)| (bin, phi_fraction(offset, grid.phi_step, r, phi_disp, cloud.rphi)))
            .collect();
        let allowed_z = drift_half(grid.z_bins, avg_z);

        trace!(
            "hit {:?}: {electrons} electrons, {nseg} segments, window ±{n_phi} x ±{n_z}, sigma ({:.4}, {:.4}/{:.4})",
            hit.id,
            cloud.rphi,
            cloud.z_lead,
            cloud.z_tail
        );

        let mut contributions = 0;
        let mut z_weights = Vec::with_capacity(2 * n_z + 1);
        for segment in 0..nseg {
            let z_seg = z + segment_offset(segment, nseg, z_range);
            let Some(z_bin) = grid.z_bin(z_seg) else {
                continue;
            };
            let z_disp = z_seg - grid.z_center(z_bin);

            z_weights.clear();
            for offset in -(n_z as i64)..=(n_z as i64) {
                let bin = z_bin as i64 + offset;
                if bin < allowed_z.start as i64 || bin >= allowed_z.end as i64 {
                    continue;
                }
                z_weights.push((bin as usize, z_fraction(offset, grid.z_step, z_disp, &cloud)));
            }

            for &(phi_bin, phi_weight) in &phi_weights {
                for &(z_bin, z_weight) in &z_weights {
                    let amount = share * phi_weight * z_weight + config.electron_pedestal;
                    if amount < 0.0 {
                        continue;
                    }
                    let key = CellKey::new(hit.layer, z_bin as u32, phi_bin as u32);
                    self.cells.deposit(key, hit.id, hit.shower_id, amount, hit.eion);
                    self.diagnostics.cell_filled(key, amount);
                    contributions += 1;
                }
            }
        }

        if contributions == 0 {
            trace!("hit {:?}: no contribution landed on layer {}", hit.id, hit.layer);
            return HitOutcome::OutOfRange;
        }
        HitOutcome::Deposited {
            cells: contributions,
        }
    }
}

/// Energy converted to electrons: the ionization energy when it is finite
/// and positive, the total deposit otherwise. `None` if that is not
/// positive either.
fn ionization_energy(hit: &RawHit) -> Option<f64> {
    let eion = match hit.eion {
        Some(eion) if eion.is_finite() && eion > 0.0 => eion,
        _ => hit.edep,
    };
    (eion > 0.0).then_some(eion)
}

/// z bins on the same side of the central membrane as `z`.
fn drift_half(z_bins: usize, z: f64) -> Range<usize> {
    if z > 0.0 {
        z_bins / 2..z_bins
    } else {
        0..z_bins / 2
    }
}

/// Candidate azimuthal bins around `centre` as `(offset, bin)`, wrapping
/// once around the ring.
fn phi_window(grid: &LayerBinGrid, centre: usize, half_width: usize) -> impl Iterator<Item = (i64, usize)> + '_ {
    let bins = grid.phi_bins as i64;
    let half = half_width as i64;
    let skipped = unfoldable_offsets(bins, centre as i64, half);
    if skipped > 0 {
        warn!(
            "layer {}: phi window of ±{half} bins wraps more than once around {bins} bins, skipping {skipped} offsets",
            grid.layer
        );
    }
    (-half..=half).filter_map(move |offset| {
        let mut bin = centre as i64 + offset;
        if bin < 0 {
            bin += bins;
        } else if bin >= bins {
            bin -= bins;
        }
        (0..bins).contains(&bin).then_some((offset, bin as usize))
    })
}

/// Offsets of the window `centre ± half` that a single wrap cannot bring
/// back into `[0, bins)`.
fn unfoldable_offsets(bins: i64, centre: i64, half: i64) -> i64 {
    let below = (-bins - (centre - half)).max(0);
    let above = (centre + half - (2 * bins - 1)).max(0);
    below + above
}

/// Folds an angle into `[-π, π)`.
fn wrap_phi(phi: f64) -> f64 {
    if (-PI..PI).contains(&phi) {
        phi
    } else {
        phi - TAU * ((phi + PI) / TAU).floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(phi_bins: usize, z_bins: usize) -> LayerBinGrid {
        LayerBinGrid {
            layer: 10,
            radius: 40.0,
            thickness: 1.0,
            phi_bins,
            phi_step: TAU / phi_bins as f64,
            phi_min: -PI,
            z_bins,
            z_min: -50.0,
            z_step: 100.0 / z_bins as f64,
        }
    }

    #[test]
    fn test_ionization_fallback() {
        let hit = RawHit::point(1, 10, [40.0, 0.0, 1.0], 0.0, 2e-6);
        assert_eq!(ionization_energy(&hit), Some(2e-6));
        assert_eq!(ionization_energy(&hit.with_eion(1e-6)), Some(1e-6));
        assert_eq!(ionization_energy(&hit.with_eion(f64::NAN)), Some(2e-6));
        assert_eq!(ionization_energy(&hit.with_eion(0.0)), Some(2e-6));
        assert_eq!(ionization_energy(&hit.with_eion(-1e-6)), Some(2e-6));

        let empty = RawHit::point(2, 10, [40.0, 0.0, 1.0], 0.0, 0.0);
        assert_eq!(ionization_energy(&empty), None);
        assert_eq!(ionization_energy(&empty.with_eion(f64::INFINITY)), None);
    }

    #[test]
    fn test_drift_half() {
        assert_eq!(drift_half(10, 3.0), 5..10);
        assert_eq!(drift_half(10, -3.0), 0..5);
        assert_eq!(drift_half(10, 0.0), 0..5);
        assert_eq!(drift_half(7, 1.0), 3..7);
    }

    #[test]
    fn test_phi_window_wraps_once() {
        let grid = grid(8, 10);
        let bins: Vec<usize> = phi_window(&grid, 0, 2).map(|(_, bin)| bin).collect();
        assert_eq!(bins, vec![6, 7, 0, 1, 2]);

        let bins: Vec<usize> = phi_window(&grid, 7, 1).map(|(_, bin)| bin).collect();
        assert_eq!(bins, vec![6, 7, 0]);

        // A window wider than two turns loses the offsets that cannot be
        // folded back with one wrap.
        let wide: Vec<(i64, usize)> = phi_window(&grid, 0, 20).collect();
        assert!(wide.iter().all(|&(offset, _)| (-8..16).contains(&offset)));
        assert_eq!(wide.len(), 24);
    }

    #[test]
    fn test_unfoldable_offsets_counted_once() {
        assert_eq!(unfoldable_offsets(8, 0, 2), 0);
        assert_eq!(unfoldable_offsets(8, 7, 8), 0);
        assert_eq!(unfoldable_offsets(8, 0, 20), 17);
        assert_eq!(unfoldable_offsets(8, 7, 9), 1);

        let grid = grid(8, 10);
        for (centre, half) in [(0, 20), (3, 11), (7, 9)] {
            let kept = phi_window(&grid, centre, half).count() as i64;
            let skipped = unfoldable_offsets(8, centre as i64, half as i64);
            assert_eq!(kept + skipped, 2 * half as i64 + 1);
        }
    }

    #[test]
    fn test_wrap_phi() {
        assert_abs_diff_eq!(wrap_phi(0.5), 0.5);
        assert_abs_diff_eq!(wrap_phi(PI), -PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_phi(PI + 0.25), -PI + 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_phi(-PI - 0.25), PI - 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_phi(5.0 * TAU + 1.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_statistics_record() {
        let mut stats = DigitizationStatistics::default();
        stats.record(HitOutcome::Deposited { cells: 12 });
        stats.record(HitOutcome::Deposited { cells: 3 });
        stats.record(HitOutcome::OutOfRange);
        stats.record(HitOutcome::NoIonization);
        stats.record(HitOutcome::OutsideTimeWindow);

        assert_eq!(stats.hits_seen, 5);
        assert_eq!(stats.hits_deposited, 2);
        assert_eq!(stats.cell_contributions, 15);
        assert_eq!(stats.hits_dropped(), 3);
    }

    #[test]
    fn test_missing_layer_geometry_is_fatal() {
        let config = DigitizerConfig::new().with_cell_size(10, 0.5, 0.5);
        let layers = [CylinderLayer::new(10, 40.0, 1.0, -50.0, 50.0)];
        let mut digitizer = Digitizer::new(config, &layers, 1).unwrap();
        let mut cells = CellAccumulator::new();

        let hit = RawHit::point(4, 11, [41.0, 0.0, 2.0], 1.0, 1e-6);
        let err = digitizer
            .digitize_hit(&hit, &mut cells, &mut NoDiagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::MissingLayerGeometry(11)));
        assert!(cells.is_empty());
    }
}
