//! Observation hooks for the digitizer.
//!
//! Every method defaults to a no-op; implementors pick what they record.
//! Nothing returned from here feeds back into the charge model.
#![allow(clippy::cast_precision_loss)]

use tpcreco_core::CellKey;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sink for per-hit quantities of the charge model.
pub trait Diagnostics {
    /// Energy of a hit that passed binning, at its corrected `z`.
    fn edep(&mut self, _layer: u32, _z: f64, _edep: f64) {}

    /// Electrons drawn for a gas-layer hit.
    fn electrons_generated(&mut self, _layer: u32, _electrons: f64) {}

    /// Cloud widths after smearing.
    fn cloud_size(&mut self, _layer: u32, _z: f64, _sigma_rphi: f64, _sigma_z: f64) {}

    /// Half-widths of the candidate-bin window.
    fn window_size(&mut self, _layer: u32, _z: f64, _n_phi: usize, _n_z: usize) {}

    /// One contribution added to a cell.
    fn cell_filled(&mut self, _key: CellKey, _amount: f64) {}
}

/// Records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {}

/// Running sums over an event or a run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiagnosticTotals {
    /// Hits that passed binning.
    pub hits: usize,
    /// Summed deposited energy of those hits.
    pub edep: f64,
    /// Summed electron draws.
    pub electrons: f64,
    /// Summed transverse cloud width, for the mean.
    pub sigma_rphi_sum: f64,
    /// Summed leading longitudinal cloud width, for the mean.
    pub sigma_z_sum: f64,
    /// Number of cloud-width samples.
    pub clouds: usize,
    /// Widest azimuthal window seen.
    pub max_window_phi: usize,
    /// Widest z window seen.
    pub max_window_z: usize,
    /// Cell contributions.
    pub fills: usize,
    /// Summed contributions.
    pub charge: f64,
}

impl DiagnosticTotals {
    /// Mean transverse cloud width, if any cloud was seen.
    #[must_use]
    pub fn mean_sigma_rphi(&self) -> Option<f64> {
        (self.clouds > 0).then(|| self.sigma_rphi_sum / self.clouds as f64)
    }

    /// Mean leading longitudinal cloud width, if any cloud was seen.
    #[must_use]
    pub fn mean_sigma_z(&self) -> Option<f64> {
        (self.clouds > 0).then(|| self.sigma_z_sum / self.clouds as f64)
    }
}

impl Diagnostics for DiagnosticTotals {
    fn edep(&mut self, _layer: u32, _z: f64, edep: f64) {
        self.hits += 1;
        self.edep += edep;
    }

    fn electrons_generated(&mut self, _layer: u32, electrons: f64) {
        self.electrons += electrons;
    }

    fn cloud_size(&mut self, _layer: u32, _z: f64, sigma_rphi: f64, sigma_z: f64) {
        self.clouds += 1;
        self.sigma_rphi_sum += sigma_rphi;
        self.sigma_z_sum += sigma_z;
    }

    fn window_size(&mut self, _layer: u32, _z: f64, n_phi: usize, n_z: usize) {
        self.max_window_phi = self.max_window_phi.max(n_phi);
        self.max_window_z = self.max_window_z.max(n_z);
    }

    fn cell_filled(&mut self, _key: CellKey, amount: f64) {
        self.fills += 1;
        self.charge += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_totals_accumulate() {
        let mut totals = DiagnosticTotals::default();
        assert_eq!(totals.mean_sigma_rphi(), None);

        totals.edep(5, 1.0, 2e-6);
        totals.cloud_size(5, 1.0, 0.1, 0.2);
        totals.cloud_size(5, 1.0, 0.3, 0.4);
        totals.window_size(5, 1.0, 4, 2);
        totals.window_size(5, 1.0, 3, 6);
        totals.cell_filled(CellKey::new(5, 1, 1), 10.0);

        assert_eq!(totals.hits, 1);
        assert_relative_eq!(totals.mean_sigma_rphi().unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(totals.mean_sigma_z().unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!((totals.max_window_phi, totals.max_window_z), (4, 6));
        assert_eq!(totals.fills, 1);
    }
}
