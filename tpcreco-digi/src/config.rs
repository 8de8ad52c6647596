//! Digitizer configuration.

use std::collections::BTreeMap;

use tpcreco_core::{CellSize, Error, Result, DEFAULT_CELL_LIMIT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Speed of light (cm/ns).
pub const SPEED_OF_LIGHT_CM_PER_NS: f64 = 29.979_245_8;

/// Parameters of the drift, diffusion, shaping and binning model.
///
/// Lengths are in cm, times in ns, energies in GeV.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DigitizerConfig {
    /// Layers below this index deposit energy directly into one cell.
    pub num_pixel_layers: u32,
    /// Drift length from the central membrane to the readout.
    pub half_length: f64,
    /// Transverse diffusion constant (cm/√cm).
    pub diffusion_transverse: f64,
    /// Longitudinal diffusion constant (cm/√cm).
    pub diffusion_longitudinal: f64,
    /// Charge spread of the amplification stage.
    pub gem_spread: f64,
    /// Width of the leading edge of the shaping response.
    pub shaping_lead: f64,
    /// Width of the tail of the shaping response.
    pub shaping_tail: f64,
    /// Electrons produced per GeV of ionization energy.
    pub electrons_per_gev: f64,
    /// Electron drift velocity (cm/ns).
    pub drift_velocity: f64,
    /// Random r-phi displacement in units of the transverse cloud width.
    pub rphi_smear_fraction: f64,
    /// Random z displacement in units of the leading longitudinal width.
    pub z_smear_fraction: f64,
    /// Half-width of the candidate-bin window, in cloud sigmas.
    pub window_sigmas: f64,
    /// Longitudinal segment length in leading cloud sigmas.
    pub segment_sigma_scale: f64,
    /// Charge multiplication applied to each electron.
    pub avalanche_gain: f64,
    /// Constant added to every candidate-bin contribution.
    pub electron_pedestal: f64,
    /// Hits entirely outside `(start, end)` are not read out.
    pub integration_window: Option<(f64, f64)>,
    /// Ceiling on `phi_bins * z_bins` per layer.
    pub cell_limit: u64,
    /// Target cell size per layer.
    pub cell_sizes: BTreeMap<u32, CellSize>,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            num_pixel_layers: 3,
            half_length: 100.0,
            diffusion_transverse: 0.0057,
            diffusion_longitudinal: 0.0057,
            gem_spread: 0.04,        // 400 um
            shaping_lead: 0.096,     // 32 ns at 3 um/ns
            shaping_tail: 0.144,     // 48 ns at 3 um/ns
            electrons_per_gev: 38e6, // ~26 eV per pair
            drift_velocity: 0.003,
            rphi_smear_fraction: 0.0,
            z_smear_fraction: 0.0,
            window_sigmas: 3.0,
            segment_sigma_scale: 1.0,
            avalanche_gain: 2000.0,
            electron_pedestal: 0.0,
            integration_window: Some((0.0, 60.0)),
            cell_limit: DEFAULT_CELL_LIMIT,
            cell_sizes: BTreeMap::new(),
        }
    }
}

impl DigitizerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of pixel layers.
    #[must_use]
    pub fn with_num_pixel_layers(mut self, layers: u32) -> Self {
        self.num_pixel_layers = layers;
        self
    }

    /// Sets the drift half length.
    #[must_use]
    pub fn with_half_length(mut self, half_length: f64) -> Self {
        self.half_length = half_length;
        self
    }

    /// Sets transverse and longitudinal diffusion.
    #[must_use]
    pub fn with_diffusion(mut self, transverse: f64, longitudinal: f64) -> Self {
        self.diffusion_transverse = transverse;
        self.diffusion_longitudinal = longitudinal;
        self
    }

    /// Sets the amplification-stage spread.
    #[must_use]
    pub fn with_gem_spread(mut self, spread: f64) -> Self {
        self.gem_spread = spread;
        self
    }

    /// Sets the leading and tail shaping widths.
    #[must_use]
    pub fn with_shaping(mut self, lead: f64, tail: f64) -> Self {
        self.shaping_lead = lead;
        self.shaping_tail = tail;
        self
    }

    /// Sets the electron yield per GeV.
    #[must_use]
    pub fn with_electrons_per_gev(mut self, electrons: f64) -> Self {
        self.electrons_per_gev = electrons;
        self
    }

    /// Sets the drift velocity.
    #[must_use]
    pub fn with_drift_velocity(mut self, velocity: f64) -> Self {
        self.drift_velocity = velocity;
        self
    }

    /// Sets the positional smear fractions.
    #[must_use]
    pub fn with_smear(mut self, rphi_fraction: f64, z_fraction: f64) -> Self {
        self.rphi_smear_fraction = rphi_fraction;
        self.z_smear_fraction = z_fraction;
        self
    }

    /// Sets the window half-width in sigmas.
    #[must_use]
    pub fn with_window_sigmas(mut self, sigmas: f64) -> Self {
        self.window_sigmas = sigmas;
        self
    }

    /// Sets the segment length scale.
    #[must_use]
    pub fn with_segment_sigma_scale(mut self, scale: f64) -> Self {
        self.segment_sigma_scale = scale;
        self
    }

    /// Sets the avalanche gain.
    #[must_use]
    pub fn with_avalanche_gain(mut self, gain: f64) -> Self {
        self.avalanche_gain = gain;
        self
    }

    /// Sets the per-bin electron pedestal.
    #[must_use]
    pub fn with_electron_pedestal(mut self, pedestal: f64) -> Self {
        self.electron_pedestal = pedestal;
        self
    }

    /// Sets the integration window, or disables the timing cut with `None`.
    #[must_use]
    pub fn with_integration_window(mut self, window: Option<(f64, f64)>) -> Self {
        self.integration_window = window;
        self
    }

    /// Sets the per-layer cell ceiling.
    #[must_use]
    pub fn with_cell_limit(mut self, limit: u64) -> Self {
        self.cell_limit = limit;
        self
    }

    /// Sets the target cell size of one layer.
    #[must_use]
    pub fn with_cell_size(mut self, layer: u32, size_rphi: f64, size_z: f64) -> Self {
        self.cell_sizes.insert(layer, CellSize::new(size_rphi, size_z));
        self
    }

    /// Returns true for layers read out without charge spreading.
    #[inline]
    #[must_use]
    pub fn is_pixel_layer(&self, layer: u32) -> bool {
        layer < self.num_pixel_layers
    }

    /// Checks that the model parameters are usable.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("half_length", self.half_length),
            ("diffusion_transverse", self.diffusion_transverse),
            ("diffusion_longitudinal", self.diffusion_longitudinal),
            ("electrons_per_gev", self.electrons_per_gev),
            ("drift_velocity", self.drift_velocity),
            ("rphi_smear_fraction", self.rphi_smear_fraction),
            ("z_smear_fraction", self.z_smear_fraction),
            ("avalanche_gain", self.avalanche_gain),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!("{name} must be finite and >= 0, got {value}")));
            }
        }

        // Widths divide the window limits, so they must be strictly positive.
        let positive = [
            ("gem_spread", self.gem_spread),
            ("shaping_lead", self.shaping_lead),
            ("shaping_tail", self.shaping_tail),
            ("window_sigmas", self.window_sigmas),
            ("segment_sigma_scale", self.segment_sigma_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be finite and > 0, got {value}")));
            }
        }

        if !self.electron_pedestal.is_finite() {
            return Err(Error::Config("electron_pedestal must be finite".into()));
        }
        if let Some((start, end)) = self.integration_window {
            if !(start <= end) {
                return Err(Error::Config(format!(
                    "integration window start {start} is after end {end}"
                )));
            }
        }
        Ok(())
    }
}
