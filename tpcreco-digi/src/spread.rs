//! Charge-cloud widths and Gaussian-integral bin weights.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::f64::consts::FRAC_1_SQRT_2;

use statrs::function::erf::erf;

use crate::config::DigitizerConfig;

/// Widths of the charge cloud arriving at the readout (cm).
///
/// The longitudinal profile is two half-Gaussians: `z_lead` on the low-z
/// side of the centroid, `z_tail` on the high-z side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudWidths {
    /// Transverse width along the circumference.
    pub rphi: f64,
    /// Longitudinal width of the leading edge.
    pub z_lead: f64,
    /// Longitudinal width of the tail.
    pub z_tail: f64,
}

impl CloudWidths {
    /// Widths after drifting from `z` to the readout.
    #[must_use]
    pub fn after_drift(config: &DigitizerConfig, z: f64) -> Self {
        let drift = (config.half_length - z.abs()).max(0.0);
        let dt2 = config.diffusion_transverse * config.diffusion_transverse * drift;
        let dl2 = config.diffusion_longitudinal * config.diffusion_longitudinal * drift;
        Self {
            rphi: (dt2 + config.gem_spread * config.gem_spread).sqrt(),
            z_lead: (dl2 + config.shaping_lead * config.shaping_lead).sqrt(),
            z_tail: (dl2 + config.shaping_tail * config.shaping_tail).sqrt(),
        }
    }

    /// Widens the cloud to absorb a positional smear.
    #[must_use]
    pub fn widened(self, rphi_fraction: f64, z_fraction: f64) -> Self {
        Self {
            rphi: self.rphi * (1.0 + rphi_fraction),
            z_lead: self.z_lead * (1.0 + z_fraction),
            z_tail: self.z_tail * (1.0 + z_fraction),
        }
    }

    /// Mean of the two longitudinal widths.
    #[inline]
    #[must_use]
    pub fn z_mean(&self) -> f64 {
        0.5 * (self.z_lead + self.z_tail)
    }
}

/// Number of bins either side of the centre needed to cover `extent`.
///
/// Always at least one.
#[must_use]
pub fn window_half_width(extent: f64, step: f64) -> usize {
    let n = extent / step + 1.0;
    if n.is_finite() {
        n.max(1.0) as usize
    } else {
        1
    }
}

/// Odd number of longitudinal segments for a track crossing `z_range`.
///
/// `trunc(z_range / (scale·sigma))`, bumped to the next odd number.
#[must_use]
pub fn segment_count(z_range: f64, sigma: f64, scale: f64) -> usize {
    let ratio = z_range / (scale * sigma);
    let n = if ratio.is_finite() && ratio > 0.0 {
        ratio as usize
    } else {
        0
    };
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Offset of segment `index` from the centre of the deposit.
///
/// Segments are spaced `z_range / nseg` apart, symmetric about zero.
#[must_use]
pub fn segment_offset(index: usize, nseg: usize, z_range: f64) -> f64 {
    (index as f64 - (nseg / 2) as f64) * z_range / nseg as f64
}

/// Probability mass of a centred Gaussian of width `sigma` in `[lo, hi]`.
#[inline]
#[must_use]
pub fn gaussian_fraction(lo: f64, hi: f64, sigma: f64) -> f64 {
    let scale = FRAC_1_SQRT_2 / sigma;
    0.5 * (erf(hi * scale) - erf(lo * scale))
}

/// Fraction of the cloud falling in the azimuthal bin `offset` steps from
/// the centre bin.
///
/// `displacement` is the centroid's angular offset from the centre of its
/// own bin.
#[must_use]
pub fn phi_fraction(offset: i64, phi_step: f64, radius: f64, displacement: f64, sigma: f64) -> f64 {
    let o = offset as f64;
    let hi = (o + 0.5) * phi_step * radius - displacement * radius;
    let lo = (o - 0.5) * phi_step * radius - displacement * radius;
    gaussian_fraction(lo, hi, sigma)
}

/// Fraction of the cloud falling in the z bin `offset` steps from the
/// centre bin.
///
/// Each bin edge is evaluated with the leading width and, if it lies
/// above the centroid, again with the tail width.
#[must_use]
pub fn z_fraction(offset: i64, z_step: f64, displacement: f64, cloud: &CloudWidths) -> f64 {
    let o = offset as f64;
    let edge = |d: f64| {
        let lead = FRAC_1_SQRT_2 * d / cloud.z_lead;
        if lead > 0.0 {
            FRAC_1_SQRT_2 * d / cloud.z_tail
        } else {
            lead
        }
    };
    let hi = edge((o + 0.5) * z_step - displacement);
    let lo = edge((o - 0.5) * z_step - displacement);
    0.5 * (erf(hi) - erf(lo))
}
