//! Cylindrical layer geometry and its discretization into readout cells.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default ceiling on `phi_bins * z_bins` for a single layer.
pub const DEFAULT_CELL_LIMIT: u64 = 5_100_000;

/// Continuous description of one cylindrical layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CylinderLayer {
    /// Layer index.
    pub layer: u32,
    /// Radius (cm).
    pub radius: f64,
    /// Radial thickness (cm).
    pub thickness: f64,
    /// Lower z edge (cm).
    pub zmin: f64,
    /// Upper z edge (cm).
    pub zmax: f64,
}

impl CylinderLayer {
    /// Creates a layer description.
    #[must_use]
    pub fn new(layer: u32, radius: f64, thickness: f64, zmin: f64, zmax: f64) -> Self {
        Self {
            layer,
            radius,
            thickness,
            zmin,
            zmax,
        }
    }

    /// Circumference `2πr`.
    #[inline]
    #[must_use]
    pub fn circumference(&self) -> f64 {
        TAU * self.radius
    }

    /// Length along z.
    #[inline]
    #[must_use]
    pub fn length(&self) -> f64 {
        self.zmax - self.zmin
    }
}

/// Target readout cell size of a layer (cm).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellSize {
    /// Size along the circumference.
    pub rphi: f64,
    /// Size along z.
    pub z: f64,
}

impl CellSize {
    /// Creates a cell size.
    #[must_use]
    pub fn new(rphi: f64, z: f64) -> Self {
        Self { rphi, z }
    }
}

/// Immutable bin grid of one layer in (phi, z).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerBinGrid {
    /// Layer index.
    pub layer: u32,
    /// Radius (cm).
    pub radius: f64,
    /// Radial thickness (cm).
    pub thickness: f64,
    /// Number of azimuthal bins.
    pub phi_bins: usize,
    /// Azimuthal bin width (rad).
    pub phi_step: f64,
    /// Lower azimuth edge, always `-π`.
    pub phi_min: f64,
    /// Number of z bins.
    pub z_bins: usize,
    /// Lower z edge (cm).
    pub z_min: f64,
    /// z bin width (cm).
    pub z_step: f64,
}

impl LayerBinGrid {
    /// Tiles a layer with whole cells no larger than `size`.
    ///
    /// Bin counts are rounded up, so the effective cell size may shrink
    /// slightly but no fractional bin is ever left over.
    ///
    /// # Errors
    /// Returns an error for non-positive sizes or extents, or when the
    /// cell count exceeds `cell_limit`.
    pub fn build(layer: &CylinderLayer, size: CellSize, cell_limit: u64) -> Result<Self> {
        if !(size.rphi.is_finite() && size.rphi > 0.0 && size.z.is_finite() && size.z > 0.0) {
            return Err(Error::InvalidCellSize {
                layer: layer.layer,
                size_rphi: size.rphi,
                size_z: size.z,
            });
        }
        if !(layer.radius.is_finite() && layer.radius > 0.0) {
            return Err(Error::InvalidLayer {
                layer: layer.layer,
                reason: format!("radius {} must be positive", layer.radius),
            });
        }
        if !(layer.length().is_finite() && layer.length() > 0.0) {
            return Err(Error::InvalidLayer {
                layer: layer.layer,
                reason: format!("empty z range [{}, {}]", layer.zmin, layer.zmax),
            });
        }

        let phi_bins = whole_bins(layer.circumference(), size.rphi);
        let z_bins = whole_bins(layer.length(), size.z);

        let cells = phi_bins.saturating_mul(z_bins);
        if cells > cell_limit {
            return Err(Error::CellLimitExceeded {
                layer: layer.layer,
                cells,
                limit: cell_limit,
            });
        }

        Ok(Self {
            layer: layer.layer,
            radius: layer.radius,
            thickness: layer.thickness,
            phi_bins: phi_bins as usize,
            phi_step: TAU / phi_bins as f64,
            phi_min: -PI,
            z_bins: z_bins as usize,
            z_min: layer.zmin,
            z_step: layer.length() / z_bins as f64,
        })
    }

    /// Upper z edge.
    #[inline]
    #[must_use]
    pub fn z_max(&self) -> f64 {
        self.z_min + self.z_bins as f64 * self.z_step
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.phi_bins * self.z_bins
    }

    /// Effective cell size along the circumference.
    #[inline]
    #[must_use]
    pub fn effective_rphi_size(&self) -> f64 {
        self.radius * self.phi_step
    }

    /// Effective cell size along z.
    #[inline]
    #[must_use]
    pub fn effective_z_size(&self) -> f64 {
        self.z_step
    }

    /// Azimuthal bin of `phi`, wrapping any angle onto the ring.
    #[must_use]
    pub fn phi_bin(&self, phi: f64) -> Option<usize> {
        if !phi.is_finite() {
            return None;
        }
        let turns = ((phi - self.phi_min) / TAU).floor();
        let norm = phi - turns * TAU;
        let bin = ((norm - self.phi_min) / self.phi_step).floor();
        if !bin.is_finite() || self.phi_bins == 0 {
            return None;
        }
        // Rounding at the seam can land one past either end of the ring.
        Some((bin.max(0.0) as usize).min(self.phi_bins - 1))
    }

    /// z bin of `z`, or `None` outside the layer.
    #[must_use]
    pub fn z_bin(&self, z: f64) -> Option<usize> {
        if !(z >= self.z_min && z < self.z_max()) {
            return None;
        }
        let bin = ((z - self.z_min) / self.z_step).floor() as usize;
        (bin < self.z_bins).then_some(bin)
    }

    /// Centre azimuth of bin `index`.
    #[inline]
    #[must_use]
    pub fn phi_center(&self, index: usize) -> f64 {
        self.phi_min + (index as f64 + 0.5) * self.phi_step
    }

    /// Centre z of bin `index`.
    #[inline]
    #[must_use]
    pub fn z_center(&self, index: usize) -> f64 {
        self.z_min + (index as f64 + 0.5) * self.z_step
    }
}

fn whole_bins(extent: f64, size: f64) -> u64 {
    (extent / size).ceil().max(1.0) as u64
}

/// Run-scoped collection of bin grids, keyed by layer.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellGeometry {
    layers: BTreeMap<u32, LayerBinGrid>,
}

impl CellGeometry {
    /// Builds the grid of every layer from its target cell size.
    ///
    /// # Errors
    /// Fails on the first layer without a cell size, with invalid
    /// dimensions, or exceeding `cell_limit`.
    pub fn build<'a, I>(layers: I, cell_sizes: &BTreeMap<u32, CellSize>, cell_limit: u64) -> Result<Self>
    where
        I: IntoIterator<Item = &'a CylinderLayer>,
    {
        let mut grids = BTreeMap::new();
        for layer in layers {
            let size = cell_sizes
                .get(&layer.layer)
                .copied()
                .ok_or(Error::MissingCellSize { layer: layer.layer })?;
            let grid = LayerBinGrid::build(layer, size, cell_limit)?;
            grids.insert(layer.layer, grid);
        }
        Ok(Self { layers: grids })
    }

    /// Adds or replaces a prebuilt grid.
    pub fn insert(&mut self, grid: LayerBinGrid) {
        self.layers.insert(grid.layer, grid);
    }

    /// Grid of `layer`.
    #[must_use]
    pub fn layer(&self, layer: u32) -> Option<&LayerBinGrid> {
        self.layers.get(&layer)
    }

    /// Iterates grids in layer order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerBinGrid> {
        self.layers.values()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if no layer is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tpc_layer() -> CylinderLayer {
        CylinderLayer::new(20, 40.0, 1.0, -100.0, 100.0)
    }

    #[test]
    fn test_bins_tile_layer_exactly() {
        let layer = tpc_layer();
        for &(rphi, z) in &[(0.12, 0.17), (0.3, 0.5), (0.07, 1.3), (1.0, 0.999)] {
            let grid = LayerBinGrid::build(&layer, CellSize::new(rphi, z), DEFAULT_CELL_LIMIT).unwrap();
            assert_relative_eq!(
                grid.phi_bins as f64 * grid.effective_rphi_size(),
                layer.circumference(),
                max_relative = 1e-12
            );
            assert_relative_eq!(grid.z_bins as f64 * grid.z_step, layer.length(), max_relative = 1e-12);
            assert!(grid.effective_rphi_size() <= rphi + 1e-12);
            assert!(grid.effective_z_size() <= z + 1e-12);
        }
    }

    #[test]
    fn test_exact_multiple_keeps_size() {
        let layer = CylinderLayer::new(1, 10.0, 0.1, -5.0, 5.0);
        let grid = LayerBinGrid::build(&layer, CellSize::new(1.0, 0.5), DEFAULT_CELL_LIMIT).unwrap();
        assert_eq!(grid.z_bins, 20);
        assert_relative_eq!(grid.z_step, 0.5);
    }

    #[test]
    fn test_cell_limit_rejected() {
        let err = LayerBinGrid::build(&tpc_layer(), CellSize::new(0.01, 0.01), DEFAULT_CELL_LIMIT)
            .unwrap_err();
        assert!(matches!(err, Error::CellLimitExceeded { layer: 20, .. }));
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(LayerBinGrid::build(&tpc_layer(), CellSize::new(0.0, 1.0), DEFAULT_CELL_LIMIT).is_err());
        assert!(LayerBinGrid::build(&tpc_layer(), CellSize::new(1.0, f64::NAN), DEFAULT_CELL_LIMIT).is_err());
        let flat = CylinderLayer::new(2, 10.0, 0.1, 5.0, 5.0);
        assert!(matches!(
            LayerBinGrid::build(&flat, CellSize::new(1.0, 1.0), DEFAULT_CELL_LIMIT),
            Err(Error::InvalidLayer { layer: 2, .. })
        ));
    }

    #[test]
    fn test_bin_lookup_and_centers() {
        let layer = CylinderLayer::new(1, 10.0, 0.1, -5.0, 5.0);
        let grid = LayerBinGrid::build(&layer, CellSize::new(1.0, 1.0), DEFAULT_CELL_LIMIT).unwrap();

        assert_eq!(grid.z_bin(-5.0), Some(0));
        assert_eq!(grid.z_bin(4.99), Some(9));
        assert_eq!(grid.z_bin(5.0), None);
        assert_eq!(grid.z_bin(-50.0), None);
        assert_eq!(grid.z_bin(f64::NAN), None);
        assert_relative_eq!(grid.z_center(0), -4.5);

        for bin in [0, 1, grid.phi_bins / 2, grid.phi_bins - 1] {
            assert_eq!(grid.phi_bin(grid.phi_center(bin)), Some(bin));
        }
    }

    #[test]
    fn test_phi_bin_wraps() {
        let layer = CylinderLayer::new(1, 10.0, 0.1, -5.0, 5.0);
        let grid = LayerBinGrid::build(&layer, CellSize::new(1.0, 1.0), DEFAULT_CELL_LIMIT).unwrap();
        let phi = grid.phi_center(3);
        assert_eq!(grid.phi_bin(phi + TAU), Some(3));
        assert_eq!(grid.phi_bin(phi - 2.0 * TAU), Some(3));
        assert_eq!(grid.phi_bin(PI), Some(0));
    }

    #[test]
    fn test_phi_bin_seam_stays_on_ring() {
        let below_pi = f64::from_bits(PI.to_bits() - 1);
        for &radius in &[5.0, 30.0] {
            let layer = CylinderLayer::new(1, radius, 0.1, -5.0, 5.0);
            for &rphi in &[0.01, 0.03, 0.1, 0.3, 0.7] {
                let grid = LayerBinGrid::build(&layer, CellSize::new(rphi, 1.0), DEFAULT_CELL_LIMIT).unwrap();
                assert_eq!(grid.phi_bin(below_pi), Some(grid.phi_bins - 1));
                assert_eq!(grid.phi_bin(-PI), Some(0));
                assert_eq!(grid.phi_bin(-below_pi), Some(0));
            }
        }
        let grid = LayerBinGrid::build(&tpc_layer(), CellSize::new(0.5, 1.0), DEFAULT_CELL_LIMIT).unwrap();
        assert_eq!(grid.phi_bin(f64::NAN), None);
        assert_eq!(grid.phi_bin(f64::INFINITY), None);
    }

    #[test]
    fn test_geometry_requires_cell_size() {
        let layers = [tpc_layer(), CylinderLayer::new(21, 41.0, 1.0, -100.0, 100.0)];
        let mut sizes = BTreeMap::new();
        sizes.insert(20, CellSize::new(0.12, 0.17));
        let err = CellGeometry::build(&layers, &sizes, DEFAULT_CELL_LIMIT).unwrap_err();
        assert!(matches!(err, Error::MissingCellSize { layer: 21 }));

        sizes.insert(21, CellSize::new(0.12, 0.17));
        let geometry = CellGeometry::build(&layers, &sizes, DEFAULT_CELL_LIMIT).unwrap();
        assert_eq!(geometry.len(), 2);
        assert!(geometry.layer(21).is_some());
        assert!(geometry.layer(22).is_none());
    }
}
