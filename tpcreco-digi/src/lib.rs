//! tpcreco-digi: Charge digitization for cylindrical detector layers.
//!
//! Raw energy deposits are turned into readout-cell contents:
//! - **Pixel layers** - the deposit lands in a single cell
//! - **Gas layers** - drift-time correction, optional distortion, Poisson
//!   electron statistics, diffusion and shaping widths, longitudinal
//!   segmentation and Gaussian-integral spreading over a window of bins
//!
//! The [`Digitizer`] owns the run-scoped state (bin grids, random stream,
//! distortion model); the per-event [`CellAccumulator`] is passed in by the
//! caller and cleared between events.
//!
#![warn(missing_docs)]

mod config;
mod diagnostics;
mod digitizer;
mod distortion;
mod random;
mod spread;

pub use config::{DigitizerConfig, SPEED_OF_LIGHT_CM_PER_NS};
pub use diagnostics::{DiagnosticTotals, Diagnostics, NoDiagnostics};
pub use digitizer::{DigitizationStatistics, Digitizer, HitOutcome};
pub use distortion::{ConstantDistortion, DistortionModel, NoDistortion};
pub use random::{RandomStream, SeededStream};
pub use spread::{
    gaussian_fraction, phi_fraction, segment_count, segment_offset, window_half_width, z_fraction,
    CloudWidths,
};

// Re-export core geometry and cell types
pub use tpcreco_core::{
    CellAccumulator, CellGeometry, CellKey, CellRecord, CellSize, CylinderLayer, LayerBinGrid,
    RawHit,
};
