//! tpcreco-core: Core data model for track seed fitting and charge digitization.
//!
//! This crate holds the types shared by the fitter and the digitizer:
//! cluster positions and track candidates on the reconstruction side, raw
//! energy deposits, layer bin grids and the per-event cell accumulator on
//! the simulation side.
//!

pub mod cell;
pub mod cluster;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod track;

pub use cell::{CellAccumulator, CellKey, CellRecord};
pub use cluster::{ClusterKey, ClusterPoint, ClusterSource};
pub use error::{Error, FitError, Result};
pub use geometry::{CellGeometry, CellSize, CylinderLayer, LayerBinGrid, DEFAULT_CELL_LIMIT};
pub use hit::{HitId, RawHit, ShowerId};
pub use track::TrackCandidate;
