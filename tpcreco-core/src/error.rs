//! Error types for tpcreco-core.

use thiserror::Error;

/// Result type alias for tpcreco operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal configuration errors.
///
/// Anything in here aborts the run: there is no per-event recovery from a
/// broken geometry or cell layout.
#[derive(Error, Debug)]
pub enum Error {
    /// A target cell size is zero, negative or not finite.
    #[error("invalid cell size for layer {layer}: ({size_rphi}, {size_z})")]
    InvalidCellSize {
        layer: u32,
        size_rphi: f64,
        size_z: f64,
    },

    /// A layer description with non-positive radius or empty z extent.
    #[error("invalid layer {layer}: {reason}")]
    InvalidLayer { layer: u32, reason: String },

    /// A layer has geometry but no configured cell size.
    #[error("no cell sizes for layer {layer}")]
    MissingCellSize { layer: u32 },

    /// The bin grid of a layer would exceed the cell-count ceiling.
    #[error("number of cells {cells} for layer {layer} exceeds the {limit} cell limit, increase the cell size")]
    CellLimitExceeded { layer: u32, cells: u64, limit: u64 },

    /// A hit refers to a layer with no bin grid.
    #[error("no cell geometry for layer {0}")]
    MissingLayerGeometry(u32),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Reasons a single track fit is skipped.
///
/// A track that produces one of these is left exactly as it was.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitError {
    /// Not enough clusters inside the layer window.
    #[error("too few clusters: found {found}, need {required}")]
    TooFewClusters { found: usize, required: usize },

    /// All clusters share the same radius; the line fit has no solution.
    #[error("degenerate line fit (all clusters at the same radius)")]
    DegenerateLine,

    /// Collinear or otherwise ill-conditioned circle fit.
    #[error("degenerate circle fit (non-finite centre or radius)")]
    DegenerateCircle,

    /// The circle is centred on the origin, so every point is equally close.
    #[error("closest point to origin undefined for a circle centred on the origin")]
    UndefinedClosestPoint,
}
