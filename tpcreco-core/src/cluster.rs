//! Reconstructed cluster positions consumed by the track fitter.

use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque identifier of a cluster in the upstream cluster store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClusterKey(pub u64);

/// A cluster position in global coordinates, attributed to one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterPoint {
    /// Detector layer the cluster was found in.
    pub layer: u32,
    /// Global x (cm).
    pub x: f64,
    /// Global y (cm).
    pub y: f64,
    /// Global z (cm).
    pub z: f64,
}

impl ClusterPoint {
    /// Creates a new cluster point.
    #[inline]
    #[must_use]
    pub fn new(layer: u32, x: f64, y: f64, z: f64) -> Self {
        Self { layer, x, y, z }
    }

    /// Transverse radius `sqrt(x² + y²)`.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Azimuth in `(-π, π]`.
    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

/// Read access to clusters by key, already transformed to global coordinates.
///
/// This is the seam where an alignment-aware transform plugs in: an
/// implementation may store local coordinates and resolve them lazily.
pub trait ClusterSource: Send + Sync {
    /// Returns the global position of the cluster, if it exists.
    fn global_position(&self, key: ClusterKey) -> Option<ClusterPoint>;
}

impl ClusterSource for HashMap<ClusterKey, ClusterPoint> {
    #[inline]
    fn global_position(&self, key: ClusterKey) -> Option<ClusterPoint> {
        self.get(&key).copied()
    }
}

impl ClusterSource for BTreeMap<ClusterKey, ClusterPoint> {
    #[inline]
    fn global_position(&self, key: ClusterKey) -> Option<ClusterPoint> {
        self.get(&key).copied()
    }
}
