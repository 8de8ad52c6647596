//! Track candidates produced by pattern recognition.

use crate::cluster::ClusterKey;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A track seed: an ordered list of cluster keys plus kinematic state.
///
/// The fitter updates `position` and `momentum` in place; it never creates
/// or removes candidates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackCandidate {
    /// Identifier in the upstream track collection.
    pub id: u32,
    /// Cluster keys in pattern-recognition order.
    pub cluster_keys: Vec<ClusterKey>,
    /// Reference position `[x, y, z]` (cm).
    pub position: [f64; 3],
    /// Momentum `[px, py, pz]` (GeV/c).
    pub momentum: [f64; 3],
    /// Charge sign.
    pub charge: i8,
}

impl TrackCandidate {
    /// Creates a candidate at the origin with the given momentum.
    #[must_use]
    pub fn new(id: u32, cluster_keys: Vec<ClusterKey>, momentum: [f64; 3], charge: i8) -> Self {
        Self {
            id,
            cluster_keys,
            position: [0.0; 3],
            momentum,
            charge,
        }
    }

    /// Transverse momentum.
    #[inline]
    #[must_use]
    pub fn pt(&self) -> f64 {
        self.momentum[0].hypot(self.momentum[1])
    }

    /// Total momentum.
    #[inline]
    #[must_use]
    pub fn p(&self) -> f64 {
        self.pt().hypot(self.momentum[2])
    }

    /// Azimuth of the momentum.
    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.momentum[1].atan2(self.momentum[0])
    }

    /// Pseudorapidity of the momentum.
    #[must_use]
    pub fn eta(&self) -> f64 {
        let theta = self.pt().atan2(self.momentum[2]);
        -(theta / 2.0).tan().ln()
    }

    /// Number of cluster keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cluster_keys.len()
    }

    /// Returns true if the track has no clusters.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cluster_keys.is_empty()
    }
}
