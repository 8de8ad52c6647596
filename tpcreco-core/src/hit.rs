//! Raw energy deposits from the simulation stage.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a raw hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct HitId(pub u64);

/// Identifier of the shower (primary track) that produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ShowerId(pub i32);

/// One energy deposit of a particle crossing a detector layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawHit {
    /// Hit identifier.
    pub id: HitId,
    /// Originating shower.
    pub shower_id: ShowerId,
    /// Layer the deposit belongs to.
    pub layer: u32,
    /// Entry point `[x, y, z]` (cm).
    pub entry: [f64; 3],
    /// Exit point `[x, y, z]` (cm).
    pub exit: [f64; 3],
    /// Entry time (ns).
    pub t_entry: f64,
    /// Exit time (ns).
    pub t_exit: f64,
    /// Total deposited energy (GeV).
    pub edep: f64,
    /// Ionization energy (GeV), when the simulation recorded it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub eion: Option<f64>,
}

impl RawHit {
    /// Creates a hit with identical entry and exit point and time.
    #[must_use]
    pub fn point(id: u64, layer: u32, position: [f64; 3], t: f64, edep: f64) -> Self {
        Self {
            id: HitId(id),
            shower_id: ShowerId(0),
            layer,
            entry: position,
            exit: position,
            t_entry: t,
            t_exit: t,
            edep,
            eion: None,
        }
    }

    /// Sets the entry and exit points.
    #[must_use]
    pub fn with_path(mut self, entry: [f64; 3], exit: [f64; 3]) -> Self {
        self.entry = entry;
        self.exit = exit;
        self
    }

    /// Sets the ionization energy.
    #[must_use]
    pub fn with_eion(mut self, eion: f64) -> Self {
        self.eion = Some(eion);
        self
    }

    /// Sets the shower id.
    #[must_use]
    pub fn with_shower(mut self, shower_id: i32) -> Self {
        self.shower_id = ShowerId(shower_id);
        self
    }

    /// Midpoint between entry and exit.
    #[inline]
    #[must_use]
    pub fn avg_position(&self) -> [f64; 3] {
        [
            0.5 * (self.entry[0] + self.exit[0]),
            0.5 * (self.entry[1] + self.exit[1]),
            0.5 * (self.entry[2] + self.exit[2]),
        ]
    }

    /// Mean of entry and exit time.
    #[inline]
    #[must_use]
    pub fn avg_t(&self) -> f64 {
        0.5 * (self.t_entry + self.t_exit)
    }

    /// Absolute z distance between entry and exit.
    #[inline]
    #[must_use]
    pub fn z_extent(&self) -> f64 {
        (self.exit[2] - self.entry[2]).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hit_averages() {
        let hit = RawHit::point(1, 10, [0.0; 3], 0.0, 1e-6)
            .with_path([30.0, 0.0, 10.0], [32.0, 2.0, 11.0]);
        let avg = hit.avg_position();
        assert_relative_eq!(avg[0], 31.0);
        assert_relative_eq!(avg[1], 1.0);
        assert_relative_eq!(avg[2], 10.5);
        assert_relative_eq!(hit.z_extent(), 1.0);
    }

    #[test]
    fn test_hit_builders() {
        let hit = RawHit::point(3, 4, [1.0, 2.0, 3.0], 5.0, 2e-6)
            .with_eion(1e-6)
            .with_shower(9);
        assert_eq!(hit.id, HitId(3));
        assert_eq!(hit.shower_id, ShowerId(9));
        assert_eq!(hit.eion, Some(1e-6));
        assert_relative_eq!(hit.avg_t(), 5.0);
    }
}
