//! Per-event accumulation of charge into readout cells.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::hit::{HitId, ShowerId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Address of a readout cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellKey {
    /// Layer index.
    pub layer: u32,
    /// z bin.
    pub z_bin: u32,
    /// Azimuthal bin.
    pub phi_bin: u32,
}

impl CellKey {
    /// Creates a cell key.
    #[inline]
    #[must_use]
    pub fn new(layer: u32, z_bin: u32, phi_bin: u32) -> Self {
        Self {
            layer,
            z_bin,
            phi_bin,
        }
    }
}

/// Accumulated content of one cell.
///
/// `edep` holds energy for pixel layers and effective electrons for gas
/// layers; the per-source maps always sum to `edep`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellRecord {
    /// Cell address.
    pub key: CellKey,
    /// Total deposit.
    pub edep: f64,
    /// Deposit broken down by contributing hit.
    pub hit_edep: HashMap<HitId, f64>,
    /// Deposit broken down by contributing shower.
    pub shower_edep: HashMap<ShowerId, f64>,
    /// Sum of ionization energy of contributing hits, if any carried one.
    pub eion: Option<f64>,
}

impl CellRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new(key: CellKey) -> Self {
        Self {
            key,
            edep: 0.0,
            hit_edep: HashMap::new(),
            shower_edep: HashMap::new(),
            eion: None,
        }
    }

    /// Adds a deposit attributed to `hit` and `shower`.
    pub fn add(&mut self, hit: HitId, shower: ShowerId, edep: f64) {
        self.edep += edep;
        *self.hit_edep.entry(hit).or_insert(0.0) += edep;
        *self.shower_edep.entry(shower).or_insert(0.0) += edep;
    }

    /// Adds ionization energy.
    pub fn add_eion(&mut self, eion: f64) {
        *self.eion.get_or_insert(0.0) += eion;
    }
}

/// Event-scoped map from cell address to accumulated content.
///
/// Cells are created on first contribution. The owner clears it between
/// events.
#[derive(Debug, Clone, Default)]
pub struct CellAccumulator {
    cells: HashMap<CellKey, CellRecord>,
}

impl CellAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `key`, creating it if needed.
    pub fn cell_mut(&mut self, key: CellKey) -> &mut CellRecord {
        match self.cells.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(CellRecord::new(key)),
        }
    }

    /// Adds a deposit to the cell at `key`.
    pub fn deposit(&mut self, key: CellKey, hit: HitId, shower: ShowerId, edep: f64, eion: Option<f64>) {
        let cell = self.cell_mut(key);
        cell.add(hit, shower, edep);
        if let Some(eion) = eion {
            cell.add_eion(eion);
        }
    }

    /// Record at `key`, if filled.
    #[must_use]
    pub fn get(&self, key: &CellKey) -> Option<&CellRecord> {
        self.cells.get(key)
    }

    /// Number of filled cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no cell has been filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates filled cells in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &CellRecord> {
        self.cells.values()
    }

    /// Sum of `edep` over all cells.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cells.values().map(|cell| cell.edep).sum()
    }

    /// Sum of `edep` over the cells of one layer.
    #[must_use]
    pub fn layer_total(&self, layer: u32) -> f64 {
        self.cells
            .values()
            .filter(|cell| cell.key.layer == layer)
            .map(|cell| cell.edep)
            .sum()
    }

    /// Empties the accumulator, keeping its allocation.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Drains the cells into a vector sorted by key.
    pub fn drain_sorted(&mut self) -> Vec<CellRecord> {
        let mut cells: Vec<CellRecord> = self.cells.drain().map(|(_, cell)| cell).collect();
        cells.sort_unstable_by_key(|cell| cell.key);
        cells
    }
}
