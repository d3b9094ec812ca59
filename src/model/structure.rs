use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::atom::Atom;
use super::lattice::UnitCell;
use super::species::Species;

/// A periodic arrangement of atoms inside a mutable unit cell. Atoms are
/// exclusively owned by their structure (`spec.md` §3: "No shared mutation
/// between structures").
#[derive(Clone)]
pub struct CrystalStructure {
    pub cell: UnitCell,
    pub atoms: Vec<Atom>,
    pub species: Arc<Vec<Species>>,
}

impl CrystalStructure {
    pub fn new(cell: UnitCell, atoms: Vec<Atom>, species: Arc<Vec<Species>>) -> Self {
        Self { cell, atoms, species }
    }

    pub fn species_of(&self, atom_index: usize) -> &Species {
        &self.species[self.atoms[atom_index].species_index]
    }

    /// Wraps every atom's fractional coordinate into `[0, 1)`. Does *not*
    /// clear constraint state by itself — that invalidation is the
    /// responsibility of `ConstraintManager::normalize_fractional_coordinates`,
    /// which owns the tracing/constraining lists (`spec.md` §4.3, §8).
    pub fn wrap_fractional_coordinates(&mut self) {
        let inverse_t = self.cell.inverse().transpose();
        let basis_t = self.cell.basis().transpose();
        for atom in &mut self.atoms {
            let mut frac = inverse_t * atom.position;
            for k in 0..3 {
                frac[k] -= frac[k].floor();
            }
            atom.position = basis_t * frac;
        }
    }
}

/// On-disk serializable snapshot of a produced structure (`spec.md` §6).
#[derive(Debug, Serialize, Deserialize)]
pub struct StructureRecord {
    pub basis: [[f64; 3]; 3],
    pub species_symbols: Vec<String>,
    pub atoms: Vec<AtomRecord>,
    pub fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AtomRecord {
    pub species_index: usize,
    pub cartesian: [f64; 3],
}

impl StructureRecord {
    pub fn from_structure(structure: &CrystalStructure, fingerprint: String) -> Self {
        let basis = structure.cell.basis();
        let basis = [
            [basis[(0, 0)], basis[(0, 1)], basis[(0, 2)]],
            [basis[(1, 0)], basis[(1, 1)], basis[(1, 2)]],
            [basis[(2, 0)], basis[(2, 1)], basis[(2, 2)]],
        ];
        let species_symbols = structure.species.iter().map(|s| s.symbol.clone()).collect();
        let atoms = structure
            .atoms
            .iter()
            .map(|a| AtomRecord {
                species_index: a.species_index,
                cartesian: [a.position.x, a.position.y, a.position.z],
            })
            .collect();
        Self { basis, species_symbols, atoms, fingerprint }
    }
}
