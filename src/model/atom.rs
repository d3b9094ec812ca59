use std::collections::HashSet;

use nalgebra::Vector3;

use super::lattice::TranslatedAtomIndex;
use super::species::Species;

/// A constraining atom: species identity, cartesian coordinate, and the
/// three bond-relation adjacency sets (`spec.md` §3, collapsed per the
/// Design Notes' single-adjacency-representation guidance — see
/// `SPEC_FULL.md` §3+).
#[derive(Debug, Clone)]
pub struct Atom {
    pub species_index: usize,
    pub position: Vector3<f64>,
    pub covalent_bonds: HashSet<TranslatedAtomIndex>,
    pub ionic_bonds: HashSet<TranslatedAtomIndex>,
    pub ionic_repulsions: HashSet<TranslatedAtomIndex>,
}

impl Atom {
    pub fn new(species_index: usize, position: Vector3<f64>) -> Self {
        Self {
            species_index,
            position,
            covalent_bonds: HashSet::new(),
            ionic_bonds: HashSet::new(),
            ionic_repulsions: HashSet::new(),
        }
    }

    pub fn clear_relations(&mut self) {
        self.covalent_bonds.clear();
        self.ionic_bonds.clear();
        self.ionic_repulsions.clear();
    }

    pub fn species<'a>(&self, species_table: &'a [Species]) -> &'a Species {
        &species_table[self.species_index]
    }
}
