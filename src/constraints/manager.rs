use nalgebra::Vector3;

use crate::geometry::enumerate_neighbor_lattice_points;
use crate::model::{CrystalStructure, LatticePoint, OriginalAtomIndex, PairIndices, TranslatedAtomIndex};

use super::predicates::{classify, ConstraintParams, Interaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Covalent,
    Ionic,
    Repulsion,
}

/// Stores atoms, cell, policy parameters and the tracing/constraining pair
/// lists (`spec.md` §4.3). Collapses the source's deep inheritance chain
/// (`ConstraintManager <- PolyhedraRetriever <- ... <- Designer`) into
/// composition, per the Design Notes: callers build analysis on top of this
/// as free functions rather than subclassing it.
pub struct ConstraintManager {
    pub structure: CrystalStructure,
    pub params: ConstraintParams,
    pub tracing: Vec<PairIndices>,
    pub constraining: Vec<PairIndices>,
}

impl ConstraintManager {
    pub fn new(structure: CrystalStructure, params: ConstraintParams) -> Self {
        Self { structure, params, tracing: Vec::new(), constraining: Vec::new() }
    }

    fn relation_set_mut(
        &mut self,
        kind: RelationKind,
        atom_index: usize,
    ) -> &mut std::collections::HashSet<TranslatedAtomIndex> {
        let atom = &mut self.structure.atoms[atom_index];
        match kind {
            RelationKind::Covalent => &mut atom.covalent_bonds,
            RelationKind::Ionic => &mut atom.ionic_bonds,
            RelationKind::Repulsion => &mut atom.ionic_repulsions,
        }
    }

    /// Symmetric bond creation: `(i, (j, L))` on atom `i` and `(i, -L)` on
    /// atom `j` (`spec.md` §4.3, invariant in §8 S4).
    pub fn create_bond(&mut self, kind: RelationKind, i: OriginalAtomIndex, neighbor: TranslatedAtomIndex) {
        debug_assert!(!(i == neighbor.original && neighbor.lattice.is_origin()), "atom cannot bond to itself at (0,0,0)");
        let reverse = neighbor.reversed(i);
        self.relation_set_mut(kind, i.0).insert(neighbor);
        self.relation_set_mut(kind, neighbor.original.0).insert(reverse);
    }

    pub fn erase_bond(&mut self, kind: RelationKind, i: OriginalAtomIndex, neighbor: TranslatedAtomIndex) {
        let reverse = neighbor.reversed(i);
        self.relation_set_mut(kind, i.0).remove(&neighbor);
        self.relation_set_mut(kind, neighbor.original.0).remove(&reverse);
    }

    fn zone_radius(&self, interaction: Interaction, i: usize, j: usize, cutoff_ratio: f64) -> f64 {
        let si = self.structure.species_of(i);
        let sj = self.structure.species_of(j);
        let rho_ex = self.params.exclusive_radius_ratio;
        match interaction {
            Interaction::Repulsive => cutoff_ratio * (si.repulsion_radius.min + sj.repulsion_radius.min),
            Interaction::Neutral => cutoff_ratio * rho_ex * (si.covalent_radius.max + sj.covalent_radius.max),
            Interaction::Attractive => cutoff_ratio * rho_ex * (si.ionic_radius.max + sj.ionic_radius.max),
        }
    }

    fn fractional(&self, atom_index: usize) -> Vector3<f64> {
        self.structure.cell.fractional_of(&self.structure.atoms[atom_index].position)
    }

    fn displacement(&self, i: usize, j: usize, lattice: &LatticePoint) -> Vector3<f64> {
        let translation = self.structure.cell.to_translation(lattice);
        self.structure.atoms[j].position + translation - self.structure.atoms[i].position
    }

    /// Rebuilds `tracing` and clears every atom's bond relations
    /// (`spec.md` §4.3).
    pub fn update_tracing_pairs(&mut self) {
        self.tracing.clear();
        self.constraining.clear();
        for atom in &mut self.structure.atoms {
            atom.clear_relations();
        }

        let n = self.structure.atoms.len();
        let rho_trace = self.params.tracer_cutoff_ratio;

        for i in 0..n {
            for j in (i + 1)..n {
                let interaction = classify(self.structure.species_of(i), self.structure.species_of(j));
                let radius = self.zone_radius(interaction, i, j, rho_trace);
                // Box is centered on the central atom i's own fractional
                // coordinate (`spec.md` §4.2: "an origin atom's fractional
                // coordinate f"), not a relative offset to j — the displacement
                // test below (`x_j + T(L) - x_i`) already accounts for j.
                let candidates =
                    enumerate_neighbor_lattice_points(self.fractional(i), self.structure.cell.inverse(), radius);
                for lattice in candidates {
                    let distance_sq = self.displacement(i, j, &lattice).norm_squared();
                    if distance_sq <= radius * radius {
                        self.tracing.push(PairIndices::new(
                            OriginalAtomIndex(i),
                            TranslatedAtomIndex::new(OriginalAtomIndex(j), lattice),
                        ));
                    }
                }
            }

            // Self-images: only L > (0,0,0) to avoid double counting.
            let interaction = classify(self.structure.species_of(i), self.structure.species_of(i));
            let radius = self.zone_radius(interaction, i, i, rho_trace);
            let candidates = enumerate_neighbor_lattice_points(Vector3::zeros(), self.structure.cell.inverse(), radius);
            for lattice in candidates {
                if lattice <= LatticePoint::ORIGIN {
                    continue;
                }
                let translation = self.structure.cell.to_translation(&lattice);
                let distance_sq = translation.norm_squared();
                if distance_sq <= radius * radius {
                    self.tracing.push(PairIndices::new(
                        OriginalAtomIndex(i),
                        TranslatedAtomIndex::new(OriginalAtomIndex(i), lattice),
                    ));
                }
            }
        }
    }

    /// Filters `tracing` by the matching constrainer predicate
    /// (`spec.md` §4.3). Called every relaxation step.
    pub fn update_constraining_pairs(&mut self) {
        self.constraining.clear();
        let rho_con = self.params.constrainer_cutoff_ratio;
        for pair in self.tracing.clone() {
            let i = pair.central.0;
            let j = pair.neighbor.original.0;
            let interaction = classify(self.structure.species_of(i), self.structure.species_of(j));
            let radius = self.zone_radius(interaction, i, j, rho_con);
            let distance_sq = self.displacement(i, j, &pair.neighbor.lattice).norm_squared();
            if distance_sq <= radius * radius {
                self.constraining.push(pair);
            }
        }
    }

    /// Projects fractional coordinates back into `[0,1)`, invalidating all
    /// constraint state (`spec.md` §4.3, tested in §8 S3).
    pub fn normalize_fractional_coordinates(&mut self) {
        self.structure.wrap_fractional_coordinates();
        self.tracing.clear();
        self.constraining.clear();
        for atom in &mut self.structure.atoms {
            atom.clear_relations();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::model::{Atom, CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, RadiusRange, Species, UnitCell};

    use super::*;

    fn na_cl_species() -> Vec<Species> {
        let mut na_comp: HashSet<CompositionMultiset> = HashSet::new();
        let mut m = CompositionMultiset::new();
        m.insert("Cl".to_string(), 1);
        na_comp.insert(m);

        let na = Species {
            symbol: "Na".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(na_comp),
        };

        let mut cl_comp: HashSet<CompositionMultiset> = HashSet::new();
        let mut m = CompositionMultiset::new();
        m.insert("Na".to_string(), 1);
        cl_comp.insert(m);

        let cl = Species {
            symbol: "Cl".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 17, charge: -1 },
            covalent_radius: RadiusRange::new(1.7, 1.9),
            ionic_radius: RadiusRange::new(1.7, 1.9),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(cl_comp),
        };

        vec![na, cl]
    }

    fn diatomic_manager() -> ConstraintManager {
        let cell = UnitCell::cubic(10.0);
        let atoms = vec![
            Atom::new(0, Vector3::new(5.0, 5.0, 5.0)),
            Atom::new(1, Vector3::new(5.0, 5.0, 5.1)),
        ];
        let structure = CrystalStructure::new(cell, atoms, Arc::new(na_cl_species()));
        ConstraintManager::new(structure, ConstraintParams::default())
    }

    #[test]
    fn create_then_erase_bond_restores_relations() {
        let mut manager = diatomic_manager();
        let neighbor = TranslatedAtomIndex::in_cell(OriginalAtomIndex(1));
        manager.create_bond(RelationKind::Ionic, OriginalAtomIndex(0), neighbor);
        assert!(manager.structure.atoms[0].ionic_bonds.contains(&neighbor));
        assert!(manager.structure.atoms[1].ionic_bonds.contains(&TranslatedAtomIndex::in_cell(OriginalAtomIndex(0))));

        manager.erase_bond(RelationKind::Ionic, OriginalAtomIndex(0), neighbor);
        assert!(manager.structure.atoms[0].ionic_bonds.is_empty());
        assert!(manager.structure.atoms[1].ionic_bonds.is_empty());
    }

    #[test]
    fn bond_mirror_symmetry_across_cell() {
        let mut manager = diatomic_manager();
        let neighbor = TranslatedAtomIndex::new(OriginalAtomIndex(1), LatticePoint::new(1, 0, 0));
        manager.create_bond(RelationKind::Covalent, OriginalAtomIndex(0), neighbor);
        assert!(manager.structure.atoms[0].covalent_bonds.contains(&neighbor));
        assert!(manager.structure.atoms[1]
            .covalent_bonds
            .contains(&TranslatedAtomIndex::new(OriginalAtomIndex(0), LatticePoint::new(-1, 0, 0))));
    }

    #[test]
    fn tracing_finds_cross_cell_image_on_correct_side() {
        // i at frac (0.1,0,0), j at frac (0.9,0,0) in a cubic 10 A cell: the
        // real nearest image is L=(-1,0,0) (distance 2 A), not L=(0,0,0) or
        // (1,0,0) (spec.md §4.2, §8 soundness property).
        let mut comp: HashSet<CompositionMultiset> = HashSet::new();
        comp.insert(CompositionMultiset::new());
        let species = Species {
            symbol: "X".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 6, charge: 0 },
            covalent_radius: RadiusRange::new(0.6, 0.8),
            ionic_radius: RadiusRange::new(0.6, 0.8),
            repulsion_radius: RadiusRange::new(0.3, 0.3),
            coordination: CoordinationConstraints::explicit(comp),
        };

        let cell = UnitCell::cubic(10.0);
        let atoms = vec![
            Atom::new(0, Vector3::new(1.0, 5.0, 5.0)),
            Atom::new(0, Vector3::new(9.0, 5.0, 5.0)),
        ];
        let structure = CrystalStructure::new(cell, atoms, Arc::new(vec![species]));
        let mut manager = ConstraintManager::new(structure, ConstraintParams::default());

        manager.update_tracing_pairs();

        let found = manager.tracing.iter().any(|pair| {
            pair.central == OriginalAtomIndex(0)
                && pair.neighbor == TranslatedAtomIndex::new(OriginalAtomIndex(1), LatticePoint::new(-1, 0, 0))
        });
        assert!(found, "expected the L=(-1,0,0) image in tracing, got {:?}", manager.tracing);
    }

    #[test]
    fn rebuilding_tracing_twice_is_idempotent() {
        let mut manager = diatomic_manager();
        manager.update_tracing_pairs();
        let first: HashSet<_> = manager.tracing.iter().cloned().map(pair_key).collect();
        manager.update_tracing_pairs();
        let second: HashSet<_> = manager.tracing.iter().cloned().map(pair_key).collect();
        assert_eq!(first, second);
    }

    fn pair_key(p: PairIndices) -> (usize, usize, LatticePoint) {
        (p.central.0, p.neighbor.original.0, p.neighbor.lattice)
    }

    #[test]
    fn normalize_clears_all_state() {
        let mut manager = diatomic_manager();
        manager.update_tracing_pairs();
        manager.update_constraining_pairs();
        manager.create_bond(RelationKind::Ionic, OriginalAtomIndex(0), TranslatedAtomIndex::in_cell(OriginalAtomIndex(1)));

        manager.normalize_fractional_coordinates();

        assert!(manager.tracing.is_empty());
        assert!(manager.constraining.is_empty());
        for atom in &manager.structure.atoms {
            assert!(atom.covalent_bonds.is_empty());
            assert!(atom.ionic_bonds.is_empty());
            assert!(atom.ionic_repulsions.is_empty());
        }

        let inverse_t = manager.structure.cell.inverse().transpose();
        for atom in &manager.structure.atoms {
            let frac = inverse_t * atom.position;
            for k in 0..3 {
                assert!(frac[k] >= 0.0 && frac[k] < 1.0 + 1e-9);
            }
        }
    }
}
