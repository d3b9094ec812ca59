use crate::model::{CompositionMultiset, OriginalAtomIndex, TranslatedAtomIndex};

use super::manager::{ConstraintManager, RelationKind};
use super::predicates::Predicates;

/// A view over `ConstraintManager`'s bond relations. Implemented as free
/// functions rather than a subclass, per the Design Notes' instruction to
/// collapse `ConstraintManager <- PolyhedraRetriever <- ...` into
/// composition (`spec.md` §4.4, §9).
pub fn bonded_neighbors(manager: &ConstraintManager, i: OriginalAtomIndex) -> Vec<TranslatedAtomIndex> {
    let atom = &manager.structure.atoms[i.0];
    atom.covalent_bonds.iter().chain(atom.ionic_bonds.iter()).copied().collect()
}

/// Multiset of neighbour element symbols over all bonded (covalent + ionic)
/// neighbours of `i` (`spec.md` §4.4).
pub fn coordination_composition(manager: &ConstraintManager, i: OriginalAtomIndex) -> CompositionMultiset {
    let mut composition = CompositionMultiset::new();
    for neighbor in bonded_neighbors(manager, i) {
        let symbol = manager.structure.species_of(neighbor.original.0).symbol.clone();
        *composition.entry(symbol).or_insert(0) += 1;
    }
    composition
}

/// `spec.md` §4.4 `hasFeasibleCoordinationComposition`.
pub fn has_feasible_coordination_composition(manager: &ConstraintManager, i: OriginalAtomIndex) -> bool {
    let composition = coordination_composition(manager, i);
    manager.structure.species_of(i.0).coordination.is_feasible_composition(&composition)
}

/// Bonded neighbours of `i` sorted by squared distance ascending; ties
/// broken by lattice-point order then original-index order
/// (`spec.md` §4.4, `TranslatedAtomIndex`'s `Ord` already encodes that
/// tie-break).
pub fn ordered_bonded_indices(manager: &ConstraintManager, i: OriginalAtomIndex) -> Vec<(f64, TranslatedAtomIndex)> {
    let origin = manager.structure.atoms[i.0].position;
    let mut entries: Vec<(f64, TranslatedAtomIndex)> = bonded_neighbors(manager, i)
        .into_iter()
        .map(|neighbor| {
            let translation = manager.structure.cell.to_translation(&neighbor.lattice);
            let displacement = manager.structure.atoms[neighbor.original.0].position + translation - origin;
            (displacement.norm_squared(), neighbor)
        })
        .collect();
    entries.sort_by(|(da, na), (db, nb)| da.total_cmp(db).then_with(|| na.cmp(nb)));
    entries
}

/// Erases every covalent/ionic bond that no longer satisfies its
/// feasibility predicate at the manager's current error rate
/// (`spec.md` §4.4, postcondition tested in §8).
pub fn erase_infeasible_chemical_bonds(manager: &mut ConstraintManager) {
    let n = manager.structure.atoms.len();
    let eps = manager.params.feasible_error_rate;

    for i in 0..n {
        let covalent: Vec<_> = manager.structure.atoms[i].covalent_bonds.iter().copied().collect();
        for neighbor in covalent {
            if !is_feasible_bond(manager, RelationKind::Covalent, OriginalAtomIndex(i), neighbor, eps) {
                manager.erase_bond(RelationKind::Covalent, OriginalAtomIndex(i), neighbor);
            }
        }

        let ionic: Vec<_> = manager.structure.atoms[i].ionic_bonds.iter().copied().collect();
        for neighbor in ionic {
            if !is_feasible_bond(manager, RelationKind::Ionic, OriginalAtomIndex(i), neighbor, eps) {
                manager.erase_bond(RelationKind::Ionic, OriginalAtomIndex(i), neighbor);
            }
        }
    }
}

fn is_feasible_bond(
    manager: &ConstraintManager,
    kind: RelationKind,
    i: OriginalAtomIndex,
    neighbor: TranslatedAtomIndex,
    eps: f64,
) -> bool {
    let si = manager.structure.species_of(i.0);
    let sj = manager.structure.species_of(neighbor.original.0);
    let translation = manager.structure.cell.to_translation(&neighbor.lattice);
    let displacement = manager.structure.atoms[neighbor.original.0].position + translation
        - manager.structure.atoms[i.0].position;
    let distance_sq = displacement.norm_squared();
    match kind {
        RelationKind::Covalent => Predicates::feasible_covalent_bond(distance_sq, si, sj, eps),
        RelationKind::Ionic => Predicates::feasible_ionic_bond(distance_sq, si, sj, eps),
        RelationKind::Repulsion => unreachable!("repulsions are not chemical bonds"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use nalgebra::Vector3;

    use crate::constraints::predicates::ConstraintParams;
    use crate::model::{Atom, CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, LatticePoint, RadiusRange, Species, UnitCell};

    use super::*;

    fn ring_species() -> Vec<Species> {
        let mut comp: HashSet<CompositionMultiset> = HashSet::new();
        let mut m = CompositionMultiset::new();
        m.insert("X".to_string(), 2);
        comp.insert(m);
        vec![Species {
            symbol: "X".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 6, charge: 0 },
            covalent_radius: RadiusRange::new(0.5, 0.9),
            ionic_radius: RadiusRange::new(0.5, 0.9),
            repulsion_radius: RadiusRange::new(0.3, 0.3),
            coordination: CoordinationConstraints::explicit(comp),
        }]
    }

    #[test]
    fn erase_then_coordinate_only_touches_violating_atom() {
        let cell = UnitCell::cubic(20.0);
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.7, 0.0, 0.0),
            Vector3::new(1.4, 0.0, 0.0),
            Vector3::new(1.4, 0.7, 0.0),
            Vector3::new(0.7, 0.7, 0.0),
            Vector3::new(0.0, 0.7, 0.0),
        ];
        let atoms: Vec<Atom> = positions.iter().map(|p| Atom::new(0, *p)).collect();
        let structure = crate::model::CrystalStructure::new(cell, atoms, Arc::new(ring_species()));
        let mut manager = ConstraintManager::new(structure, ConstraintParams::default());

        let ring = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)];
        for (a, b) in ring {
            manager.create_bond(
                RelationKind::Covalent,
                OriginalAtomIndex(a),
                TranslatedAtomIndex::new(OriginalAtomIndex(b), LatticePoint::ORIGIN),
            );
        }

        manager.structure.atoms[0].position = Vector3::new(50.0, 50.0, 50.0);

        erase_infeasible_chemical_bonds(&mut manager);

        assert!(manager.structure.atoms[0].covalent_bonds.is_empty());
        assert_eq!(manager.structure.atoms[1].covalent_bonds.len(), 1);
        assert_eq!(manager.structure.atoms[5].covalent_bonds.len(), 1);
        assert_eq!(manager.structure.atoms[2].covalent_bonds.len(), 2);
        assert_eq!(manager.structure.atoms[3].covalent_bonds.len(), 2);
        assert_eq!(manager.structure.atoms[4].covalent_bonds.len(), 2);
    }
}
