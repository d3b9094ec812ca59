use crate::constraints::predicates::{innate_covalent_bondable, innate_ionic_bondable};
use crate::constraints::polyhedra::{coordination_composition, ordered_bonded_indices};
use crate::constraints::{classify, ConstraintManager, Interaction, Predicates, RelationKind};
use crate::model::{OriginalAtomIndex, PairIndices, TranslatedAtomIndex};
use crate::optimize::ObjectivePairLists;

/// `(i, neighbor)` wins over its mirror `(neighbor.original, reversed)` iff
/// it sorts first under `(atom index, lattice point)` — an arbitrary but
/// total and self-consistent tie-break, used only to avoid emitting both
/// directions of a bonded pair that `Atom`'s relation sets store mirrored.
fn is_canonical(i: OriginalAtomIndex, neighbor: TranslatedAtomIndex) -> bool {
    let mine = (i.0, neighbor.lattice);
    let mirrored = (neighbor.original.0, neighbor.lattice.reversed());
    mine < mirrored
}

/// Classifies every pair in `constraining` as a bond or leaves it
/// unbonded, then prunes bonds that push any atom's coordination outside
/// its species' declared constraints, and finally assembles the five pair
/// lists the optimizer holds fixed for one phase (`spec.md` §4.7).
pub fn derive_bond_graph(manager: &mut ConstraintManager) -> ObjectivePairLists {
    classify_constraining_pairs(manager);
    resolve_coordination_violations(manager);
    assemble_pair_lists(manager)
}

fn classify_constraining_pairs(manager: &mut ConstraintManager) {
    let eps = manager.params.feasible_error_rate;
    let constraining = manager.constraining.clone();

    for pair in &constraining {
        let si = manager.structure.species_of(pair.central.0);
        let sj = manager.structure.species_of(pair.neighbor.original.0);
        let interaction = classify(si, sj);
        let translation = manager.structure.cell.to_translation(&pair.neighbor.lattice);
        let d = manager.structure.atoms[pair.neighbor.original.0].position + translation
            - manager.structure.atoms[pair.central.0].position;
        let distance_sq = d.norm_squared();

        match interaction {
            Interaction::Attractive
                if innate_ionic_bondable(si, sj) && Predicates::feasible_ionic_bond(distance_sq, si, sj, eps) =>
            {
                manager.create_bond(RelationKind::Ionic, pair.central, pair.neighbor);
            }
            Interaction::Neutral
                if innate_covalent_bondable(si, sj) && Predicates::feasible_covalent_bond(distance_sq, si, sj, eps) =>
            {
                manager.create_bond(RelationKind::Covalent, pair.central, pair.neighbor);
            }
            _ => {}
        }
    }
}

/// `spec.md` §4.7 step 2: drop the longest bond of the offending channel
/// while a central atom's coordination composition *exceeds* its species'
/// declared upper bound (too many bonds, or a forbidden element) — never
/// merely because it hasn't yet reached a feasible composition. A
/// partially-formed polyhedron still being built up by earlier phases must
/// survive this pass (`CoordinationConstraints::exceeds_declared_upper_bound`).
fn resolve_coordination_violations(manager: &mut ConstraintManager) {
    let n = manager.structure.atoms.len();
    for i in 0..n {
        let atom_index = OriginalAtomIndex(i);
        loop {
            let composition = coordination_composition(manager, atom_index);
            let species = manager.structure.species_of(i);
            if !species.coordination.exceeds_declared_upper_bound(&composition) {
                break;
            }
            let ordered = ordered_bonded_indices(manager, atom_index);
            let Some(&(_, longest)) = ordered.last() else {
                break;
            };
            let kind = if manager.structure.atoms[i].covalent_bonds.contains(&longest) {
                RelationKind::Covalent
            } else {
                RelationKind::Ionic
            };
            manager.erase_bond(kind, atom_index, longest);
        }
    }
}

fn assemble_pair_lists(manager: &ConstraintManager) -> ObjectivePairLists {
    let mut lists = ObjectivePairLists::default();
    let n = manager.structure.atoms.len();

    for i in 0..n {
        let atom_index = OriginalAtomIndex(i);
        for &neighbor in &manager.structure.atoms[i].covalent_bonds {
            if is_canonical(atom_index, neighbor) {
                lists.covalent_bonded.push(PairIndices::new(atom_index, neighbor));
            }
        }
        for &neighbor in &manager.structure.atoms[i].ionic_bonds {
            if is_canonical(atom_index, neighbor) {
                lists.ionic_bonded.push(PairIndices::new(atom_index, neighbor));
            }
        }
    }

    for pair in &manager.constraining {
        let atom = &manager.structure.atoms[pair.central.0];
        if atom.covalent_bonds.contains(&pair.neighbor) || atom.ionic_bonds.contains(&pair.neighbor) {
            continue;
        }
        let si = manager.structure.species_of(pair.central.0);
        let sj = manager.structure.species_of(pair.neighbor.original.0);
        match classify(si, sj) {
            Interaction::Repulsive => lists.ionic_repulsed.push(*pair),
            Interaction::Neutral => lists.covalent_excluded.push(*pair),
            Interaction::Attractive => lists.ionic_excluded.push(*pair),
        }
    }

    lists
}
