use std::collections::HashMap;

use crate::io::fingerprint::{normalized_composition, SymmetryService};
use crate::model::CrystalStructure;

/// Supplemented feature: `spec.md` §1 mentions the system "optionally
/// extracts isotypic or 'promising' subsets from existing libraries" but
/// the distilled spec gives it no component section. Grounded on the
/// evident intent of `original_source/_INDEX.md`'s
/// `CrystalOptimalityAnalyzer.h` / `ExtractCrystals.h` / filenames (their
/// bodies were not read; see `SPEC_FULL.md` §9+).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct OptimalityScore(pub f64);

/// Sum of |distance - midpoint([min,max])| over every covalent/ionic bond
/// in the structure's current constraint state; lower is "more optimal"
/// (closer to the center of each species pair's allowed range), analogous
/// to `CrystalOptimalityAnalyzer`.
pub fn optimality_score(structure: &CrystalStructure) -> OptimalityScore {
    let mut total = 0.0;
    for atom in &structure.atoms {
        let si = &structure.species[atom.species_index];
        for neighbor in atom.covalent_bonds.iter().chain(atom.ionic_bonds.iter()) {
            let sj = &structure.species[structure.atoms[neighbor.original.0].species_index];
            let translation = structure.cell.to_translation(&neighbor.lattice);
            let distance = (structure.atoms[neighbor.original.0].position + translation - atom.position).norm();
            let (min, max) = if atom.covalent_bonds.contains(neighbor) {
                (si.covalent_radius.min + sj.covalent_radius.min, si.covalent_radius.max + sj.covalent_radius.max)
            } else {
                (si.ionic_radius.min + sj.ionic_radius.min, si.ionic_radius.max + sj.ionic_radius.max)
            };
            let midpoint = (min + max) / 2.0;
            total += (distance - midpoint).abs();
        }
    }
    OptimalityScore(total)
}

/// Sorts by `optimality_score` ascending and keeps the best `top_n`
/// (analogous to `PromisingCrystalExtractionParameters`-driven filtering).
pub fn extract_promising(structures: &[CrystalStructure], top_n: usize) -> Vec<&CrystalStructure> {
    let mut scored: Vec<(&CrystalStructure, OptimalityScore)> =
        structures.iter().map(|s| (s, optimality_score(s))).collect();
    scored.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_n).map(|(s, _)| s).collect()
}

/// Groups produced structures by `(normalised composition, space group)`
/// (analogous to `ExtractCrystals`/`CrystalExtractionTask`'s isotypic
/// grouping), keyed on the same fingerprint components used for on-disk
/// output (`spec.md` §6).
pub fn group_isotypic(
    structures: &[CrystalStructure],
    symmetry: &dyn SymmetryService,
) -> HashMap<(String, u32), Vec<usize>> {
    let mut groups: HashMap<(String, u32), Vec<usize>> = HashMap::new();
    for (index, structure) in structures.iter().enumerate() {
        let composition = normalized_composition(structure);
        let formula: String = composition.iter().map(|(symbol, count)| format!("{symbol}{count}")).collect();
        let space_group = symmetry.space_group_number(structure);
        groups.entry((formula, space_group)).or_default().push(index);
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nalgebra::Vector3;

    use crate::io::fingerprint::UnitSymmetryService;
    use crate::model::{Atom, CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, RadiusRange, Species, UnitCell};

    use super::*;

    fn na_species() -> Arc<Vec<Species>> {
        let comp = std::collections::HashSet::from([CompositionMultiset::new()]);
        Arc::new(vec![Species {
            symbol: "Na".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(comp),
        }])
    }

    #[test]
    fn groups_by_composition_and_space_group() {
        let species = na_species();
        let a = CrystalStructure::new(UnitCell::cubic(10.0), vec![Atom::new(0, Vector3::zeros())], species.clone());
        let b = CrystalStructure::new(UnitCell::cubic(12.0), vec![Atom::new(0, Vector3::zeros())], species);
        let groups = group_isotypic(&[a, b], &UnitSymmetryService);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&("Na1".to_string(), 1)].len(), 2);
    }

    #[test]
    fn extract_promising_keeps_best_n() {
        let species = na_species();
        let a = CrystalStructure::new(UnitCell::cubic(10.0), vec![Atom::new(0, Vector3::zeros())], species.clone());
        let b = CrystalStructure::new(UnitCell::cubic(10.0), vec![Atom::new(0, Vector3::zeros())], species);
        let structures = vec![a, b];
        let top = extract_promising(&structures, 1);
        assert_eq!(top.len(), 1);
    }
}
