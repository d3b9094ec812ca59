use std::collections::BTreeMap;

use crate::model::CrystalStructure;

/// Space-group detection is named as an external collaborator
/// (`spec.md` §1, "a *symmetry service*"); only its interface is specified
/// here. `crate::extract::group_isotypic` and the on-disk fingerprint both
/// depend on this trait rather than a concrete symmetry analysis.
pub trait SymmetryService: Send + Sync {
    fn space_group_number(&self, structure: &CrystalStructure) -> u32;
}

/// Trivial implementation reporting space group 1 (P1, no symmetry) for
/// every structure. A real space-group analyzer is out of scope per
/// `spec.md` §1; this exists only so the fingerprint has a well-formed
/// space-group component.
pub struct UnitSymmetryService;

impl SymmetryService for UnitSymmetryService {
    fn space_group_number(&self, _structure: &CrystalStructure) -> u32 {
        1
    }
}

/// Element symbol -> count over the whole structure, independent of atom
/// ordering.
pub fn normalized_composition(structure: &CrystalStructure) -> BTreeMap<String, usize> {
    let mut composition = BTreeMap::new();
    for atom in &structure.atoms {
        *composition.entry(structure.species[atom.species_index].symbol.clone()).or_insert(0) += 1;
    }
    composition
}

/// Fingerprint derived from normalised composition + space group
/// (`spec.md` §6: "a fingerprint derived from normalised composition +
/// space group"), e.g. `"Cl4Na4#1"`.
pub fn compute_fingerprint(structure: &CrystalStructure, symmetry: &dyn SymmetryService) -> String {
    let composition = normalized_composition(structure);
    let formula: String = composition.iter().map(|(symbol, count)| format!("{symbol}{count}")).collect();
    let space_group = symmetry.space_group_number(structure);
    format!("{formula}#{space_group}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nalgebra::Vector3;

    use crate::model::{Atom, CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, RadiusRange, Species, UnitCell};

    use super::*;

    fn structure() -> CrystalStructure {
        let comp = std::collections::HashSet::from([CompositionMultiset::new()]);
        let species = Arc::new(vec![
            Species {
                symbol: "Na".to_string(),
                ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
                covalent_radius: RadiusRange::new(0.9, 1.1),
                ionic_radius: RadiusRange::new(0.9, 1.1),
                repulsion_radius: RadiusRange::new(0.5, 0.5),
                coordination: CoordinationConstraints::explicit(comp.clone()),
            },
            Species {
                symbol: "Cl".to_string(),
                ionic_atomic_number: IonicAtomicNumber { element: 17, charge: -1 },
                covalent_radius: RadiusRange::new(1.7, 1.9),
                ionic_radius: RadiusRange::new(1.7, 1.9),
                repulsion_radius: RadiusRange::new(0.5, 0.5),
                coordination: CoordinationConstraints::explicit(comp),
            },
        ]);
        let atoms = vec![Atom::new(0, Vector3::new(0.0, 0.0, 0.0)), Atom::new(1, Vector3::new(2.8, 0.0, 0.0))];
        CrystalStructure::new(UnitCell::cubic(10.0), atoms, species)
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let fp = compute_fingerprint(&structure(), &UnitSymmetryService);
        assert_eq!(fp, "Cl1Na1#1");
    }
}
