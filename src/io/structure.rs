use std::io;
use std::path::Path;

use crate::model::{CrystalStructure, StructureRecord};

/// Crystallographic I/O (reading/writing CIF-style containers) is named as
/// an external collaborator whose interface only is specified
/// (`spec.md` §1, §6). This trait is that boundary; `JsonStructureWriter`
/// is the one concrete implementation this crate ships, standing in for
/// the unspecified "crystallographic container" format.
pub trait StructureWriter: Send + Sync {
    fn write(&self, path: &Path, structure: &CrystalStructure, fingerprint: &str) -> io::Result<()>;
}

/// Serializes unit cell + species + cartesian coordinates + fingerprint as
/// JSON (`spec.md` §6: "one file per produced structure"). A real CIF
/// writer is explicitly out of scope (`spec.md` §1).
pub struct JsonStructureWriter;

impl StructureWriter for JsonStructureWriter {
    fn write(&self, path: &Path, structure: &CrystalStructure, fingerprint: &str) -> io::Result<()> {
        let record = StructureRecord::from_structure(structure, fingerprint.to_string());
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &record).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nalgebra::Vector3;
    use tempfile::tempdir;

    use crate::model::{Atom, CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, RadiusRange, Species, UnitCell};

    use super::*;

    #[test]
    fn writes_readable_json() {
        let comp = std::collections::HashSet::from([CompositionMultiset::new()]);
        let species = Arc::new(vec![Species {
            symbol: "Na".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(comp),
        }]);
        let atoms = vec![Atom::new(0, Vector3::new(1.0, 2.0, 3.0))];
        let structure = CrystalStructure::new(UnitCell::cubic(10.0), atoms, species);

        let dir = tempdir().unwrap();
        let path = dir.path().join("structure_0001.json");
        JsonStructureWriter.write(&path, &structure, "Na1#1").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let record: StructureRecord = serde_json::from_str(&contents).unwrap();
        assert_eq!(record.fingerprint, "Na1#1");
        assert_eq!(record.atoms.len(), 1);
    }
}
