pub mod atom;
pub mod dictionary;
pub mod lattice;
pub mod species;
pub mod structure;

pub use atom::Atom;
pub use dictionary::{builtin_species_templates, SpeciesTemplate};
pub use lattice::{CellError, LatticePoint, OriginalAtomIndex, PairIndices, TranslatedAtomIndex, UnitCell};
pub use species::{
    covers, CompositionMultiset, CoordinationConstraintKind, CoordinationConstraints, IonicAtomicNumber,
    Polarity, RadiusRange, Species,
};
pub use structure::{AtomRecord, CrystalStructure, StructureRecord};
