pub mod fingerprint;
pub mod structure;

pub use fingerprint::{compute_fingerprint, normalized_composition, SymmetryService, UnitSymmetryService};
pub use structure::{JsonStructureWriter, StructureWriter};
