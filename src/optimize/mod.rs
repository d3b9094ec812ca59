pub mod molecule;

pub use molecule::{MoleculeOptimizer, ObjectivePairLists, OptimizerParams};
