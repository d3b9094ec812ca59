pub mod manager;
pub mod polyhedra;
pub mod predicates;

pub use manager::{ConstraintManager, RelationKind};
pub use predicates::{classify, ConstraintParams, Interaction, Predicates};
