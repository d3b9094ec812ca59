pub mod bondgraph;
pub mod designer;

pub use bondgraph::derive_bond_graph;
pub use designer::{CrystalDesigner, DesignError, DesignerParams, Phase, PhaseParams};
