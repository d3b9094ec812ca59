use thiserror::Error;

use crate::model::CrystalStructure;

/// Configuration errors abort the run (`spec.md` §7). Implemented with
/// `thiserror` per the ambient error-handling stack (`SPEC_FULL.md` §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration block: {block}")]
    MissingRequiredBlock { block: String },

    #[error("configuration key {key} has out-of-range value {value}")]
    OutOfRange { key: String, value: f64 },

    #[error("failed to parse configuration at line {line}: {source}")]
    ParseFailure {
        line: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("species {species} declares both explicit and bounded coordination constraints, or neither")]
    ConflictingCoordinationConstraints { species: String },
}

/// The outcome of one design attempt (`spec.md` §7). `Infeasible` is *not*
/// an error; it is a normal, loggable result routed to a different bucket.
pub enum DesignOutcome {
    Feasible(CrystalStructure),
    Infeasible(CrystalStructure),
    Exceptional { reason: String, partial: Option<CrystalStructure> },
}

impl DesignOutcome {
    pub fn bucket(&self) -> &'static str {
        match self {
            DesignOutcome::Feasible(_) => "feasible",
            DesignOutcome::Infeasible(_) => "infeasible",
            DesignOutcome::Exceptional { .. } => "exceptional",
        }
    }
}
