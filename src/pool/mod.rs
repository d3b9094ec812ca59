pub mod predictor;
pub mod report;

pub use predictor::{CompositionJob, CrystalPredictor, RankGroup};
pub use report::{PoolEvent, PoolSummary};
