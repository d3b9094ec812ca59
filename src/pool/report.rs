/// Progress events a worker thread emits back to whoever is driving the
/// pool (`spec.md` §5: "progress is observable, not just the final
/// output"). Repurposes the teacher's `SolverEvent`/`crossbeam_channel`
/// pattern (`engine`/`solvers::SolverEvent`) now that there is no TUI to
/// consume it — a caller (e.g. `main`) can log these, or drop the
/// receiver entirely, since `run` never blocks on a full channel.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A free-form diagnostic line, mirroring `SolverEvent::Log`.
    Log(String),
    /// One design attempt finished; `bucket` is `DesignOutcome::bucket()`.
    AttemptCompleted { composition: String, rank: usize, worker: usize, bucket: &'static str },
    /// A rank has exhausted its share of a composition's attempt budget.
    RankFinished { composition: String, rank: usize },
}

/// Per-composition tally returned by `CrystalPredictor::run`
/// (`spec.md` §4.8: attempts bucket into feasible/infeasible/exceptional).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolSummary {
    pub feasible: usize,
    pub infeasible: usize,
    pub exceptional: usize,
}

impl PoolSummary {
    pub fn record(&mut self, bucket: &str) {
        match bucket {
            "feasible" => self.feasible += 1,
            "infeasible" => self.infeasible += 1,
            _ => self.exceptional += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.feasible + self.infeasible + self.exceptional
    }
}
