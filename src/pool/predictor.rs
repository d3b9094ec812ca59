use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::Mutex as PLMutex;

use crate::constraints::{ConstraintManager, ConstraintParams};
use crate::design::CrystalDesigner;
use crate::error::DesignOutcome;
use crate::generator::{generate_initial_structure, CompositionCount, GeneratorParams};
use crate::io::{compute_fingerprint, SymmetryService};
use crate::io::StructureWriter;
use crate::model::Species;

use super::report::{PoolEvent, PoolSummary};

/// Stands in for an MPI rank (`spec.md` §4.8 "Scheduling model" names ranks
/// and per-rank worker threads without pinning down the transport). This
/// crate runs every "rank" as an in-process OS thread synchronised with
/// `std::sync::Barrier` rather than linking MPI (`SPEC_FULL.md` §4.8+,
/// `DESIGN.md`); a real deployment would implement this trait over actual
/// rank communication instead.
pub trait RankGroup: Send + Sync {
    fn rank_index(&self) -> usize;
    fn rank_count(&self) -> usize;
    fn barrier(&self);
}

struct InProcessRankGroup {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
}

impl RankGroup for InProcessRankGroup {
    fn rank_index(&self) -> usize {
        self.rank
    }

    fn rank_count(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// Divides `total` attempts across `ranks` as evenly as possible, giving
/// the remainder to the lowest-numbered ranks.
fn rank_share(total: usize, ranks: usize, rank: usize) -> usize {
    let base = total / ranks;
    let remainder = total % ranks;
    base + usize::from(rank < remainder)
}

/// Counter protocol (`spec.md` §4.8 "Counter protocol"): every worker calls
/// `should_design` to claim the next attempt index, stopping once the
/// rank's share is exhausted. No attempt is ever cancelled mid-flight; the
/// counter only gates which attempts start. Guarded by `parking_lot::Mutex`
/// per `SPEC_FULL.md` §5+ (the teacher's declared-but-unused concurrency
/// primitive, given an actual job here).
struct SharedCounter {
    claimed: PLMutex<usize>,
    cap: usize,
}

impl SharedCounter {
    fn new(cap: usize) -> Self {
        Self { claimed: PLMutex::new(0), cap }
    }

    fn should_design(&self) -> Option<usize> {
        let mut claimed = self.claimed.lock();
        if *claimed >= self.cap {
            None
        } else {
            let attempt = *claimed;
            *claimed += 1;
            Some(attempt)
        }
    }
}

/// One target composition and how many feasible-or-not attempts to spend
/// searching it (`spec.md` §4.8).
#[derive(Debug, Clone)]
pub struct CompositionJob {
    pub label: String,
    pub composition: Vec<CompositionCount>,
    pub attempt_budget: usize,
}

/// The producer pool (`spec.md` §4.8): two-level scheduling over ranks and,
/// within each rank, worker threads racing a shared counter. Built on
/// `crate::design::CrystalDesigner` + `crate::generator`; writes every
/// feasible structure through `StructureWriter` and reports a per-bucket
/// tally through `PoolEvent`s.
pub struct CrystalPredictor {
    pub ranks: usize,
    pub workers_per_rank: usize,
    pub designer: Arc<CrystalDesigner>,
    pub constraint_params: ConstraintParams,
    pub generator_params: GeneratorParams,
    pub species: Arc<Vec<Species>>,
    pub writer: Arc<dyn StructureWriter>,
    pub symmetry: Arc<dyn SymmetryService>,
    pub output_dir: PathBuf,
    pub seed: u64,
}

impl CrystalPredictor {
    /// Runs every job to completion and returns one `PoolSummary` per job,
    /// in the same order as `jobs`. `events` is best-effort: a full or
    /// disconnected receiver never blocks or aborts a worker.
    pub fn run(&self, jobs: &[CompositionJob], events: Sender<PoolEvent>) -> Vec<PoolSummary> {
        std::fs::create_dir_all(&self.output_dir).ok();

        let barrier = Arc::new(Barrier::new(self.ranks));
        let summaries: Arc<Vec<Mutex<PoolSummary>>> =
            Arc::new(jobs.iter().map(|_| Mutex::new(PoolSummary::default())).collect());

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.ranks);
            for rank in 0..self.ranks {
                let rank_group = InProcessRankGroup { rank, size: self.ranks, barrier: barrier.clone() };
                let jobs = jobs;
                let summaries = summaries.clone();
                let events = events.clone();
                handles.push(scope.spawn(move || {
                    self.run_rank(&rank_group, jobs, &summaries, &events);
                }));
            }
            for handle in handles {
                handle.join().expect("pool rank thread panicked");
            }
        });

        summaries.iter().map(|m| *m.lock().expect("summary mutex poisoned")).collect()
    }

    fn run_rank(
        &self,
        rank_group: &dyn RankGroup,
        jobs: &[CompositionJob],
        summaries: &[Mutex<PoolSummary>],
        events: &Sender<PoolEvent>,
    ) {
        for (job_index, job) in jobs.iter().enumerate() {
            let cap = rank_share(job.attempt_budget, rank_group.rank_count(), rank_group.rank_index());
            let counter = SharedCounter::new(cap);
            let log_stride = (cap / 10).max(1);

            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(self.workers_per_rank);
                for worker in 0..self.workers_per_rank {
                    let counter = &counter;
                    let summary = &summaries[job_index];
                    handles.push(scope.spawn(move || {
                        self.run_worker(rank_group.rank_index(), worker, job, counter, log_stride, summary, events);
                    }));
                }
                for handle in handles {
                    handle.join().expect("pool worker thread panicked");
                }
            });

            let _ = events.send(PoolEvent::RankFinished { composition: job.label.clone(), rank: rank_group.rank_index() });
            rank_group.barrier();
        }
    }

    fn run_worker(
        &self,
        rank: usize,
        worker: usize,
        job: &CompositionJob,
        counter: &SharedCounter,
        log_stride: usize,
        summary: &Mutex<PoolSummary>,
        events: &Sender<PoolEvent>,
    ) {
        while let Some(attempt) = counter.should_design() {
            let seed = self.seed ^ ((rank as u64) << 48) ^ ((worker as u64) << 32) ^ attempt as u64;
            let bucket = self.run_one_attempt(job, seed);

            {
                let mut summary = summary.lock().expect("summary mutex poisoned");
                summary.record(bucket);
            }
            if attempt % log_stride == 0 {
                log::info!("rank {rank} worker {worker}: {} attempt {attempt}/{} ({bucket})", job.label, counter.cap);
            }
            let _ = events.send(PoolEvent::AttemptCompleted {
                composition: job.label.clone(),
                rank,
                worker,
                bucket,
            });
        }
    }

    fn run_one_attempt(&self, job: &CompositionJob, seed: u64) -> &'static str {
        let structure = match generate_initial_structure(&job.composition, &self.species, seed, &self.generator_params) {
            Some(structure) => structure,
            None => return "exceptional",
        };
        let manager = ConstraintManager::new(structure, self.constraint_params);
        let designer = self.designer.clone();

        let outcome = catch_unwind(AssertUnwindSafe(|| designer.execute(manager)));
        let outcome = match outcome {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => DesignOutcome::Exceptional { reason: error.to_string(), partial: None },
            Err(_) => DesignOutcome::Exceptional { reason: "design attempt panicked".to_string(), partial: None },
        };

        let bucket = outcome.bucket();
        if let DesignOutcome::Feasible(structure) = &outcome {
            let fingerprint = compute_fingerprint(structure, self.symmetry.as_ref());
            let path = self.output_dir.join(format!("{}_{seed:020}.json", job.label));
            if let Err(error) = self.writer.write(&path, structure, &fingerprint) {
                log::warn!("failed to write structure {seed} for {}: {error}", job.label);
            }
        }
        bucket
    }
}
