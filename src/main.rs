use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;

use crystal_predictor::config;
use crystal_predictor::design::{CrystalDesigner, DesignerParams};
use crystal_predictor::generator::{CompositionCount, GeneratorParams};
use crystal_predictor::io::{JsonStructureWriter, UnitSymmetryService};
use crystal_predictor::pool::{CompositionJob, CrystalPredictor, PoolEvent};

/// Headless batch predictor: loads a parameter file, generates random
/// initial structures for a target composition, relaxes each through
/// `CrystalDesigner`, and writes every feasible result to `--output`
/// (`spec.md` §1, §6 "Exit semantics"). No TUI — progress is observed
/// through `log` records, per the teacher's own `setup_panic_hook`/
/// `thread::Builder` idiom minus the terminal-restoring behavior this
/// crate has no terminal to restore.
#[derive(Parser, Debug)]
#[command(author, version, about = "Constraint-driven crystal structure predictor", long_about = None)]
struct Args {
    /// Path to the parameter file (key/value + &FEASIBLE_COORDINATION_COMPOSITIONS block).
    #[arg(short, long)]
    config: PathBuf,

    /// Target composition as `Symbol:count` pairs, e.g. `Na:4,Cl:4`.
    #[arg(long)]
    composition: String,

    /// Directory to write produced structures into.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Total number of design attempts to spend on this composition.
    #[arg(long, default_value_t = 100)]
    attempts: usize,

    /// Number of simulated ranks (in-process, barrier-synchronised).
    #[arg(long, default_value_t = 1)]
    ranks: usize,

    /// Worker threads per rank.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Base seed for reproducible per-attempt seeding.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("panic: {panic_info}");
        original_hook(panic_info);
    }));
}

/// Parses `Symbol:count,Symbol:count` into species-index/count pairs against
/// the loaded species table.
fn parse_composition(text: &str, species: &[crystal_predictor::model::Species]) -> Result<Vec<CompositionCount>> {
    let mut composition = Vec::new();
    for entry in text.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (symbol, count) = entry
            .split_once(':')
            .with_context(|| format!("malformed composition entry: {entry}"))?;
        let count: usize = count.trim().parse().with_context(|| format!("malformed count in: {entry}"))?;
        let species_index = species
            .iter()
            .position(|s| s.symbol == symbol.trim())
            .with_context(|| format!("unknown species in composition: {symbol}"))?;
        composition.push(CompositionCount { species_index, count });
    }
    Ok(composition)
}

fn main() -> Result<()> {
    env_logger::init();
    setup_panic_hook();

    let args = Args::parse();

    let config_text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config file {}", args.config.display()))?;
    let run_config = config::parse(&config_text).context("failed to parse configuration")?;

    let constraint_params = run_config.build_constraint_params().context("invalid constraint parameters")?;
    let phases = run_config.build_phases().context("invalid optimizer parameters")?;
    let species = Arc::new(run_config.build_species().context("invalid species table")?);

    let composition = parse_composition(&args.composition, &species)?;

    let designer = Arc::new(CrystalDesigner::new(DesignerParams::default(), phases));
    let predictor = CrystalPredictor {
        ranks: args.ranks,
        workers_per_rank: args.workers,
        designer,
        constraint_params,
        generator_params: GeneratorParams::default(),
        species,
        writer: Arc::new(JsonStructureWriter),
        symmetry: Arc::new(UnitSymmetryService),
        output_dir: args.output,
        seed: args.seed,
    };

    let job = CompositionJob { label: args.composition.replace([':', ','], "_"), composition, attempt_budget: args.attempts };

    let (tx, rx) = unbounded();
    let drain = std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            match event {
                PoolEvent::Log(message) => log::info!("{message}"),
                PoolEvent::AttemptCompleted { composition, rank, worker, bucket } => {
                    log::debug!("rank {rank} worker {worker}: {composition} -> {bucket}");
                }
                PoolEvent::RankFinished { composition, rank } => {
                    log::info!("rank {rank} finished composition {composition}");
                }
            }
        }
    });

    let summaries = predictor.run(&[job], tx);
    drop(drain.join());

    for summary in &summaries {
        log::info!(
            "finished: {} feasible, {} infeasible, {} exceptional ({} total)",
            summary.feasible,
            summary.infeasible,
            summary.exceptional,
            summary.total()
        );
    }
    log::info!("all ranks finished");

    Ok(())
}
