use std::collections::HashSet;
use std::sync::Arc;

use crystal_predictor::config;
use crystal_predictor::design::{CrystalDesigner, DesignerParams};
use crystal_predictor::generator::{CompositionCount, GeneratorParams};
use crystal_predictor::io::{JsonStructureWriter, UnitSymmetryService};
use crystal_predictor::model::{CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, RadiusRange, Species};
use crystal_predictor::pool::{CompositionJob, CrystalPredictor};

const NACL_CONFIG: &str = r#"
# minimal NaCl parameter file
Pressure 0.0
Number.of.Iterative.Balance.Steps 20

&FEASIBLE_COORDINATION_COMPOSITIONS
Na+1 Cl_1
Cl-1 Na_1
&END
"#;

fn nacl_species() -> Vec<Species> {
    let mut na_comp = CompositionMultiset::new();
    na_comp.insert("Cl".to_string(), 1);
    let mut cl_comp = CompositionMultiset::new();
    cl_comp.insert("Na".to_string(), 1);

    vec![
        Species {
            symbol: "Na".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(HashSet::from([na_comp])),
        },
        Species {
            symbol: "Cl".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 17, charge: -1 },
            covalent_radius: RadiusRange::new(1.7, 1.9),
            ionic_radius: RadiusRange::new(1.7, 1.9),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(HashSet::from([cl_comp])),
        },
    ]
}

#[test]
fn config_file_parses_and_builds_species_matching_builtin_table() {
    let run_config = config::parse(NACL_CONFIG).expect("valid config");
    let species = run_config.build_species().expect("species built from config");

    let mut symbols: Vec<&str> = species.iter().map(|s| s.symbol.as_str()).collect();
    symbols.sort();
    assert_eq!(symbols, vec!["Cl", "Na"]);

    let constraint_params = run_config.build_constraint_params().expect("constraint params");
    assert!(constraint_params.feasible_error_rate > 0.0);
}

#[test]
fn pool_produces_a_summary_for_every_requested_attempt() {
    let run_config = config::parse(NACL_CONFIG).expect("valid config");
    let phases = run_config.build_phases().expect("phases");
    let constraint_params = run_config.build_constraint_params().expect("constraint params");

    let species = Arc::new(nacl_species());
    let designer = Arc::new(CrystalDesigner::new(DesignerParams::default(), phases));
    let dir = tempfile::tempdir().expect("temp dir");

    let predictor = CrystalPredictor {
        ranks: 2,
        workers_per_rank: 2,
        designer,
        constraint_params,
        generator_params: GeneratorParams::default(),
        species,
        writer: Arc::new(JsonStructureWriter),
        symmetry: Arc::new(UnitSymmetryService),
        output_dir: dir.path().to_path_buf(),
        seed: 7,
    };

    let job = CompositionJob {
        label: "NaCl".to_string(),
        composition: vec![
            CompositionCount { species_index: 0, count: 1 },
            CompositionCount { species_index: 1, count: 1 },
        ],
        attempt_budget: 8,
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let summaries = predictor.run(&[job], tx);
    drop(rx);

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total(), 8);
}
