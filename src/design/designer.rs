use thiserror::Error;

use crate::constraints::polyhedra::{erase_infeasible_chemical_bonds, has_feasible_coordination_composition};
use crate::constraints::ConstraintManager;
use crate::design::bondgraph::derive_bond_graph;
use crate::error::DesignOutcome;
use crate::model::{CellError, OriginalAtomIndex};
use crate::optimize::{MoleculeOptimizer, OptimizerParams};

/// One of the three relaxation phases a design attempt runs through
/// (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Global,
    Local,
    Precise,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Global, Phase::Local, Phase::Precise];
}

/// A phase's own error tolerance and optimizer parameters
/// (`spec.md` §4.6: "Each phase uses its own optimizer parameters").
#[derive(Debug, Clone, Copy)]
pub struct PhaseParams {
    pub phase: Phase,
    pub error_rate: f64,
    pub optimizer: OptimizerParams,
}

impl PhaseParams {
    /// Defaults grounded in `original_source/src/StructuralOptimizationParameters.cpp`'s
    /// `s_default*` statics, already expressed in this crate's internal
    /// length unit (see `SPEC_FULL.md` §4.6, `crate::config::LENGTH_SCALE`
    /// for the angstrom conversion applied to values coming from a config
    /// file rather than these compiled-in defaults).
    pub fn default_for(phase: Phase) -> Self {
        let (iterations, initial, final_, error_rate) = match phase {
            Phase::Global => (25, 0.5, 0.5, 1.0),
            Phase::Local => (2000, 0.3, 0.05, 0.1),
            Phase::Precise => (4000, 0.1, 0.005, 0.05),
        };
        PhaseParams {
            phase,
            error_rate,
            optimizer: OptimizerParams {
                pressure: 1.0,
                attractive_force_constant: 30.0,
                repulsive_force_constant: -100.0,
                iterations,
                initial_max_atomic_displacement: initial,
                final_max_atomic_displacement: final_,
                max_unit_cell_displacement_factor: 0.02,
            },
        }
    }

    pub fn default_triple() -> [PhaseParams; 3] {
        [
            PhaseParams::default_for(Phase::Global),
            PhaseParams::default_for(Phase::Local),
            PhaseParams::default_for(Phase::Precise),
        ]
    }
}

/// Restart bookkeeping `spec.md` §4.6 names (`max_total_optimizing`,
/// `max_ceaseless_global`) without giving concrete defaults; see
/// `SPEC_FULL.md` §4.6+ and `DESIGN.md` for the chosen values.
#[derive(Debug, Clone, Copy)]
pub struct DesignerParams {
    pub max_inner_restarts_per_phase: usize,
    pub max_total_optimizing: usize,
    pub max_ceaseless_global: usize,
}

impl Default for DesignerParams {
    fn default() -> Self {
        Self {
            max_inner_restarts_per_phase: 10,
            max_total_optimizing: 25,
            max_ceaseless_global: 5,
        }
    }
}

/// Attempt-scoped numerical failures (`spec.md` §5, §7): exceeding a policy
/// timeout, or the cell becoming degenerate during a displacement step.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("tracer rebuild timeout exceeded")]
    TracerTimeoutExceeded,
    #[error("unit cell reduction timeout exceeded")]
    CellReductionTimeoutExceeded,
    #[error("unit cell became degenerate during relaxation: {0}")]
    Cell(#[from] CellError),
}

/// The global->local->precise pipeline with restart policy
/// (`spec.md` §4.6, `crate::constraints::ConstraintManager` composed in
/// rather than subclassed per the Design Notes).
pub struct CrystalDesigner {
    pub designer_params: DesignerParams,
    pub phases: [PhaseParams; 3],
}

impl Default for CrystalDesigner {
    fn default() -> Self {
        Self {
            designer_params: DesignerParams::default(),
            phases: PhaseParams::default_triple(),
        }
    }
}

impl CrystalDesigner {
    pub fn new(designer_params: DesignerParams, phases: [PhaseParams; 3]) -> Self {
        Self { designer_params, phases }
    }

    fn is_feasible(manager: &ConstraintManager, pairs: &crate::optimize::ObjectivePairLists) -> bool {
        pairs.is_feasible(&manager.structure, &manager.params)
            && (0..manager.structure.atoms.len())
                .all(|i| has_feasible_coordination_composition(manager, OriginalAtomIndex(i)))
    }

    /// One design attempt on a candidate structure's constraint manager
    /// (`spec.md` §4.6 steps 1-6). Returns `Ok(true)` if the phase reached
    /// feasibility within its inner restart budget.
    fn run_phase(
        &self,
        manager: &mut ConstraintManager,
        phase: &PhaseParams,
        tracer_calls: &mut usize,
    ) -> Result<bool, DesignError> {
        manager.params.feasible_error_rate = phase.error_rate;

        for _inner_restart in 0..=self.designer_params.max_inner_restarts_per_phase {
            *tracer_calls += 1;
            if *tracer_calls > manager.params.tracer_timeout {
                return Err(DesignError::TracerTimeoutExceeded);
            }
            manager.update_tracing_pairs();
            manager.update_constraining_pairs();

            let pairs = derive_bond_graph(manager);
            MoleculeOptimizer::run(&mut manager.structure, &pairs, &phase.optimizer)?;
            erase_infeasible_chemical_bonds(manager);

            if Self::is_feasible(manager, &pairs) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn total_bond_count(manager: &ConstraintManager) -> usize {
        manager
            .structure
            .atoms
            .iter()
            .map(|a| a.covalent_bonds.len() + a.ionic_bonds.len())
            .sum()
    }

    /// Top-level `execute` (`spec.md` §4.6 "Global restart"): runs up to
    /// `max_total_optimizing` phase passes and up to `max_ceaseless_global`
    /// consecutive global phases without bond-count progress before
    /// surfacing whatever structure resulted as infeasible.
    pub fn execute(&self, mut manager: ConstraintManager) -> Result<DesignOutcome, DesignError> {
        let mut tracer_calls = 0usize;
        let mut cell_reduction_calls = 0usize;
        let mut total_optimizing = 0usize;
        let mut ceaseless_global = 0usize;

        'outer: while total_optimizing < self.designer_params.max_total_optimizing {
            for phase in &self.phases {
                if total_optimizing >= self.designer_params.max_total_optimizing {
                    break 'outer;
                }
                total_optimizing += 1;

                let bonds_before = Self::total_bond_count(&manager);
                let feasible = self.run_phase(&mut manager, phase, &mut tracer_calls)?;
                if feasible {
                    return Ok(DesignOutcome::Feasible(manager.structure));
                }

                if phase.phase == Phase::Global {
                    let bonds_after = Self::total_bond_count(&manager);
                    if bonds_after <= bonds_before {
                        ceaseless_global += 1;
                    } else {
                        ceaseless_global = 0;
                    }
                    if ceaseless_global >= self.designer_params.max_ceaseless_global {
                        break 'outer;
                    }
                }
            }

            cell_reduction_calls += 1;
            if cell_reduction_calls > manager.params.unit_cell_reduction_timeout {
                return Err(DesignError::CellReductionTimeoutExceeded);
            }
            manager.normalize_fractional_coordinates();
        }

        Ok(DesignOutcome::Infeasible(manager.structure))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use nalgebra::Vector3;

    use crate::constraints::ConstraintParams;
    use crate::model::{
        Atom, CompositionMultiset, CoordinationConstraints, CrystalStructure, IonicAtomicNumber, RadiusRange,
        Species, UnitCell,
    };

    use super::*;

    fn na_cl_species() -> Vec<Species> {
        let mut na_comp: HashSet<CompositionMultiset> = HashSet::new();
        let mut m = CompositionMultiset::new();
        m.insert("Cl".to_string(), 1);
        na_comp.insert(m);

        let na = Species {
            symbol: "Na".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(na_comp),
        };

        let mut cl_comp: HashSet<CompositionMultiset> = HashSet::new();
        let mut m = CompositionMultiset::new();
        m.insert("Na".to_string(), 1);
        cl_comp.insert(m);

        let cl = Species {
            symbol: "Cl".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 17, charge: -1 },
            covalent_radius: RadiusRange::new(1.7, 1.9),
            ionic_radius: RadiusRange::new(1.7, 1.9),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(cl_comp),
        };

        vec![na, cl]
    }

    #[test]
    fn trivial_diatomic_reaches_feasible_s1() {
        let cell = UnitCell::cubic(10.0);
        let atoms = vec![
            Atom::new(0, Vector3::new(5.0, 5.0, 5.0)),
            Atom::new(1, Vector3::new(5.0, 5.0, 5.1)),
        ];
        let structure = CrystalStructure::new(cell, atoms, Arc::new(na_cl_species()));
        let manager = ConstraintManager::new(structure, ConstraintParams::default());

        let designer = CrystalDesigner::default();
        let outcome = designer.execute(manager).expect("no attempt-scoped failure");

        match outcome {
            DesignOutcome::Feasible(structure) => {
                let d = (structure.atoms[1].position - structure.atoms[0].position).norm();
                assert!(d >= 2.6 && d <= 3.0, "bond distance {d} outside [2.6, 3.0]");
            }
            DesignOutcome::Infeasible(_) => panic!("expected feasible structure"),
            DesignOutcome::Exceptional { reason, .. } => panic!("unexpected exceptional outcome: {reason}"),
        }
    }

    #[test]
    fn tracer_timeout_surfaces_as_error() {
        let cell = UnitCell::cubic(10.0);
        let atoms = vec![
            Atom::new(0, Vector3::new(5.0, 5.0, 5.0)),
            Atom::new(1, Vector3::new(5.0, 5.0, 5.1)),
        ];
        let structure = CrystalStructure::new(cell, atoms, Arc::new(na_cl_species()));
        let mut params = ConstraintParams::default();
        params.tracer_timeout = 0;
        let manager = ConstraintManager::new(structure, params);

        let designer = CrystalDesigner::new(
            DesignerParams { max_inner_restarts_per_phase: 10, max_total_optimizing: 25, max_ceaseless_global: 5 },
            PhaseParams::default_triple(),
        );
        let outcome = designer.execute(manager);
        assert!(matches!(outcome, Err(DesignError::TracerTimeoutExceeded)));
    }
}
