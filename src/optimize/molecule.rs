use nalgebra::{Matrix3, Vector3};

use crate::model::{CrystalStructure, PairIndices};

/// The five fixed pair lists an optimizer run holds constant for its
/// duration (`spec.md` §4.5, grounded in
/// `original_source/include/ObjectiveMolecularStructure.h`).
#[derive(Debug, Clone, Default)]
pub struct ObjectivePairLists {
    pub covalent_bonded: Vec<PairIndices>,
    pub covalent_excluded: Vec<PairIndices>,
    pub ionic_bonded: Vec<PairIndices>,
    pub ionic_excluded: Vec<PairIndices>,
    pub ionic_repulsed: Vec<PairIndices>,
}

impl ObjectivePairLists {
    /// `ObjectiveMolecularStructure::isFeasible`: every bond/exclusion
    /// passes its feasibility predicate under `params`.
    pub fn is_feasible(&self, structure: &CrystalStructure, params: &crate::constraints::ConstraintParams) -> bool {
        use crate::constraints::Predicates;

        let error_rate = params.feasible_error_rate;
        let rho_ex = params.exclusive_radius_ratio;

        let displacement_sq = |pair: &PairIndices| -> f64 {
            let translation = structure.cell.to_translation(&pair.neighbor.lattice);
            let d = structure.atoms[pair.neighbor.original.0].position + translation
                - structure.atoms[pair.central.0].position;
            d.norm_squared()
        };

        self.covalent_bonded.iter().all(|p| {
            let (si, sj) = (structure.species_of(p.central.0), structure.species_of(p.neighbor.original.0));
            Predicates::feasible_covalent_bond(displacement_sq(p), si, sj, error_rate)
        }) && self.ionic_bonded.iter().all(|p| {
            let (si, sj) = (structure.species_of(p.central.0), structure.species_of(p.neighbor.original.0));
            Predicates::feasible_ionic_bond(displacement_sq(p), si, sj, error_rate)
        }) && self.covalent_excluded.iter().all(|p| {
            let (si, sj) = (structure.species_of(p.central.0), structure.species_of(p.neighbor.original.0));
            Predicates::feasible_covalent_exclusion(displacement_sq(p), si, sj, error_rate, rho_ex)
        }) && self.ionic_excluded.iter().all(|p| {
            let (si, sj) = (structure.species_of(p.central.0), structure.species_of(p.neighbor.original.0));
            Predicates::feasible_ionic_exclusion(displacement_sq(p), si, sj, error_rate, rho_ex)
        }) && self.ionic_repulsed.iter().all(|p| {
            let (si, sj) = (structure.species_of(p.central.0), structure.species_of(p.neighbor.original.0));
            Predicates::feasible_ionic_repulsion(displacement_sq(p), si, sj, error_rate)
        })
    }
}

/// Per-phase optimizer parameters (`spec.md` §4.5, §4.6, defaults grounded
/// in `original_source/src/StructuralOptimizationParameters.cpp`).
#[derive(Debug, Clone, Copy)]
pub struct OptimizerParams {
    pub pressure: f64,
    pub attractive_force_constant: f64,
    pub repulsive_force_constant: f64,
    pub iterations: usize,
    pub initial_max_atomic_displacement: f64,
    pub final_max_atomic_displacement: f64,
    pub max_unit_cell_displacement_factor: f64,
}

impl OptimizerParams {
    /// `δ_max^cell` is always derived from the *current* atomic cap, never
    /// cached — the fix for the load-order bug described in `spec.md` §9
    /// (see `SPEC_FULL.md` §4.5+ Open Question 2).
    pub fn max_unit_cell_displacement(&self, current_max_atomic_displacement: f64) -> f64 {
        current_max_atomic_displacement * self.max_unit_cell_displacement_factor
    }

    /// `γ = (δ_final / δ_initial)^(1/N)`.
    pub fn decay_factor(&self) -> f64 {
        if self.iterations == 0 || self.initial_max_atomic_displacement <= 0.0 {
            0.0
        } else {
            (self.final_max_atomic_displacement / self.initial_max_atomic_displacement)
                .powf(1.0 / self.iterations as f64)
        }
    }
}

fn clamp(v: Vector3<f64>, cap: f64) -> Vector3<f64> {
    let norm = v.norm();
    if norm > cap && norm > 0.0 {
        v * (cap / norm)
    } else {
        v
    }
}

fn accumulate_pair(
    structure: &CrystalStructure,
    pair: &PairIndices,
    min: f64,
    max: Option<f64>,
    params: &OptimizerParams,
    forces: &mut [Vector3<f64>],
    virial: &mut Matrix3<f64>,
) {
    let translation = structure.cell.to_translation(&pair.neighbor.lattice);
    let i = pair.central.0;
    let j = pair.neighbor.original.0;
    let d = structure.atoms[j].position + translation - structure.atoms[i].position;
    if let Some(force_on_i) = pair_force(d, min, max, params.repulsive_force_constant, params.attractive_force_constant) {
        forces[i] += force_on_i;
        forces[j] -= force_on_i;
        *virial += d * force_on_i.transpose();
    }
}

/// The force applied to the "central" atom of a pair at displacement `d`
/// (displacement applied to the neighbour is the negation). `spec.md` §4.5.
fn pair_force(d: Vector3<f64>, min: f64, max: Option<f64>, k_rep: f64, k_att: f64) -> Option<Vector3<f64>> {
    let distance_sq = d.norm_squared();
    if distance_sq < min * min {
        let distance = distance_sq.sqrt();
        if distance > 0.0 {
            Some(d / distance * k_rep)
        } else {
            None
        }
    } else if let Some(max) = max {
        if distance_sq > max * max {
            let distance = distance_sq.sqrt();
            Some(d / distance * k_att)
        } else {
            None
        }
    } else {
        None
    }
}

/// Force accumulation + atom/cell displacement relaxer (`spec.md` §4.5).
pub struct MoleculeOptimizer;

impl MoleculeOptimizer {
    /// Runs `params.iterations` relaxation steps on `structure`, holding
    /// `pairs` fixed for the whole run.
    pub fn run(
        structure: &mut CrystalStructure,
        pairs: &ObjectivePairLists,
        params: &OptimizerParams,
    ) -> Result<(), crate::model::CellError> {
        let n = structure.atoms.len();
        let mut max_atomic_displacement = params.initial_max_atomic_displacement;
        let gamma = params.decay_factor();

        for _ in 0..params.iterations {
            let mut forces = vec![Vector3::zeros(); n];
            let mut virial = Matrix3::<f64>::zeros();

            for pair in &pairs.covalent_bonded {
                let (si, sj) = (structure.species_of(pair.central.0), structure.species_of(pair.neighbor.original.0));
                let min = si.covalent_radius.min + sj.covalent_radius.min;
                let max = si.covalent_radius.max + sj.covalent_radius.max;
                accumulate_pair(structure, pair, min, Some(max), params, &mut forces, &mut virial);
            }
            for pair in &pairs.ionic_bonded {
                let (si, sj) = (structure.species_of(pair.central.0), structure.species_of(pair.neighbor.original.0));
                let min = si.ionic_radius.min + sj.ionic_radius.min;
                let max = si.ionic_radius.max + sj.ionic_radius.max;
                accumulate_pair(structure, pair, min, Some(max), params, &mut forces, &mut virial);
            }
            for pair in &pairs.covalent_excluded {
                let (si, sj) = (structure.species_of(pair.central.0), structure.species_of(pair.neighbor.original.0));
                let min = si.covalent_radius.max + sj.covalent_radius.max;
                accumulate_pair(structure, pair, min, None, params, &mut forces, &mut virial);
            }
            for pair in &pairs.ionic_excluded {
                let (si, sj) = (structure.species_of(pair.central.0), structure.species_of(pair.neighbor.original.0));
                let min = si.ionic_radius.max + sj.ionic_radius.max;
                accumulate_pair(structure, pair, min, None, params, &mut forces, &mut virial);
            }
            for pair in &pairs.ionic_repulsed {
                let (si, sj) = (structure.species_of(pair.central.0), structure.species_of(pair.neighbor.original.0));
                let min = si.repulsion_radius.min + sj.repulsion_radius.min;
                accumulate_pair(structure, pair, min, None, params, &mut forces, &mut virial);
            }

            for i in 0..n {
                structure.atoms[i].position += clamp(forces[i], max_atomic_displacement);
            }

            let delta_cell = compute_cell_displacement(&virial, structure.cell.volume(), params.pressure, max_atomic_displacement, params);
            let new_basis = structure.cell.basis() + delta_cell;
            structure.cell.set_basis(new_basis)?;

            max_atomic_displacement *= gamma;
        }

        Ok(())
    }
}

/// Hydrostatic-plus-virial cell update (`spec.md` §9 Open Question; formula
/// chosen and documented in `SPEC_FULL.md` §4.5+). Kept as a single named
/// function per the Design Notes' instruction.
fn compute_cell_displacement(
    virial: &Matrix3<f64>,
    volume: f64,
    pressure: f64,
    max_atomic_displacement: f64,
    params: &OptimizerParams,
) -> Matrix3<f64> {
    let virial_scale = if volume.abs() > 1e-12 { 1.0 / (3.0 * volume) } else { 0.0 };
    let raw = Matrix3::identity() * pressure + virial * virial_scale;
    let delta_cell_cap = params.max_unit_cell_displacement(max_atomic_displacement);
    let scaled = raw * (params.max_unit_cell_displacement_factor * max_atomic_displacement);
    scaled.map(|x| x.clamp(-delta_cell_cap, delta_cell_cap))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::model::{Atom, CompositionMultiset, CoordinationConstraints, IonicAtomicNumber, OriginalAtomIndex, RadiusRange, Species, TranslatedAtomIndex, UnitCell};

    use super::*;

    fn na_cl_structure() -> CrystalStructure {
        let na = Species {
            symbol: "Na".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 11, charge: 1 },
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(std::collections::HashSet::from([CompositionMultiset::new()])),
        };
        let cl = Species {
            symbol: "Cl".to_string(),
            ionic_atomic_number: IonicAtomicNumber { element: 17, charge: -1 },
            covalent_radius: RadiusRange::new(1.7, 1.9),
            ionic_radius: RadiusRange::new(1.7, 1.9),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
            coordination: CoordinationConstraints::explicit(std::collections::HashSet::from([CompositionMultiset::new()])),
        };
        let cell = UnitCell::cubic(10.0);
        let atoms = vec![
            Atom::new(0, Vector3::new(5.0, 5.0, 5.0)),
            Atom::new(1, Vector3::new(5.0, 5.0, 5.1)),
        ];
        CrystalStructure::new(cell, atoms, Arc::new(vec![na, cl]))
    }

    #[test]
    fn exclusion_force_pushes_atoms_apart_s1() {
        let mut structure = na_cl_structure();
        let pairs = ObjectivePairLists {
            ionic_repulsed: vec![PairIndices::new(
                OriginalAtomIndex(0),
                TranslatedAtomIndex::in_cell(OriginalAtomIndex(1)),
            )],
            ..Default::default()
        };

        let global_params = OptimizerParams {
            pressure: 0.0,
            attractive_force_constant: 30.0,
            repulsive_force_constant: -100.0,
            iterations: 1,
            initial_max_atomic_displacement: 0.5,
            final_max_atomic_displacement: 0.5,
            max_unit_cell_displacement_factor: 0.0,
        };
        MoleculeOptimizer::run(&mut structure, &pairs, &global_params).unwrap();

        let d = (structure.atoms[1].position - structure.atoms[0].position).norm();
        assert!(d > 0.1, "exclusion force should push atoms apart, got distance {d}");

        let local_pairs = ObjectivePairLists {
            ionic_bonded: vec![PairIndices::new(
                OriginalAtomIndex(0),
                TranslatedAtomIndex::in_cell(OriginalAtomIndex(1)),
            )],
            ..Default::default()
        };
        let local_params = OptimizerParams {
            pressure: 0.0,
            attractive_force_constant: 30.0,
            repulsive_force_constant: -100.0,
            iterations: 50,
            initial_max_atomic_displacement: 0.1,
            final_max_atomic_displacement: 0.01,
            max_unit_cell_displacement_factor: 0.0,
        };
        MoleculeOptimizer::run(&mut structure, &local_pairs, &local_params).unwrap();

        let bond_distance = (structure.atoms[1].position - structure.atoms[0].position).norm();
        assert!(bond_distance >= 2.6 && bond_distance <= 3.0, "bond distance {bond_distance} outside [2.6, 3.0]");
        assert!(local_pairs.is_feasible(&structure, &crate::constraints::ConstraintParams::default()));
    }

    #[test]
    fn displacement_never_exceeds_cap() {
        let mut structure = na_cl_structure();
        structure.atoms[1].position = Vector3::new(5.0, 5.0, 5.01);
        let pairs = ObjectivePairLists {
            ionic_repulsed: vec![PairIndices::new(
                OriginalAtomIndex(0),
                TranslatedAtomIndex::in_cell(OriginalAtomIndex(1)),
            )],
            ..Default::default()
        };
        let params = OptimizerParams {
            pressure: 0.0,
            attractive_force_constant: 30.0,
            repulsive_force_constant: -100.0,
            iterations: 1,
            initial_max_atomic_displacement: 0.05,
            final_max_atomic_displacement: 0.05,
            max_unit_cell_displacement_factor: 0.0,
        };
        let before = structure.atoms[0].position;
        MoleculeOptimizer::run(&mut structure, &pairs, &params).unwrap();
        let moved = (structure.atoms[0].position - before).norm();
        assert!(moved <= 0.05 + 1e-9);
    }

    #[test]
    fn decay_reaches_final_displacement() {
        let params = OptimizerParams {
            pressure: 0.0,
            attractive_force_constant: 30.0,
            repulsive_force_constant: -100.0,
            iterations: 10,
            initial_max_atomic_displacement: 0.5,
            final_max_atomic_displacement: 0.05,
            max_unit_cell_displacement_factor: 0.0,
        };
        let gamma = params.decay_factor();
        let mut value = params.initial_max_atomic_displacement;
        for _ in 0..params.iterations {
            value *= gamma;
        }
        assert!((value - params.final_max_atomic_displacement).abs() < 1e-9);
    }
}
