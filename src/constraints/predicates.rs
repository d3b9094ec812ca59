use crate::model::{Polarity, Species};

/// Scalar policy parameters carried by the `ConstraintManager`
/// (`spec.md` §4.3).
#[derive(Debug, Clone, Copy)]
pub struct ConstraintParams {
    pub feasible_error_rate: f64,
    pub exclusive_radius_ratio: f64,
    pub tracer_cutoff_ratio: f64,
    pub constrainer_cutoff_ratio: f64,
    pub tracer_timeout: usize,
    pub unit_cell_reduction_timeout: usize,
}

impl ConstraintParams {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        let checks: &[(&str, bool, f64)] = &[
            ("Feasible.Geometrical.Constraint.Error.Rate", self.feasible_error_rate >= 0.0, self.feasible_error_rate),
            ("Minimum.Exclusion.Distance.Ratio", self.exclusive_radius_ratio > 1.0, self.exclusive_radius_ratio),
            ("Interatomic.Distance.Tracer.Cutoff.Ratio", self.tracer_cutoff_ratio > 0.0, self.tracer_cutoff_ratio),
            ("Interatomic.Distance.Constrainer.Cutoff.Ratio", self.constrainer_cutoff_ratio > 0.0, self.constrainer_cutoff_ratio),
        ];
        for (key, ok, value) in checks {
            if !ok {
                return Err(crate::error::ConfigError::OutOfRange { key: key.to_string(), value: *value });
            }
        }
        Ok(())
    }
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self {
            feasible_error_rate: 0.1,
            exclusive_radius_ratio: 1.2,
            tracer_cutoff_ratio: 1.5,
            constrainer_cutoff_ratio: 1.1,
            tracer_timeout: 50,
            unit_cell_reduction_timeout: 20,
        }
    }
}

/// `attractive`/`repulsive`/neutral charge-interaction classifier
/// (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Attractive,
    Repulsive,
    Neutral,
}

pub fn classify(a: &Species, b: &Species) -> Interaction {
    use Polarity::*;
    match (a.ionic_atomic_number.polarity(), b.ionic_atomic_number.polarity()) {
        (Anion, Cation) | (Cation, Anion) => Interaction::Attractive,
        (Anion, Anion) | (Cation, Cation) => Interaction::Repulsive,
        _ => Interaction::Neutral,
    }
}

pub fn innate_covalent_bondable(a: &Species, b: &Species) -> bool {
    a.coordination.max_covalent_coordination_number() > 0 && b.coordination.max_covalent_coordination_number() > 0
}

pub fn innate_ionic_bondable(a: &Species, b: &Species) -> bool {
    a.coordination.max_ionic_coordination_number() > 0 && b.coordination.max_ionic_coordination_number() > 0
}

pub fn innate_chemical_bondable(a: &Species, b: &Species) -> bool {
    !a.coordination.infeasible_elements.contains(&b.symbol) && !b.coordination.infeasible_elements.contains(&a.symbol)
}

/// Table from `spec.md` §4.3. Every predicate compares squared distance
/// against squared thresholds (Design Notes: "always compare squared
/// distances... the force step divides by sqrt only when a force must be
/// applied").
pub struct Predicates;

fn lower_only(distance_sq: f64, lower: f64) -> bool {
    distance_sq >= lower * lower
}

fn upper_only(distance_sq: f64, upper: f64) -> bool {
    distance_sq <= upper * upper
}

fn bounded(distance_sq: f64, lower: f64, upper: f64) -> bool {
    distance_sq >= lower * lower && distance_sq <= upper * upper
}

impl Predicates {
    pub fn constrainable_covalent(distance_sq: f64, a: &Species, b: &Species, rho_con: f64) -> bool {
        upper_only(distance_sq, rho_con * (a.covalent_radius.max + b.covalent_radius.max))
    }

    pub fn constrainable_ionic(distance_sq: f64, a: &Species, b: &Species, rho_con: f64) -> bool {
        upper_only(distance_sq, rho_con * (a.ionic_radius.max + b.ionic_radius.max))
    }

    pub fn feasible_covalent_bond(distance_sq: f64, a: &Species, b: &Species, eps: f64) -> bool {
        bounded(
            distance_sq,
            (1.0 - eps) * (a.covalent_radius.min + b.covalent_radius.min),
            (1.0 + eps) * (a.covalent_radius.max + b.covalent_radius.max),
        )
    }

    pub fn feasible_ionic_bond(distance_sq: f64, a: &Species, b: &Species, eps: f64) -> bool {
        bounded(
            distance_sq,
            (1.0 - eps) * (a.ionic_radius.min + b.ionic_radius.min),
            (1.0 + eps) * (a.ionic_radius.max + b.ionic_radius.max),
        )
    }

    pub fn feasible_covalent_exclusion(distance_sq: f64, a: &Species, b: &Species, eps: f64, rho_ex: f64) -> bool {
        lower_only(distance_sq, (1.0 - eps) * rho_ex * (a.covalent_radius.max + b.covalent_radius.max))
    }

    pub fn feasible_ionic_exclusion(distance_sq: f64, a: &Species, b: &Species, eps: f64, rho_ex: f64) -> bool {
        lower_only(distance_sq, (1.0 - eps) * rho_ex * (a.ionic_radius.max + b.ionic_radius.max))
    }

    pub fn feasible_ionic_repulsion(distance_sq: f64, a: &Species, b: &Species, eps: f64) -> bool {
        lower_only(distance_sq, (1.0 - eps) * (a.repulsion_radius.min + b.repulsion_radius.min))
    }
}
