use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Element + formal charge. Negative charge => anion, positive => cation,
/// zero => neutral (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IonicAtomicNumber {
    pub element: u8,
    pub charge: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Anion,
    Cation,
    Neutral,
}

impl IonicAtomicNumber {
    pub fn polarity(&self) -> Polarity {
        if self.charge < 0 {
            Polarity::Anion
        } else if self.charge > 0 {
            Polarity::Cation
        } else {
            Polarity::Neutral
        }
    }
}

/// A closed interval `[min, max]` of radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusRange {
    pub min: f64,
    pub max: f64,
}

impl RadiusRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// A multiset of element symbols, e.g. `{O: 2, Si: 1}` for composition token
/// `O_2Si_1` (`spec.md` §6).
pub type CompositionMultiset = BTreeMap<String, u32>;

/// `other` is "covered" by `self` iff every element count in `self` is `<=`
/// the matching count in `other` (used for lower-bound compositions, §4.4).
pub fn covers(lower_bound: &CompositionMultiset, actual: &CompositionMultiset) -> bool {
    lower_bound
        .iter()
        .all(|(element, &count)| actual.get(element).copied().unwrap_or(0) >= count)
}

/// A species' coordination constraints are either an explicit set of
/// feasible compositions, or a trio of bounded restrictions. Only one
/// representation is valid per species (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinationConstraintKind {
    Explicit { compositions: HashSet<CompositionMultiset> },
    Bounded {
        covalent_numbers: HashSet<usize>,
        ionic_numbers: HashSet<usize>,
        lower_bounds: Vec<CompositionMultiset>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinationConstraints {
    pub kind: CoordinationConstraintKind,
    /// Elements this species can never chemically bond to, independent of
    /// `kind` (innate chemical-bondability, `spec.md` §4.3).
    pub infeasible_elements: HashSet<String>,
}

impl CoordinationConstraints {
    pub fn explicit(compositions: HashSet<CompositionMultiset>) -> Self {
        Self {
            kind: CoordinationConstraintKind::Explicit { compositions },
            infeasible_elements: HashSet::new(),
        }
    }

    pub fn bounded(
        covalent_numbers: HashSet<usize>,
        ionic_numbers: HashSet<usize>,
        lower_bounds: Vec<CompositionMultiset>,
    ) -> Self {
        Self {
            kind: CoordinationConstraintKind::Bounded { covalent_numbers, ionic_numbers, lower_bounds },
            infeasible_elements: HashSet::new(),
        }
    }

    pub fn max_covalent_coordination_number(&self) -> usize {
        match &self.kind {
            CoordinationConstraintKind::Explicit { compositions } => compositions
                .iter()
                .map(|c| c.values().sum::<u32>() as usize)
                .max()
                .unwrap_or(0),
            CoordinationConstraintKind::Bounded { covalent_numbers, .. } => {
                covalent_numbers.iter().copied().max().unwrap_or(0)
            }
        }
    }

    pub fn max_ionic_coordination_number(&self) -> usize {
        match &self.kind {
            CoordinationConstraintKind::Explicit { compositions } => compositions
                .iter()
                .map(|c| c.values().sum::<u32>() as usize)
                .max()
                .unwrap_or(0),
            CoordinationConstraintKind::Bounded { ionic_numbers, .. } => {
                ionic_numbers.iter().copied().max().unwrap_or(0)
            }
        }
    }

    /// `spec.md` §4.4 `hasFeasibleCoordinationComposition`.
    pub fn is_feasible_composition(&self, composition: &CompositionMultiset) -> bool {
        match &self.kind {
            CoordinationConstraintKind::Explicit { compositions } => compositions.contains(composition),
            CoordinationConstraintKind::Bounded { covalent_numbers, ionic_numbers, lower_bounds } => {
                let total = composition.values().sum::<u32>() as usize;
                let count_ok = covalent_numbers.is_empty() || covalent_numbers.contains(&total);
                let ionic_ok = ionic_numbers.is_empty() || ionic_numbers.contains(&total);
                let lower_bounds_ok = lower_bounds.iter().all(|m| covers(m, composition));
                count_ok && ionic_ok && lower_bounds_ok
            }
        }
    }

    /// The largest total coordination number this species could ever settle
    /// on without exceeding a declared upper bound — the maximum over the
    /// explicit target compositions, or the sum of the largest declared
    /// covalent and ionic coordination numbers. `None` if the representation
    /// declares no upper bound at all.
    fn max_total_coordination_number(&self) -> Option<usize> {
        match &self.kind {
            CoordinationConstraintKind::Explicit { compositions } => {
                compositions.iter().map(|c| c.values().sum::<u32>() as usize).max()
            }
            CoordinationConstraintKind::Bounded { covalent_numbers, ionic_numbers, .. } => {
                let covalent_max = covalent_numbers.iter().copied().max();
                let ionic_max = ionic_numbers.iter().copied().max();
                match (covalent_max, ionic_max) {
                    (Some(a), Some(b)) => Some(a + b),
                    (Some(a), None) => Some(a),
                    (None, Some(b)) => Some(b),
                    (None, None) => None,
                }
            }
        }
    }

    /// `spec.md` §4.7 step 2: a central atom's current composition *exceeds*
    /// its species' declared upper bound — either too many total bonds, or a
    /// bonded element the species declares it can never chemically bond to.
    /// Unlike `is_feasible_composition`, this does NOT fire on a
    /// partially-formed (under-coordinated) polyhedron still being built up
    /// by earlier phases.
    pub fn exceeds_declared_upper_bound(&self, composition: &CompositionMultiset) -> bool {
        let forbidden_element_present =
            composition.keys().any(|element| self.infeasible_elements.contains(element));
        let total = composition.values().sum::<u32>() as usize;
        let over_coordinated = self.max_total_coordination_number().is_some_and(|max| total > max);
        forbidden_element_present || over_coordinated
    }
}

/// Per-species chemical knowledge: radii, charge and coordination rules
/// (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Species {
    pub symbol: String,
    pub ionic_atomic_number: IonicAtomicNumber,
    pub covalent_radius: RadiusRange,
    pub ionic_radius: RadiusRange,
    pub repulsion_radius: RadiusRange,
    pub coordination: CoordinationConstraints,
}

impl Species {
    /// Rejects a species that (per `spec.md` §3) would otherwise be
    /// ambiguous about its coordination representation. With the enum
    /// encoding used here the two representations are already mutually
    /// exclusive by construction; this validates the *contents* instead
    /// (non-empty explicit set, or at least one populated bounded field).
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.coordination.kind {
            CoordinationConstraintKind::Explicit { compositions } if compositions.is_empty() => {
                Err(ConfigError::ConflictingCoordinationConstraints { species: self.symbol.clone() })
            }
            CoordinationConstraintKind::Bounded { covalent_numbers, ionic_numbers, lower_bounds }
                if covalent_numbers.is_empty() && ionic_numbers.is_empty() && lower_bounds.is_empty() =>
            {
                Err(ConfigError::ConflictingCoordinationConstraints { species: self.symbol.clone() })
            }
            _ => Ok(()),
        }
    }
}
