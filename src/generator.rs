use std::sync::Arc;

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::{Atom, CrystalStructure, Species, UnitCell};

/// Parameters controlling the random initial structure built for one
/// attempt (`spec.md` §2 data flow: "random seed -> initial structure").
/// Not named as its own component in `spec.md`; grounded in the teacher's
/// `Cluster::new_random` random-sequential-placement idiom
/// (`core/domain.rs`), generalized from a 0D cluster box to a periodic
/// unit cell.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorParams {
    /// Target cell volume per atom, used to size the initial cubic cell.
    pub volume_per_atom: f64,
    /// Placement attempts per atom before giving up (mirrors the teacher's
    /// "Attempt 100 times to place an atom without overlap").
    pub placement_attempts: usize,
    /// Scales the minimum allowed initial separation below the sum of two
    /// species' minimum repulsion radii, so early placements are not
    /// required to already satisfy full bonding geometry.
    pub min_separation_scale: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self { volume_per_atom: 20.0, placement_attempts: 200, min_separation_scale: 0.5 }
    }
}

/// One entry of a target composition: index into the species table, and
/// how many atoms of that species the structure must contain.
#[derive(Debug, Clone, Copy)]
pub struct CompositionCount {
    pub species_index: usize,
    pub count: usize,
}

/// Builds a random initial `CrystalStructure` for one design attempt.
/// Returns `None` if random-sequential placement could not seat every atom
/// within `params.placement_attempts` tries — an attempt-scoped failure
/// (`spec.md` §7), not a configuration error.
pub fn generate_initial_structure(
    composition: &[CompositionCount],
    species: &Arc<Vec<Species>>,
    seed: u64,
    params: &GeneratorParams,
) -> Option<CrystalStructure> {
    let total_atoms: usize = composition.iter().map(|c| c.count).sum();
    if total_atoms == 0 {
        return None;
    }

    let side = (total_atoms as f64 * params.volume_per_atom).cbrt();
    let cell = UnitCell::cubic(side).ok()?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut species_ids = Vec::with_capacity(total_atoms);
    for c in composition {
        species_ids.extend(std::iter::repeat(c.species_index).take(c.count));
    }
    shuffle(&mut species_ids, &mut rng);

    let mut atoms: Vec<Atom> = Vec::with_capacity(total_atoms);
    for species_index in species_ids {
        let placed = place_one_atom(species_index, &atoms, species, side, params, &mut rng)?;
        atoms.push(placed);
    }

    Some(CrystalStructure::new(cell, atoms, species.clone()))
}

fn place_one_atom(
    species_index: usize,
    existing: &[Atom],
    species: &[Species],
    side: f64,
    params: &GeneratorParams,
    rng: &mut ChaCha8Rng,
) -> Option<Atom> {
    for _ in 0..params.placement_attempts {
        let position = Vector3::new(
            rng.gen_range(0.0..side),
            rng.gen_range(0.0..side),
            rng.gen_range(0.0..side),
        );

        let clashes = existing.iter().any(|other| {
            let limit = params.min_separation_scale
                * (species[species_index].repulsion_radius.min + species[other.species_index].repulsion_radius.min);
            (position - other.position).norm_squared() < limit * limit
        });

        if !clashes {
            return Some(Atom::new(species_index, position));
        }
    }
    None
}

fn shuffle<T>(items: &mut [T], rng: &mut ChaCha8Rng) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
