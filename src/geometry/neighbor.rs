use nalgebra::{Matrix3, Vector3};

use crate::model::LatticePoint;

/// Enumerates every lattice point whose cell image could lie within `radius`
/// of `fractional_origin` (`spec.md` §4.2). Deliberately over-approximating:
/// per-axis half-width `|r_k| = radius * ||row_k(inverse_basis)||`, then the
/// inclusive range `floor(f_k - r_k) ..= floor(f_k + r_k)`. False positives
/// are pruned downstream by precise squared-distance predicates.
///
/// Confirmed against `enumerateNeighborLatticePoints` in
/// `CrystallineConstraintManager.cpp`: same per-axis bound, no additional
/// pruning at this layer.
pub fn enumerate_neighbor_lattice_points(
    fractional_origin: Vector3<f64>,
    inverse_basis: &Matrix3<f64>,
    radius: f64,
) -> Vec<LatticePoint> {
    if radius < 0.0 {
        return Vec::new();
    }

    let half_width = |k: usize| -> f64 {
        let row = Vector3::new(inverse_basis[(k, 0)], inverse_basis[(k, 1)], inverse_basis[(k, 2)]);
        radius * row.norm()
    };

    let ranges: Vec<(i32, i32)> = (0..3)
        .map(|k| {
            let r = half_width(k);
            let lo = (fractional_origin[k] - r).floor() as i32;
            let hi = (fractional_origin[k] + r).floor() as i32;
            (lo, hi)
        })
        .collect();

    let mut points = Vec::new();
    for a in ranges[0].0..=ranges[0].1 {
        for b in ranges[1].0..=ranges[1].1 {
            for c in ranges[2].0..=ranges[2].1 {
                points.push(LatticePoint::new(a, b, c));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soundness_contains_origin_for_small_radius() {
        let inverse = Matrix3::identity();
        let points = enumerate_neighbor_lattice_points(Vector3::new(0.5, 0.5, 0.5), &inverse, 0.1);
        assert!(points.contains(&LatticePoint::ORIGIN));
    }

    #[test]
    fn over_approximates_when_origin_near_boundary() {
        let inverse = Matrix3::identity();
        // f = 0.99 with radius 0.1 should include both floor(0.89)=0 and
        // floor(1.09)=1, i.e. the neighbouring cell along every axis.
        let points = enumerate_neighbor_lattice_points(Vector3::new(0.99, 0.99, 0.99), &inverse, 0.1);
        assert!(points.contains(&LatticePoint::new(1, 1, 1)));
        assert!(points.contains(&LatticePoint::ORIGIN));
    }

    #[test]
    fn negative_radius_returns_empty() {
        let inverse = Matrix3::identity();
        let points = enumerate_neighbor_lattice_points(Vector3::new(0.5, 0.5, 0.5), &inverse, -1.0);
        assert!(points.is_empty());
    }
}
