use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Index into the per-cell atom list of a `CrystalStructure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OriginalAtomIndex(pub usize);

/// Signed triple `(a, b, c)` indexing a cell image. `(0, 0, 0)` is the
/// original cell. Ordered lexicographically so `TranslatedAtomIndex` can be
/// sorted deterministically (tie-break in `orderedBondedIndices`, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LatticePoint {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl LatticePoint {
    pub const ORIGIN: LatticePoint = LatticePoint { a: 0, b: 0, c: 0 };

    pub fn new(a: i32, b: i32, c: i32) -> Self {
        Self { a, b, c }
    }

    pub fn is_origin(&self) -> bool {
        *self == Self::ORIGIN
    }

    pub fn reversed(&self) -> Self {
        Self { a: -self.a, b: -self.b, c: -self.c }
    }

    /// `T = a*b1 + b*b2 + c*b3` where `b_i` are rows of `basis`.
    pub fn to_translation(&self, basis: &Matrix3<f64>) -> Vector3<f64> {
        let row = |k: usize| Vector3::new(basis[(k, 0)], basis[(k, 1)], basis[(k, 2)]);
        row(0) * self.a as f64 + row(1) * self.b as f64 + row(2) * self.c as f64
    }
}

/// `(OriginalAtomIndex, LatticePoint)`; `(i, (0,0,0))` denotes the original atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranslatedAtomIndex {
    pub original: OriginalAtomIndex,
    pub lattice: LatticePoint,
}

impl TranslatedAtomIndex {
    pub fn new(original: OriginalAtomIndex, lattice: LatticePoint) -> Self {
        Self { original, lattice }
    }

    pub fn in_cell(original: OriginalAtomIndex) -> Self {
        Self { original, lattice: LatticePoint::ORIGIN }
    }

    pub fn reversed(&self, other: OriginalAtomIndex) -> Self {
        Self { original: other, lattice: self.lattice.reversed() }
    }
}

// Ordering used for `orderedBondedIndices`: by lattice point, then original
// index. Distance is compared separately by the caller since it is not part
// of this type.
impl PartialOrd for TranslatedAtomIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TranslatedAtomIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.lattice, self.original.0).cmp(&(other.lattice, other.original.0))
    }
}

/// A pair used in the tracing/constraining lists: `ConstrainerIndices` in
/// `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairIndices {
    pub central: OriginalAtomIndex,
    pub neighbor: TranslatedAtomIndex,
}

impl PairIndices {
    pub fn new(central: OriginalAtomIndex, neighbor: TranslatedAtomIndex) -> Self {
        Self { central, neighbor }
    }
}

/// Three basis vectors as rows of a 3x3 matrix, with a cached inverse.
/// Mutable during relaxation; the inverse is recomputed whenever the basis
/// changes (Design Notes: "cache inside the optimizer and invalidate when
/// cell changes").
#[derive(Debug, Clone)]
pub struct UnitCell {
    basis: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CellError {
    #[error("unit cell basis is singular (zero volume)")]
    ZeroVolume,
}

impl UnitCell {
    pub fn new(basis: Matrix3<f64>) -> Result<Self, CellError> {
        let inverse = basis.try_inverse().ok_or(CellError::ZeroVolume)?;
        Ok(Self { basis, inverse })
    }

    pub fn cubic(side: f64) -> Self {
        Self::new(Matrix3::new(
            side, 0.0, 0.0, 0.0, side, 0.0, 0.0, 0.0, side,
        ))
        .expect("cubic cell with positive side is never singular")
    }

    pub fn basis(&self) -> &Matrix3<f64> {
        &self.basis
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    pub fn volume(&self) -> f64 {
        self.basis.determinant().abs()
    }

    /// Replace the basis, recomputing (and invalidating) the cached inverse.
    /// Returns `CellError::ZeroVolume` if the new basis is singular, leaving
    /// the previous basis/inverse untouched.
    pub fn set_basis(&mut self, basis: Matrix3<f64>) -> Result<(), CellError> {
        let inverse = basis.try_inverse().ok_or(CellError::ZeroVolume)?;
        self.basis = basis;
        self.inverse = inverse;
        Ok(())
    }

    pub fn fractional_of(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        // basis rows are the lattice vectors, so fractional = B^-T * cartesian
        // is wrong in general; with basis stored row-wise, cartesian = f^T * B,
        // i.e. f = cartesian * B^-1 when treated as row vectors. Using column
        // convention: f = B^-1 * cartesian only holds if basis columns are the
        // lattice vectors. We keep basis rows as lattice vectors (per §4.1),
        // so fractional = (B^T)^-1 * cartesian = (B^-1)^T * cartesian.
        self.inverse.transpose() * cartesian
    }

    pub fn to_translation(&self, lattice: &LatticePoint) -> Vector3<f64> {
        lattice.to_translation(&self.basis)
    }
}
