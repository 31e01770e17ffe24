//! Small dense complex matrices
//!
//! Gate payloads are row-major matrices whose row/column index `j` maps onto a
//! qubit list through its bits: bit `t` of `j` is the value of `qubits[t]`.

use crate::error::{Result, StateError};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::ops::Index;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// Row-major 2×2 matrix used by the single-target kernels
pub type Matrix2 = [[Complex64; 2]; 2];

/// Row-major complex matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Complex64>,
}

impl CMatrix {
    /// Zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![ZERO; rows * cols],
        }
    }

    pub fn identity(dim: usize) -> Self {
        let mut mat = Self::zeros(dim, dim);
        for i in 0..dim {
            mat.data[i * dim + i] = ONE;
        }
        mat
    }

    /// Build from row-major data
    pub fn from_vec(rows: usize, cols: usize, data: Vec<Complex64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(StateError::DimensionMismatch {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows; every row must have the same length
    pub fn from_rows(rows: Vec<Vec<Complex64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let num_rows = rows.len();
        let mut data = Vec::with_capacity(num_rows * cols);
        for row in rows {
            if row.len() != cols {
                return Err(StateError::DimensionMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            rows: num_rows,
            cols,
            data,
        })
    }

    pub fn from_array<const D: usize>(mat: &[[Complex64; D]; D]) -> Self {
        Self {
            rows: D,
            cols: D,
            data: mat.iter().flatten().copied().collect(),
        }
    }

    /// Diagonal matrix holding `diag`
    pub fn from_diagonal(diag: &[Complex64]) -> Self {
        let mut mat = Self::zeros(diag.len(), diag.len());
        for (i, &d) in diag.iter().enumerate() {
            mat.data[i * diag.len() + i] = d;
        }
        mat
    }

    /// Outer product `|a⟩⟨b|`
    pub fn outer(a: &[Complex64], b: &[Complex64]) -> Self {
        let data = a
            .iter()
            .flat_map(|&x| b.iter().map(move |&y| x * y.conj()))
            .collect();
        Self {
            rows: a.len(),
            cols: b.len(),
            data,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Complex64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<Complex64> {
        self.data
    }

    /// Require a square matrix acting on `num_qubits` qubits
    pub fn check_square(&self, num_qubits: usize) -> Result<()> {
        let dim = 1usize << num_qubits;
        if !self.is_square() || self.rows != dim {
            return Err(StateError::DimensionMismatch {
                expected: dim,
                actual: self.rows.max(self.cols),
            });
        }
        Ok(())
    }

    /// True when every off-diagonal entry is below `tol` in magnitude
    pub fn is_diagonal(&self, tol: f64) -> bool {
        self.is_square()
            && (0..self.rows)
                .all(|r| (0..self.cols).all(|c| r == c || self.get(r, c).norm() <= tol))
    }

    pub fn diagonal(&self) -> Vec<Complex64> {
        (0..self.rows.min(self.cols))
            .map(|i| self.get(i, i))
            .collect()
    }

    pub fn scale(&self, factor: Complex64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| x * factor).collect(),
        }
    }

    /// Matrix product `self · rhs`
    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        if self.cols != rhs.rows {
            return Err(StateError::DimensionMismatch {
                expected: self.cols,
                actual: rhs.rows,
            });
        }
        let mut out = Self::zeros(self.rows, rhs.cols);
        for r in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(r, k);
                if a == ZERO {
                    continue;
                }
                for c in 0..rhs.cols {
                    out.data[r * rhs.cols + c] += a * rhs.get(k, c);
                }
            }
        }
        Ok(out)
    }

    /// Conjugate transpose
    pub fn dagger(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.data[c * self.rows + r] = self.get(r, c).conj();
            }
        }
        out
    }

    pub fn is_unitary(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        match self.dagger().mul(self) {
            Ok(prod) => (0..self.rows).all(|r| {
                (0..self.cols).all(|c| {
                    let expected = if r == c { ONE } else { ZERO };
                    (prod.get(r, c) - expected).norm() <= tol
                })
            }),
            Err(_) => false,
        }
    }

    /// Kronecker product `self ⊗ rhs`
    ///
    /// `rhs` occupies the low bits of the combined index.
    pub fn kron(&self, rhs: &Self) -> Self {
        let rows = self.rows * rhs.rows;
        let cols = self.cols * rhs.cols;
        let mut out = Self::zeros(rows, cols);
        for r1 in 0..self.rows {
            for c1 in 0..self.cols {
                let a = self.get(r1, c1);
                for r2 in 0..rhs.rows {
                    for c2 in 0..rhs.cols {
                        out.data[(r1 * rhs.rows + r2) * cols + c1 * rhs.cols + c2] =
                            a * rhs.get(r2, c2);
                    }
                }
            }
        }
        out
    }

    /// The 2×2 view used by the single-target kernels
    pub fn to_matrix2(&self) -> Option<Matrix2> {
        (self.rows == 2 && self.cols == 2)
            .then(|| [[self.get(0, 0), self.get(0, 1)], [self.get(1, 0), self.get(1, 1)]])
    }
}

impl Index<(usize, usize)> for CMatrix {
    type Output = Complex64;

    fn index(&self, (row, col): (usize, usize)) -> &Complex64 {
        &self.data[row * self.cols + col]
    }
}

impl From<Matrix2> for CMatrix {
    fn from(mat: Matrix2) -> Self {
        Self::from_array(&mat)
    }
}

/// Pauli rotation axes understood by the rotation primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    X,
    Y,
    Z,
    XX,
    YY,
    ZZ,
    /// Z on the first listed qubit, X on the second
    ZX,
}

impl Rotation {
    /// Number of target qubits the rotation acts on
    pub const fn targets(self) -> usize {
        match self {
            Rotation::X | Rotation::Y | Rotation::Z => 1,
            _ => 2,
        }
    }

    /// `exp(-iθ/2 · P)` for the axis `P`
    pub fn matrix(self, theta: f64) -> CMatrix {
        match self {
            Rotation::X => rx(theta).into(),
            Rotation::Y => ry(theta).into(),
            Rotation::Z => rz(theta).into(),
            Rotation::XX => CMatrix::from_array(&rxx(theta)),
            Rotation::YY => CMatrix::from_array(&ryy(theta)),
            Rotation::ZZ => CMatrix::from_diagonal(&rzz_diagonal(theta)),
            Rotation::ZX => CMatrix::from_array(&rzx(theta)),
        }
    }
}

#[inline]
fn half_angle(theta: f64) -> (Complex64, Complex64) {
    let (s, c) = (theta / 2.0).sin_cos();
    (Complex64::new(c, 0.0), Complex64::new(0.0, -s))
}

pub fn rx(theta: f64) -> Matrix2 {
    let (c, mis) = half_angle(theta);
    [[c, mis], [mis, c]]
}

pub fn ry(theta: f64) -> Matrix2 {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(c, 0.0), Complex64::new(-s, 0.0)],
        [Complex64::new(s, 0.0), Complex64::new(c, 0.0)],
    ]
}

pub fn rz(theta: f64) -> Matrix2 {
    [
        [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
        [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
    ]
}

pub fn rxx(theta: f64) -> [[Complex64; 4]; 4] {
    let (c, mis) = half_angle(theta);
    [
        [c, ZERO, ZERO, mis],
        [ZERO, c, mis, ZERO],
        [ZERO, mis, c, ZERO],
        [mis, ZERO, ZERO, c],
    ]
}

pub fn ryy(theta: f64) -> [[Complex64; 4]; 4] {
    let (c, mis) = half_angle(theta);
    [
        [c, ZERO, ZERO, -mis],
        [ZERO, c, mis, ZERO],
        [ZERO, mis, c, ZERO],
        [-mis, ZERO, ZERO, c],
    ]
}

pub fn rzz_diagonal(theta: f64) -> [Complex64; 4] {
    let even = Complex64::from_polar(1.0, -theta / 2.0);
    let odd = Complex64::from_polar(1.0, theta / 2.0);
    [even, odd, odd, even]
}

pub fn rzx(theta: f64) -> [[Complex64; 4]; 4] {
    let (c, mis) = half_angle(theta);
    [
        [c, ZERO, mis, ZERO],
        [ZERO, c, ZERO, -mis],
        [mis, ZERO, c, ZERO],
        [ZERO, -mis, ZERO, c],
    ]
}

/// `i^sel`
#[inline]
pub fn i_pow(sel: usize) -> Complex64 {
    match sel % 4 {
        0 => ONE,
        1 => I,
        2 => -ONE,
        _ => -I,
    }
}

/// Per-selector pair matrices of a Pauli string `P`
///
/// Entry `sel` maps `(a0, a1)` of a pair with `P|idx0⟩ = i^sel |idx1⟩`.
pub fn pauli_pair_matrices() -> [Matrix2; 4] {
    std::array::from_fn(|sel| {
        let c = i_pow(sel);
        [[ZERO, c.conj()], [c, ZERO]]
    })
}

/// Per-selector pair matrices of `((1+phase)·I + (1-phase)·P) / 2`
pub fn mosq_cr_matrices(phase: Complex64) -> [Matrix2; 4] {
    let alpha = (ONE + phase) * 0.5;
    let beta = (ONE - phase) * 0.5;
    std::array::from_fn(|sel| {
        let c = i_pow(sel);
        [[alpha, beta * c.conj()], [beta * c, alpha]]
    })
}
