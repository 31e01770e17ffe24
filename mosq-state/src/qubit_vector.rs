//! Dense amplitude store
//!
//! [`QubitVector`] owns the 2^n amplitudes of one simulation session and
//! exposes the gate, measurement and readout primitives built on the index
//! generator and the kernel runner. Every primitive mutates the vector in
//! place and, apart from the collapse helpers used by measurement and Kraus
//! channels, preserves its norm.

use crate::error::{Result, StateError};
use crate::indexes::{bit, check_qubits, mask, parity, PauliMasks};
use crate::matrix::{
    i_pow, mosq_cr_matrices, pauli_pair_matrices, rx, ry, rz, rzz_diagonal, CMatrix, Matrix2,
    Rotation,
};
use crate::parallel::{self, AmpPtr};
use num_complex::Complex64;
use rayon::prelude::*;
use std::collections::BTreeMap;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Largest register whose amplitude buffer is addressable
pub const MAX_QUBITS: usize = usize::BITS as usize - 5;

/// Qubit count above which kernels fan out over the worker pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 14;

/// Magnitude below which exported amplitudes are treated as zero
pub const DEFAULT_ZERO_THRESHOLD: f64 = 1e-10;

/// Block size (as a power of two) of the sampling index
pub const DEFAULT_SAMPLE_INDEX_SIZE: usize = 10;

/// Dense statevector of `n` qubits
///
/// Index bit `i` of an amplitude position is the basis value of qubit `i`.
///
/// # Example
///
/// ```
/// use mosq_state::QubitVector;
///
/// let mut qv = QubitVector::new(2).unwrap();
/// qv.apply_mcx(&[0]).unwrap();
/// assert_eq!(qv.probability(1).unwrap(), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct QubitVector {
    num_qubits: usize,
    data: Vec<Complex64>,
    threads: usize,
    parallel_threshold: usize,
    zero_threshold: f64,
    sample_measure_index_size: usize,
}

/// Group visitor that picks the fixed-size index arrays for small subsets
fn for_each_group_sized<F>(dim: u64, workers: usize, qubits: &[usize], func: F)
where
    F: Fn(&[u64]) + Sync,
{
    match *qubits {
        [q0] => parallel::for_each_group_fixed::<1, 2, _>(dim, workers, &[q0], |inds| {
            func(&inds[..])
        }),
        [q0, q1] => parallel::for_each_group_fixed::<2, 4, _>(dim, workers, &[q0, q1], |inds| {
            func(&inds[..])
        }),
        [q0, q1, q2] => {
            parallel::for_each_group_fixed::<3, 8, _>(dim, workers, &[q0, q1, q2], |inds| {
                func(&inds[..])
            })
        }
        _ => parallel::for_each_group(dim, workers, qubits, func),
    }
}

/// Dense `D×D` application over a compile-time sized subset
fn apply_fixed<const N: usize, const D: usize>(
    ptr: AmpPtr<'_>,
    dim: u64,
    workers: usize,
    qubits: &[usize; N],
    mat: &CMatrix,
) {
    let m: [[Complex64; D]; D] = std::array::from_fn(|r| std::array::from_fn(|c| mat.get(r, c)));
    parallel::for_each_group_fixed::<N, D, _>(dim, workers, qubits, |inds| {
        // SAFETY: groups of distinct compressed indices are disjoint
        unsafe {
            let cache: [Complex64; D] = std::array::from_fn(|j| ptr.get(inds[j]));
            for (row, &i) in m.iter().zip(inds) {
                let value = row.iter().zip(&cache).map(|(&a, &b)| a * b).sum();
                ptr.set(i, value);
            }
        }
    });
}

#[inline]
fn chop(z: Complex64, epsilon: f64) -> Complex64 {
    Complex64::new(
        if z.re.abs() < epsilon { 0.0 } else { z.re },
        if z.im.abs() < epsilon { 0.0 } else { z.im },
    )
}

fn check_min_qubits(qubits: &[usize], required: usize) -> Result<()> {
    if qubits.len() < required {
        return Err(StateError::SubsetTooSmall {
            required,
            actual: qubits.len(),
        });
    }
    Ok(())
}

impl QubitVector {
    /// Allocate an `n`-qubit register in |0…0⟩
    ///
    /// # Errors
    /// `TooManyQubits` when the buffer size overflows, `AllocationError` when
    /// the allocator refuses the request.
    pub fn new(num_qubits: usize) -> Result<Self> {
        if num_qubits > MAX_QUBITS {
            return Err(StateError::TooManyQubits {
                requested: num_qubits,
                max: MAX_QUBITS,
            });
        }
        let dimension = 1usize << num_qubits;
        let mut data = Vec::new();
        data.try_reserve_exact(dimension)
            .map_err(|_| StateError::AllocationError {
                size: dimension.saturating_mul(std::mem::size_of::<Complex64>()),
            })?;
        data.resize(dimension, ZERO);
        data[0] = ONE;

        Ok(Self {
            num_qubits,
            data,
            threads: 1,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            zero_threshold: DEFAULT_ZERO_THRESHOLD,
            sample_measure_index_size: DEFAULT_SAMPLE_INDEX_SIZE,
        })
    }

    /// Take ownership of an amplitude buffer whose length is a power of two
    pub fn from_vec(data: Vec<Complex64>) -> Result<Self> {
        if !data.len().is_power_of_two() {
            return Err(StateError::InvalidDimension {
                dimension: data.len(),
            });
        }
        Ok(Self {
            num_qubits: data.len().trailing_zeros() as usize,
            data,
            threads: 1,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            zero_threshold: DEFAULT_ZERO_THRESHOLD,
            sample_measure_index_size: DEFAULT_SAMPLE_INDEX_SIZE,
        })
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of amplitudes (2^n)
    #[inline]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn set_parallel_threshold(&mut self, qubits: usize) {
        self.parallel_threshold = qubits;
    }

    pub fn set_zero_threshold(&mut self, epsilon: f64) {
        self.zero_threshold = epsilon;
    }

    pub fn zero_threshold(&self) -> f64 {
        self.zero_threshold
    }

    pub fn set_sample_measure_index_size(&mut self, index_size: usize) {
        self.sample_measure_index_size = index_size;
    }

    /// Worker count handed to the kernel runner
    ///
    /// Fan-out happens only above the parallel threshold and with more than
    /// one configured thread.
    #[inline]
    pub fn workers(&self) -> usize {
        if self.num_qubits > self.parallel_threshold && self.threads > 1 {
            self.threads
        } else {
            1
        }
    }

    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    /// Consume the store and hand its buffer to the caller
    pub fn move_to_vector(self) -> Vec<Complex64> {
        self.data
    }

    pub fn copy_to_vector(&self) -> Vec<Complex64> {
        self.data.clone()
    }

    pub fn amplitude(&self, index: u64) -> Result<Complex64> {
        self.data
            .get(index as usize)
            .copied()
            .ok_or(StateError::IndexOutOfRange {
                index,
                size: self.size(),
            })
    }

    pub fn probability(&self, index: u64) -> Result<f64> {
        self.amplitude(index).map(|a| a.norm_sqr())
    }

    // ---------------------------------------------------------------------
    // Initialization
    // ---------------------------------------------------------------------

    /// Reset to |0…0⟩
    pub fn initialize(&mut self) {
        self.data.fill(ZERO);
        self.data[0] = ONE;
    }

    /// Overwrite every amplitude from `state`
    pub fn initialize_from_vector(&mut self, state: &[Complex64]) -> Result<()> {
        if state.len() != self.data.len() {
            return Err(StateError::DimensionMismatch {
                expected: self.data.len(),
                actual: state.len(),
            });
        }
        self.data.copy_from_slice(state);
        Ok(())
    }

    /// Tensor `state` into `qubits`, which must currently be in |0…0⟩
    ///
    /// Amplitude `j` of `state` lands on the basis value whose bit `t` is the
    /// value of `qubits[t]`.
    pub fn initialize_component(&mut self, qubits: &[usize], state: &[Complex64]) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        let expected = 1usize << qubits.len();
        if state.len() != expected {
            return Err(StateError::DimensionMismatch {
                expected,
                actual: state.len(),
            });
        }
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        for_each_group_sized(dim, workers, qubits, |inds| {
            // SAFETY: groups of distinct compressed indices are disjoint
            unsafe {
                let cache = ptr.get(inds[0]);
                for (&i, &s) in inds.iter().zip(state) {
                    ptr.set(i, cache * s);
                }
            }
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Gate primitives
    // ---------------------------------------------------------------------

    /// Apply a dense `2^k × 2^k` matrix to `qubits`
    pub fn apply_matrix(&mut self, qubits: &[usize], mat: &CMatrix) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        mat.check_square(qubits.len())?;
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        match *qubits {
            [q0] => apply_fixed::<1, 2>(ptr, dim, workers, &[q0], mat),
            [q0, q1] => apply_fixed::<2, 4>(ptr, dim, workers, &[q0, q1], mat),
            [q0, q1, q2] => apply_fixed::<3, 8>(ptr, dim, workers, &[q0, q1, q2], mat),
            _ => {
                let d = mat.rows();
                parallel::fold_groups(
                    dim,
                    workers,
                    qubits,
                    || vec![ZERO; d],
                    |cache, inds| {
                        // SAFETY: groups of distinct compressed indices are disjoint
                        unsafe {
                            for (c, &i) in cache.iter_mut().zip(inds) {
                                *c = ptr.get(i);
                            }
                            for (row, &i) in inds.iter().enumerate() {
                                let value = cache
                                    .iter()
                                    .enumerate()
                                    .map(|(col, &a)| mat.get(row, col) * a)
                                    .sum();
                                ptr.set(i, value);
                            }
                        }
                    },
                    |a, _| a,
                );
            }
        }
        Ok(())
    }

    /// Multiply every amplitude by the diagonal entry its subset bits select
    pub fn apply_diagonal_matrix(&mut self, qubits: &[usize], diag: &[Complex64]) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        let expected = 1usize << qubits.len();
        if diag.len() != expected {
            return Err(StateError::DimensionMismatch {
                expected,
                actual: diag.len(),
            });
        }
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        parallel::for_each_index(0, dim, workers, |k| {
            let j = qubits
                .iter()
                .enumerate()
                .fold(0usize, |acc, (t, &q)| acc | ((((k >> q) & 1) as usize) << t));
            let d = diag[j];
            if d != ONE {
                // SAFETY: each position is visited once
                unsafe { ptr.set(k, ptr.get(k) * d) }
            }
        });
        Ok(())
    }

    /// Multi-controlled X: controls are all but the last qubit
    pub fn apply_mcx(&mut self, qubits: &[usize]) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        check_min_qubits(qubits, 1)?;
        let n = qubits.len();
        let (pos0, pos1) = (mask(n - 1) as usize, mask(n) as usize);
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        for_each_group_sized(dim, workers, qubits, |inds| {
            // SAFETY: groups of distinct compressed indices are disjoint
            unsafe {
                let a0 = ptr.get(inds[pos0]);
                ptr.set(inds[pos0], ptr.get(inds[pos1]));
                ptr.set(inds[pos1], a0);
            }
        });
        Ok(())
    }

    /// Multi-controlled Y: controls are all but the last qubit
    pub fn apply_mcy(&mut self, qubits: &[usize]) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        check_min_qubits(qubits, 1)?;
        let n = qubits.len();
        let (pos0, pos1) = (mask(n - 1) as usize, mask(n) as usize);
        let i = Complex64::new(0.0, 1.0);
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        for_each_group_sized(dim, workers, qubits, |inds| {
            // SAFETY: groups of distinct compressed indices are disjoint
            unsafe {
                let a0 = ptr.get(inds[pos0]);
                let a1 = ptr.get(inds[pos1]);
                ptr.set(inds[pos0], -i * a1);
                ptr.set(inds[pos1], i * a0);
            }
        });
        Ok(())
    }

    /// Multiply the all-ones basis state of `qubits` by `phase`
    pub fn apply_mcphase(&mut self, qubits: &[usize], phase: Complex64) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        check_min_qubits(qubits, 1)?;
        let all = qubits.iter().fold(0u64, |acc, &q| acc | bit(q));
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        parallel::for_each_index(0, dim, workers, |k| {
            if k & all == all {
                // SAFETY: each position is visited once
                unsafe { ptr.set(k, ptr.get(k) * phase) }
            }
        });
        Ok(())
    }

    /// Multi-controlled swap of the last two qubits
    pub fn apply_mcswap(&mut self, qubits: &[usize]) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        check_min_qubits(qubits, 2)?;
        let n = qubits.len();
        let pos0 = (mask(n - 2) + bit(n - 2)) as usize;
        let pos1 = (mask(n - 2) + bit(n - 1)) as usize;
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        for_each_group_sized(dim, workers, qubits, |inds| {
            // SAFETY: groups of distinct compressed indices are disjoint
            unsafe {
                let a0 = ptr.get(inds[pos0]);
                ptr.set(inds[pos0], ptr.get(inds[pos1]));
                ptr.set(inds[pos1], a0);
            }
        });
        Ok(())
    }

    /// Multi-controlled single-qubit unitary on the last qubit
    pub fn apply_mcu(&mut self, qubits: &[usize], mat: &Matrix2) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        check_min_qubits(qubits, 1)?;
        let diagonal = mat[0][1] == ZERO && mat[1][0] == ZERO;
        if qubits.len() == 1 {
            return if diagonal {
                self.apply_diagonal_matrix(qubits, &[mat[0][0], mat[1][1]])
            } else {
                self.apply_matrix(qubits, &CMatrix::from(*mat))
            };
        }
        let n = qubits.len();
        let (pos0, pos1) = (mask(n - 1) as usize, mask(n) as usize);
        let m = *mat;
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        for_each_group_sized(dim, workers, qubits, |inds| {
            let (i0, i1) = (inds[pos0], inds[pos1]);
            // SAFETY: groups of distinct compressed indices are disjoint
            unsafe {
                let a0 = ptr.get(i0);
                let a1 = ptr.get(i1);
                if diagonal {
                    ptr.set(i0, m[0][0] * a0);
                    ptr.set(i1, m[1][1] * a1);
                } else {
                    ptr.set(i0, m[0][0] * a0 + m[0][1] * a1);
                    ptr.set(i1, m[1][0] * a0 + m[1][1] * a1);
                }
            }
        });
        Ok(())
    }

    /// Pauli rotation `exp(-iθ/2 · P)`
    ///
    /// Single-axis rotations treat all but the last qubit as controls;
    /// two-qubit rotations take exactly two qubits.
    pub fn apply_rotation(&mut self, qubits: &[usize], rotation: Rotation, theta: f64) -> Result<()> {
        match rotation {
            Rotation::X => self.apply_mcu(qubits, &rx(theta)),
            Rotation::Y => self.apply_mcu(qubits, &ry(theta)),
            Rotation::Z => self.apply_mcu(qubits, &rz(theta)),
            Rotation::ZZ => self.apply_diagonal_matrix(qubits, &rzz_diagonal(theta)),
            Rotation::XX | Rotation::YY | Rotation::ZX => {
                self.apply_matrix(qubits, &rotation.matrix(theta))
            }
        }
    }

    /// Apply a Pauli string given as a label; the last character acts on `qubits[0]`
    pub fn apply_pauli(&mut self, qubits: &[usize], label: &str) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        let masks = PauliMasks::from_label(qubits, label)?;
        self.apply_pauli_masks(masks)
    }

    /// Apply the Pauli string described by absolute position masks
    pub fn apply_pauli_masks(&mut self, masks: PauliMasks) -> Result<()> {
        self.check_masks(masks, mask(self.num_qubits))?;
        if masks.flip_mask() == 0 {
            if masks.z == 0 {
                return Ok(());
            }
            let (dim, workers) = (self.size(), self.workers());
            let ptr = AmpPtr::new(&mut self.data);
            parallel::for_each_index(0, dim, workers, |k| {
                if parity(k & masks.z) {
                    // SAFETY: each position is visited once
                    unsafe { ptr.set(k, -ptr.get(k)) }
                }
            });
        } else {
            self.apply_pairs(masks, &pauli_pair_matrices());
        }
        Ok(())
    }

    /// Block-diagonal matrix with one target block per control basis state
    ///
    /// `mats[b]` acts on `targets` when the controls hold the value `b`.
    pub fn apply_multiplexer(
        &mut self,
        controls: &[usize],
        targets: &[usize],
        mats: &[CMatrix],
    ) -> Result<()> {
        let qubits: Vec<usize> = targets.iter().chain(controls).copied().collect();
        check_qubits(&qubits, self.num_qubits)?;
        let blocks = 1usize << controls.len();
        if mats.len() != blocks {
            return Err(StateError::DimensionMismatch {
                expected: blocks,
                actual: mats.len(),
            });
        }
        for mat in mats {
            mat.check_square(targets.len())?;
        }
        if controls.is_empty() {
            return self.apply_matrix(targets, &mats[0]);
        }

        let dt = 1usize << targets.len();
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        parallel::fold_groups(
            dim,
            workers,
            &qubits,
            || vec![ZERO; dt],
            |cache, inds| {
                for (block, mat) in inds.chunks_exact(dt).zip(mats) {
                    // SAFETY: groups of distinct compressed indices are disjoint
                    unsafe {
                        for (c, &i) in cache.iter_mut().zip(block) {
                            *c = ptr.get(i);
                        }
                        for (row, &i) in block.iter().enumerate() {
                            let value = cache
                                .iter()
                                .enumerate()
                                .map(|(col, &a)| mat.get(row, col) * a)
                                .sum();
                            ptr.set(i, value);
                        }
                    }
                }
            },
            |a, _| a,
        );
        Ok(())
    }

    /// Fused parity-diagonal: multiply odd-parity positions over `qubits` by `phase`
    ///
    /// Equivalent to the diagonal with `phase` wherever the subset holds an
    /// odd number of ones and `1` elsewhere.
    pub fn apply_mosq(&mut self, qubits: &[usize], phase: Complex64) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        if qubits.is_empty() || phase == ONE {
            return Ok(());
        }
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        parallel::for_each_odd_parity(dim, workers, qubits, |k| {
            // SAFETY: each position is visited once
            unsafe { ptr.set(k, ptr.get(k) * phase) }
        });
        Ok(())
    }

    /// Fused paired rotation `((1+phase)·I + (1-phase)·P) / 2`
    ///
    /// `P` is the Pauli string given by absolute masks, all of whose bits must
    /// belong to `qubits`. A string without X/Y bits is diagonal and runs
    /// through the odd-parity kernel over its Z bits.
    pub fn apply_mosq_cr(
        &mut self,
        qubits: &[usize],
        phase: Complex64,
        masks: PauliMasks,
    ) -> Result<()> {
        check_qubits(qubits, self.num_qubits)?;
        let allowed = qubits.iter().fold(0u64, |acc, &q| acc | bit(q));
        self.check_masks(masks, allowed)?;
        if masks.flip_mask() == 0 {
            let z_qubits: Vec<usize> = qubits
                .iter()
                .copied()
                .filter(|&q| masks.z & bit(q) != 0)
                .collect();
            return self.apply_mosq(&z_qubits, phase);
        }
        self.apply_pairs(masks, &mosq_cr_matrices(phase));
        Ok(())
    }

    fn check_masks(&self, masks: PauliMasks, allowed: u64) -> Result<()> {
        let invalid = |reason: &str| StateError::InvalidMasks {
            x: masks.x,
            y: masks.y,
            z: masks.z,
            reason: reason.to_string(),
        };
        if !masks.is_disjoint() {
            return Err(invalid("masks overlap"));
        }
        if masks.support() & !allowed != 0 {
            return Err(invalid("mask bit outside the declared qubits"));
        }
        Ok(())
    }

    fn apply_pairs(&mut self, masks: PauliMasks, mats: &[Matrix2; 4]) {
        let (dim, workers) = (self.size(), self.workers());
        let ptr = AmpPtr::new(&mut self.data);
        parallel::for_each_pair(dim, workers, masks, mats, |[i0, i1], m| {
            // SAFETY: pairs of distinct counters are disjoint
            unsafe {
                let a0 = ptr.get(i0);
                let a1 = ptr.get(i1);
                ptr.set(i0, m[0][0] * a0 + m[0][1] * a1);
                ptr.set(i1, m[1][0] * a0 + m[1][1] * a1);
            }
        });
    }

    // ---------------------------------------------------------------------
    // Readouts
    // ---------------------------------------------------------------------

    /// Squared norm of the vector
    pub fn norm(&self) -> f64 {
        let data = &self.data[..];
        parallel::reduce_index(0, self.size(), self.workers(), |k, re, _| {
            *re += data[k as usize].norm_sqr();
        })
        .re
    }

    /// Squared norm of `mat` applied to `qubits`, without mutating the vector
    pub fn norm_matrix(&self, qubits: &[usize], mat: &CMatrix) -> Result<f64> {
        check_qubits(qubits, self.num_qubits)?;
        mat.check_square(qubits.len())?;
        let data = &self.data[..];
        let total = parallel::reduce_group(self.size(), self.workers(), qubits, |inds, re, _| {
            for row in 0..inds.len() {
                let v: Complex64 = inds
                    .iter()
                    .enumerate()
                    .map(|(col, &i)| mat.get(row, col) * data[i as usize])
                    .sum();
                *re += v.norm_sqr();
            }
        });
        Ok(total.re)
    }

    /// Probability of every basis state
    pub fn probabilities(&self) -> Vec<f64> {
        if self.workers() > 1 {
            self.data.par_iter().map(|a| a.norm_sqr()).collect()
        } else {
            self.data.iter().map(|a| a.norm_sqr()).collect()
        }
    }

    /// Marginal distribution over `qubits`, indexed in declared qubit order
    pub fn probabilities_of(&self, qubits: &[usize]) -> Result<Vec<f64>> {
        check_qubits(qubits, self.num_qubits)?;
        let d = 1usize << qubits.len();
        let data = &self.data[..];
        Ok(parallel::fold_groups(
            self.size(),
            self.workers(),
            qubits,
            || vec![0.0; d],
            |acc, inds| {
                for (p, &i) in acc.iter_mut().zip(inds) {
                    *p += data[i as usize].norm_sqr();
                }
            },
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        ))
    }

    /// Draw one basis state per uniform number in `[0, 1)` without collapsing
    ///
    /// Large registers first sum probabilities over `2^index_size` blocks so
    /// each draw scans one block instead of the whole vector.
    pub fn sample_measure(&self, rnds: &[f64]) -> Vec<u64> {
        let data = &self.data[..];
        let last = data.len() - 1;
        let index_size = self.sample_measure_index_size;

        let totals: Vec<f64> = if self.num_qubits < index_size {
            Vec::new()
        } else {
            let block_len = data.len() >> index_size;
            if self.workers() > 1 {
                data.par_chunks(block_len)
                    .map(|c| c.iter().map(|a| a.norm_sqr()).sum())
                    .collect()
            } else {
                data.chunks(block_len)
                    .map(|c| c.iter().map(|a| a.norm_sqr()).sum())
                    .collect()
            }
        };

        let sample = |rnd: f64| -> u64 {
            let mut acc = 0.0;
            let mut start = 0;
            if !totals.is_empty() {
                let block_len = data.len() / totals.len();
                let mut block = 0;
                while block < totals.len() - 1 && rnd >= acc + totals[block] {
                    acc += totals[block];
                    block += 1;
                }
                start = block * block_len;
            }
            for (k, a) in data.iter().enumerate().take(last).skip(start) {
                acc += a.norm_sqr();
                if rnd < acc {
                    return k as u64;
                }
            }
            last as u64
        };

        if self.workers() > 1 {
            rnds.par_iter().map(|&r| sample(r)).collect()
        } else {
            rnds.iter().map(|&r| sample(r)).collect()
        }
    }

    /// Expectation value of a Pauli string; the last label character acts on `qubits[0]`
    pub fn expval_pauli(&self, qubits: &[usize], label: &str) -> Result<f64> {
        check_qubits(qubits, self.num_qubits)?;
        let masks = PauliMasks::from_label(qubits, label)?;
        let data = &self.data[..];
        let (dim, workers) = (self.size(), self.workers());

        let value = if masks.flip_mask() == 0 {
            parallel::reduce_index(0, dim, workers, |k, re, _| {
                let p = data[k as usize].norm_sqr();
                if parity(k & masks.z) {
                    *re -= p;
                } else {
                    *re += p;
                }
            })
        } else {
            // ⟨ψ|P|ψ⟩ = Σ 2·Re(conj(a1) · i^sel · a0) over the pairs
            parallel::reduce_index(0, dim >> 1, workers, |k, re, _| {
                let [i0, i1] = masks.pair(k);
                let c = i_pow(masks.selector(i0));
                *re += 2.0 * (data[i1 as usize].conj() * c * data[i0 as usize]).re;
            })
        };
        Ok(value.re)
    }

    /// Non-zero amplitudes keyed by hex basis label, chopped at the zero threshold
    pub fn vector_ket(&self) -> BTreeMap<String, Complex64> {
        let epsilon = self.zero_threshold;
        self.data
            .iter()
            .enumerate()
            .filter_map(|(k, &a)| {
                let a = chop(a, epsilon);
                (a != ZERO).then(|| (format!("{k:#x}"), a))
            })
            .collect()
    }

    /// Reduced density matrix of `qubits`, tracing out the rest
    ///
    /// Row/column bit `t` is the value of `qubits[t]`. An empty subset yields
    /// the 1×1 matrix holding the squared norm.
    pub fn reduced_density_matrix(&self, qubits: &[usize]) -> Result<CMatrix> {
        check_qubits(qubits, self.num_qubits)?;
        if qubits.is_empty() {
            return CMatrix::from_vec(1, 1, vec![Complex64::new(self.norm(), 0.0)]);
        }
        let epsilon = self.zero_threshold;
        let ordered = qubits.len() == self.num_qubits && qubits.iter().enumerate().all(|(i, &q)| i == q);
        if ordered {
            let rho = CMatrix::outer(&self.data, &self.data);
            let dim = rho.rows();
            return CMatrix::from_vec(
                dim,
                dim,
                rho.into_vec().into_iter().map(|z| chop(z, epsilon)).collect(),
            );
        }

        let d = 1usize << qubits.len();
        let data = &self.data[..];
        let acc = parallel::fold_groups(
            self.size(),
            self.workers(),
            qubits,
            || vec![ZERO; d * d],
            |acc, inds| {
                for (row, &i) in inds.iter().enumerate() {
                    let a = data[i as usize];
                    for (col, &j) in inds.iter().enumerate() {
                        acc[row * d + col] += a * data[j as usize].conj();
                    }
                }
            },
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );
        CMatrix::from_vec(d, d, acc.into_iter().map(|z| chop(z, epsilon)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn hadamard() -> CMatrix {
        let h = FRAC_1_SQRT_2;
        CMatrix::from_array(&[[c(h, 0.0), c(h, 0.0)], [c(h, 0.0), c(-h, 0.0)]])
    }

    fn assert_state_eq(a: &[Complex64], b: &[Complex64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-10);
            assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-10);
        }
    }

    /// A fixed, normalized, non-trivial 3-qubit state
    fn sample_state() -> QubitVector {
        let raw: Vec<Complex64> = (0..8)
            .map(|k| c(0.1 + k as f64 * 0.05, 0.3 - k as f64 * 0.07))
            .collect();
        let norm = raw.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        QubitVector::from_vec(raw.into_iter().map(|a| a / norm).collect()).unwrap()
    }

    #[test]
    fn test_new_is_ground_state() {
        let qv = QubitVector::new(3).unwrap();
        assert_eq!(qv.size(), 8);
        assert_eq!(qv.data()[0], ONE);
        assert_abs_diff_eq!(qv.norm(), 1.0);
    }

    #[test]
    fn test_too_many_qubits() {
        assert!(matches!(
            QubitVector::new(MAX_QUBITS + 1),
            Err(StateError::TooManyQubits { .. })
        ));
    }

    #[test]
    fn test_from_vec_requires_power_of_two() {
        assert_eq!(
            QubitVector::from_vec(vec![ONE; 3]).unwrap_err(),
            StateError::InvalidDimension { dimension: 3 }
        );
    }

    #[test]
    fn test_bell_state() {
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_matrix(&[0], &hadamard()).unwrap();
        qv.apply_mcx(&[0, 1]).unwrap();
        let probs = qv.probabilities_of(&[0, 1]).unwrap();
        assert_abs_diff_eq!(probs[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_mcx_controls_precede_target() {
        // |01⟩ (qubit 0 set): cx with control 0 flips qubit 1
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_mcx(&[0]).unwrap();
        qv.apply_mcx(&[0, 1]).unwrap();
        assert_eq!(qv.probability(3).unwrap(), 1.0);
        // control 1 is set now, so cx(1 -> 0) clears qubit 0
        qv.apply_mcx(&[1, 0]).unwrap();
        assert_eq!(qv.probability(2).unwrap(), 1.0);
    }

    #[test]
    fn test_mcy_phases() {
        let mut qv = QubitVector::new(1).unwrap();
        qv.apply_mcy(&[0]).unwrap();
        assert_state_eq(qv.data(), &[ZERO, c(0.0, 1.0)]);
        qv.apply_mcy(&[0]).unwrap();
        assert_state_eq(qv.data(), &[ONE, ZERO]);
    }

    #[test]
    fn test_mcswap() {
        // |q2 q1 q0⟩ = |011⟩, cswap(control 0; swap 1,2) -> |101⟩
        let mut qv = QubitVector::new(3).unwrap();
        qv.apply_mcx(&[0]).unwrap();
        qv.apply_mcx(&[1]).unwrap();
        qv.apply_mcswap(&[0, 1, 2]).unwrap();
        assert_eq!(qv.probability(0b101).unwrap(), 1.0);
    }

    #[test]
    fn test_mcphase_only_all_ones() {
        let mut qv = sample_state();
        let before = qv.copy_to_vector();
        qv.apply_mcphase(&[0, 2], -ONE).unwrap();
        for (k, (a, b)) in qv.data().iter().zip(&before).enumerate() {
            let expected = if k & 0b101 == 0b101 { -*b } else { *b };
            assert_abs_diff_eq!(a.re, expected.re, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mcu_matches_dense_controlled() {
        let mut fused = sample_state();
        let mut dense = sample_state();
        let u = rx(0.77);
        fused.apply_mcu(&[2, 0], &u).unwrap();
        // controlled-U on (control 2, target 0) as a 4×4 matrix: bit 0 = qubit 2
        let mut mat = CMatrix::identity(4);
        mat.set(1, 1, u[0][0]);
        mat.set(1, 3, u[0][1]);
        mat.set(3, 1, u[1][0]);
        mat.set(3, 3, u[1][1]);
        dense.apply_matrix(&[2, 0], &mat).unwrap();
        assert_state_eq(fused.data(), dense.data());
    }

    #[test]
    fn test_diagonal_matches_dense() {
        let diag = [c(1.0, 0.0), c(0.0, 1.0), c(-1.0, 0.0), c(0.6, 0.8)];
        let mut a = sample_state();
        let mut b = sample_state();
        a.apply_diagonal_matrix(&[1, 2], &diag).unwrap();
        b.apply_matrix(&[1, 2], &CMatrix::from_diagonal(&diag)).unwrap();
        assert_state_eq(a.data(), b.data());
    }

    #[test]
    fn test_heap_path_matches_kron() {
        // 4-qubit subset exercises the heap-sized path
        let mut a = QubitVector::new(5).unwrap();
        let mut b = QubitVector::new(5).unwrap();
        let h = hadamard();
        let hh = h.kron(&h);
        let hhhh = hh.kron(&hh);
        a.apply_matrix(&[4, 1, 3, 0], &hhhh).unwrap();
        for q in [4, 1, 3, 0] {
            b.apply_matrix(&[q], &h).unwrap();
        }
        assert_state_eq(a.data(), b.data());
    }

    #[test]
    fn test_matrix_shape_checked() {
        let mut qv = QubitVector::new(2).unwrap();
        assert!(matches!(
            qv.apply_matrix(&[0, 1], &hadamard()),
            Err(StateError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            qv.apply_matrix(&[2], &hadamard()),
            Err(StateError::InvalidQubitIndex { .. })
        ));
    }

    #[test]
    fn test_pauli_label() {
        // Y on qubit 0, X on qubit 1 applied to |00⟩ -> i|11⟩
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_pauli(&[0, 1], "XY").unwrap();
        assert_state_eq(qv.data(), &[ZERO, ZERO, ZERO, c(0.0, 1.0)]);
    }

    #[test]
    fn test_mosq_zero_angle_is_identity() {
        let mut qv = sample_state();
        let before = qv.copy_to_vector();
        qv.apply_mosq(&[0, 1, 2], ONE).unwrap();
        assert_state_eq(qv.data(), &before);
    }

    #[test]
    fn test_mosq_matches_parity_diagonal() {
        let phase = Complex64::from_polar(1.0, 0.9);
        let mut fused = sample_state();
        let mut dense = sample_state();
        fused.apply_mosq(&[2, 0], phase).unwrap();
        let diag: Vec<Complex64> = (0..4u64)
            .map(|j| if parity(j) { phase } else { ONE })
            .collect();
        dense.apply_diagonal_matrix(&[2, 0], &diag).unwrap();
        assert_state_eq(fused.data(), dense.data());
    }

    #[test]
    fn test_mosq_cr_pure_z_falls_back_to_parity() {
        let phase = Complex64::from_polar(1.0, -0.4);
        let mut a = sample_state();
        let mut b = sample_state();
        a.apply_mosq_cr(&[0, 1, 2], phase, PauliMasks::new(0, 0, 0b101))
            .unwrap();
        b.apply_mosq(&[0, 2], phase).unwrap();
        assert_state_eq(a.data(), b.data());
    }

    #[test]
    fn test_mosq_cr_rejects_bad_masks() {
        let mut qv = QubitVector::new(3).unwrap();
        let phase = Complex64::from_polar(1.0, 0.2);
        assert!(matches!(
            qv.apply_mosq_cr(&[0, 1], phase, PauliMasks::new(0b01, 0b01, 0)),
            Err(StateError::InvalidMasks { .. })
        ));
        assert!(matches!(
            qv.apply_mosq_cr(&[0, 1], phase, PauliMasks::new(0b100, 0, 0)),
            Err(StateError::InvalidMasks { .. })
        ));
    }

    #[test]
    fn test_multiplexer_selects_block() {
        // control qubit 1 in |1⟩ selects the X block for target 0
        let x = CMatrix::from_array(&[[ZERO, ONE], [ONE, ZERO]]);
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_mcx(&[1]).unwrap();
        qv.apply_multiplexer(&[1], &[0], &[CMatrix::identity(2), x])
            .unwrap();
        assert_eq!(qv.probability(3).unwrap(), 1.0);
    }

    #[test]
    fn test_initialize_component() {
        let h = FRAC_1_SQRT_2;
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_mcx(&[0]).unwrap();
        qv.initialize_component(&[1], &[c(h, 0.0), c(h, 0.0)])
            .unwrap();
        assert_abs_diff_eq!(qv.probability(1).unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(qv.probability(3).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_norm_matrix() {
        let mut qv = QubitVector::new(1).unwrap();
        qv.apply_matrix(&[0], &hadamard()).unwrap();
        let proj0 = CMatrix::from_diagonal(&[ONE, ZERO]);
        assert_abs_diff_eq!(qv.norm_matrix(&[0], &proj0).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_measure_both_paths() {
        let mut qv = QubitVector::new(3).unwrap();
        qv.apply_mcx(&[1]).unwrap();
        qv.apply_matrix(&[0], &hadamard()).unwrap();
        // outcomes 2 and 3, each with probability 1/2
        let rnds = [0.1, 0.49, 0.51, 0.99];
        let flat = qv.sample_measure(&rnds);
        qv.set_sample_measure_index_size(1);
        let blocked = qv.sample_measure(&rnds);
        assert_eq!(flat, vec![2, 2, 3, 3]);
        assert_eq!(blocked, flat);
    }

    #[test]
    fn test_expval_pauli() {
        let mut qv = QubitVector::new(2).unwrap();
        assert_abs_diff_eq!(qv.expval_pauli(&[0, 1], "ZZ").unwrap(), 1.0, epsilon = 1e-12);
        qv.apply_matrix(&[0], &hadamard()).unwrap();
        assert_abs_diff_eq!(qv.expval_pauli(&[0], "X").unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(qv.expval_pauli(&[0], "Z").unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(qv.expval_pauli(&[0, 1], "IX").unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_ket_chops() {
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_matrix(&[1], &hadamard()).unwrap();
        let ket = qv.vector_ket();
        assert_eq!(ket.len(), 2);
        assert!(ket.contains_key("0x0"));
        assert!(ket.contains_key("0x2"));
    }

    #[test]
    fn test_reduced_density_matrix() {
        let mut qv = QubitVector::new(2).unwrap();
        qv.apply_matrix(&[0], &hadamard()).unwrap();
        qv.apply_mcx(&[0, 1]).unwrap();
        let rho = qv.reduced_density_matrix(&[1]).unwrap();
        assert_abs_diff_eq!(rho.get(0, 0).re, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rho.get(1, 1).re, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rho.get(0, 1).norm(), 0.0, epsilon = 1e-12);

        let full = qv.reduced_density_matrix(&[0, 1]).unwrap();
        assert_abs_diff_eq!(full.get(0, 3).re, 0.5, epsilon = 1e-12);

        let empty = qv.reduced_density_matrix(&[]).unwrap();
        assert_eq!((empty.rows(), empty.cols()), (1, 1));
        assert_abs_diff_eq!(empty.get(0, 0).re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut serial = QubitVector::new(6).unwrap();
        let mut parallel = QubitVector::new(6).unwrap();
        parallel.set_threads(4);
        parallel.set_parallel_threshold(2);
        assert_eq!(parallel.workers(), 4);
        for qv in [&mut serial, &mut parallel] {
            for q in 0..6 {
                qv.apply_matrix(&[q], &hadamard()).unwrap();
            }
            qv.apply_mosq(&[0, 3, 5], Complex64::from_polar(1.0, 0.3)).unwrap();
            qv.apply_mosq_cr(
                &[1, 2, 4],
                Complex64::from_polar(1.0, 1.2),
                PauliMasks::new(0b000010, 0b010000, 0b000100),
            )
            .unwrap();
            qv.apply_mcx(&[2, 5]).unwrap();
        }
        assert_state_eq(serial.data(), parallel.data());
        assert_abs_diff_eq!(serial.norm(), parallel.norm(), epsilon = 1e-12);
    }
}
