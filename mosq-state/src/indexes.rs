//! Bit-index generation for qubit subsets
//!
//! A k-qubit operation on an n-qubit register touches 2^k amplitudes for every
//! basis state of the n-k untouched qubits. Those untouched basis states are
//! enumerated by a *compressed index* `k ∈ [0, 2^(n-k))`; the functions here
//! expand a compressed index into the group of full amplitude positions it
//! stands for.
//!
//! The group is ordered by the caller's qubit order, not by the sorted order:
//! bit `i` of a group offset selects the value of `qubits[i]`. This is what
//! lets a matrix row/column be mapped onto an unsorted qubit list.
//!
//! # Example
//!
//! ```
//! use mosq_state::indexes::{indexes, sorted_qubits};
//!
//! // k = 77 = 0b1001101 with zeros inserted at bits 1 and 4
//! let qubits = [1, 4];
//! let inds = indexes(&qubits, &sorted_qubits(&qubits), 77);
//! assert_eq!(inds, vec![297, 299, 313, 315]);
//! ```

use crate::error::{Result, StateError};

/// Largest subset the index arithmetic can address
pub const MAX_SUBSET: usize = 64;

/// Single-bit mask for `qubit`
#[inline]
pub const fn bit(qubit: usize) -> u64 {
    1u64 << qubit
}

/// Mask of every bit strictly below `qubit`
#[inline]
pub const fn mask(qubit: usize) -> u64 {
    bit(qubit).wrapping_sub(1)
}

/// Insert a zero bit at position `qubit` of `k`, shifting the higher bits up
#[inline]
pub const fn insert_zero(k: u64, qubit: usize) -> u64 {
    let low = k & mask(qubit);
    let high = if qubit >= 63 {
        0
    } else {
        (k >> qubit) << (qubit + 1)
    };
    high | low
}

/// Odd parity of the set bits of `x`
#[inline]
pub const fn parity(x: u64) -> bool {
    x.count_ones() & 1 == 1
}

/// Return an ascending copy of a qubit list
pub fn sorted_qubits(qubits: &[usize]) -> Vec<usize> {
    let mut sorted = qubits.to_vec();
    sorted.sort_unstable();
    sorted
}

/// Position of the compressed index `k` with every subset bit cleared
///
/// `qubits_sorted` must be ascending.
#[inline]
pub fn index0(qubits_sorted: &[usize], k: u64) -> u64 {
    qubits_sorted
        .iter()
        .fold(k, |acc, &qubit| insert_zero(acc, qubit))
}

/// Shared core of both entry points: writes the 2^N group of `k` into `out`
#[inline]
fn fill_indexes(qubits: &[usize], qubits_sorted: &[usize], k: u64, out: &mut [u64]) {
    debug_assert_eq!(out.len(), 1usize << qubits.len());
    out[0] = index0(qubits_sorted, k);
    for (i, &qubit) in qubits.iter().enumerate() {
        let n = 1usize << i;
        let b = bit(qubit);
        for j in 0..n {
            out[n + j] = out[j] | b;
        }
    }
}

/// Heap-sized index group for a subset whose size is only known at runtime
pub fn indexes(qubits: &[usize], qubits_sorted: &[usize], k: u64) -> Vec<u64> {
    let mut out = vec![0u64; 1usize << qubits.len()];
    fill_indexes(qubits, qubits_sorted, k, &mut out);
    out
}

/// Write the index group of `k` into a caller-owned buffer
///
/// Used by the kernel runner to reuse one allocation per worker.
#[inline]
pub fn indexes_into(qubits: &[usize], qubits_sorted: &[usize], k: u64, out: &mut [u64]) {
    fill_indexes(qubits, qubits_sorted, k, out);
}

struct GroupSize<const N: usize, const D: usize>;

impl<const N: usize, const D: usize> GroupSize<N, D> {
    const VALID: () = assert!(D == 1 << N, "index group size must be 2^N");
}

/// Fixed-size index group for a subset whose size is known at compile time
///
/// `D` must equal `2^N`; this is checked at compile time.
#[inline]
pub fn indexes_array<const N: usize, const D: usize>(
    qubits: &[usize; N],
    qubits_sorted: &[usize; N],
    k: u64,
) -> [u64; D] {
    #[allow(clippy::let_unit_value)]
    let () = GroupSize::<N, D>::VALID;
    let mut out = [0u64; D];
    fill_indexes(qubits, qubits_sorted, k, &mut out);
    out
}

/// Check a subset against a register size: bounded, in range, distinct
pub fn check_qubits(qubits: &[usize], num_qubits: usize) -> Result<()> {
    if qubits.len() > MAX_SUBSET {
        return Err(StateError::TooManyQubits {
            requested: qubits.len(),
            max: MAX_SUBSET,
        });
    }
    let mut seen = 0u64;
    for &qubit in qubits {
        if qubit >= num_qubits || qubit >= MAX_SUBSET {
            return Err(StateError::InvalidQubitIndex {
                index: qubit,
                num_qubits,
            });
        }
        if seen & bit(qubit) != 0 {
            return Err(StateError::DuplicateQubit(qubit));
        }
        seen |= bit(qubit);
    }
    Ok(())
}

/// X/Y/Z involvement of a Pauli string as absolute position masks
///
/// Applying the string maps the basis state `b` onto `b ^ (x ^ y)`, so the
/// amplitude vector splits into disjoint pairs connected by the flip mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PauliMasks {
    pub x: u64,
    pub y: u64,
    pub z: u64,
}

impl PauliMasks {
    pub const fn new(x: u64, y: u64, z: u64) -> Self {
        Self { x, y, z }
    }

    /// Parse a label such as `"XIZY"`; the last character acts on `qubits[0]`
    pub fn from_label(qubits: &[usize], label: &str) -> Result<Self> {
        let invalid = || StateError::InvalidPauli {
            label: label.to_string(),
            num_qubits: qubits.len(),
        };
        if label.len() != qubits.len() {
            return Err(invalid());
        }
        let mut masks = Self::default();
        for (i, c) in label.bytes().rev().enumerate() {
            let b = bit(qubits[i]);
            match c {
                b'I' => {}
                b'X' => masks.x |= b,
                b'Y' => masks.y |= b,
                b'Z' => masks.z |= b,
                _ => return Err(invalid()),
            }
        }
        Ok(masks)
    }

    /// Mask connecting the two members of a pair
    #[inline]
    pub const fn flip_mask(&self) -> u64 {
        self.x ^ self.y
    }

    /// Every position touched by the string
    #[inline]
    pub const fn support(&self) -> u64 {
        self.x | self.y | self.z
    }

    #[inline]
    pub const fn num_y(&self) -> u32 {
        self.y.count_ones()
    }

    /// The masks must not overlap
    pub fn is_disjoint(&self) -> bool {
        self.x & self.y == 0 && self.x & self.z == 0 && self.y & self.z == 0
    }

    /// Expand a compressed pair counter into `[idx0, idx1]`
    ///
    /// `idx0` has the highest flip bit cleared and `idx1 = idx0 ^ flip_mask`.
    /// A string without flip bits pairs every position with itself.
    #[inline]
    pub fn pair(&self, k: u64) -> [u64; 2] {
        let flip = self.flip_mask();
        if flip == 0 {
            return [k, k];
        }
        let highest = 63 - flip.leading_zeros() as usize;
        let idx0 = insert_zero(k, highest);
        [idx0, idx0 ^ flip]
    }

    /// Phase selector in {0,1,2,3}: the string maps `|idx0⟩` to `i^sel |idx1⟩`
    #[inline]
    pub fn selector(&self, idx0: u64) -> usize {
        let num_y = u64::from(self.num_y());
        let y_count = u64::from((self.y & idx0).count_ones());
        let z_count = u64::from((self.z & idx0).count_ones());
        (num_y
            .wrapping_sub(2 * y_count)
            .wrapping_add(2 * z_count)
            % 4) as usize
    }
}
