//! Property-based tests for the index generator and the fused kernels
//!
//! The fused fast paths are checked against the equivalent dense operator
//! applied through the generic matrix kernel.

use mosq_state::indexes::{bit, indexes, mask, sorted_qubits};
use mosq_state::{CMatrix, PauliMasks, QubitVector};
use num_complex::Complex64;
use proptest::prelude::*;

const EPSILON: f64 = 1e-9;

/// Drop the subset bits of a position, the inverse of the zero insertion
fn compress(mut pos: u64, sorted: &[usize]) -> u64 {
    for &q in sorted.iter().rev() {
        pos = (pos & mask(q)) | ((pos >> (q + 1)) << q);
    }
    pos
}

/// Register size plus a shuffled subset of its qubits
fn register_and_subset() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (1usize..9).prop_flat_map(|n| {
        let all: Vec<usize> = (0..n).collect();
        (
            Just(n),
            prop::sample::subsequence(all, 0..=n).prop_shuffle(),
        )
    })
}

/// Register size, a normalized state and one Pauli letter per qubit
fn state_and_letters() -> impl Strategy<Value = (usize, Vec<Complex64>, Vec<u8>)> {
    (1usize..6).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), 1 << n),
            prop::collection::vec(0u8..4, n),
        )
            .prop_filter_map("zero vector", |(n, raw, letters)| {
                let state: Vec<Complex64> =
                    raw.into_iter().map(|(re, im)| Complex64::new(re, im)).collect();
                let norm = state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
                (norm > 1e-3).then(|| (n, state.into_iter().map(|a| a / norm).collect(), letters))
            })
    })
}

fn masks_from_letters(letters: &[u8]) -> PauliMasks {
    let mut masks = PauliMasks::default();
    for (q, &l) in letters.iter().enumerate() {
        match l {
            1 => masks.x |= bit(q),
            2 => masks.y |= bit(q),
            3 => masks.z |= bit(q),
            _ => {}
        }
    }
    masks
}

/// Dense matrix of a Pauli string over the full register, built qubit by qubit
fn dense_pauli(n: usize, masks: PauliMasks) -> CMatrix {
    let dim = 1usize << n;
    let i = Complex64::new(0.0, 1.0);
    let mut mat = CMatrix::zeros(dim, dim);
    for b in 0..dim as u64 {
        let mut coeff = Complex64::new(1.0, 0.0);
        for q in 0..n {
            let set = b & bit(q) != 0;
            if masks.y & bit(q) != 0 {
                coeff *= if set { -i } else { i };
            }
            if masks.z & bit(q) != 0 && set {
                coeff = -coeff;
            }
        }
        let target = b ^ masks.flip_mask();
        mat.set(target as usize, b as usize, coeff);
    }
    mat
}

fn assert_close(a: &[Complex64], b: &[Complex64]) -> Result<(), TestCaseError> {
    for (k, (x, y)) in a.iter().zip(b).enumerate() {
        prop_assert!((x - y).norm() < EPSILON, "amplitude {} differs: {} vs {}", k, x, y);
    }
    Ok(())
}

proptest! {
    /// Index groups are distinct, keep the untouched bits of the counter and
    /// start with every subset bit cleared
    #[test]
    fn index_map_invariants((n, qubits) in register_and_subset()) {
        let sorted = sorted_qubits(&qubits);
        let subset_mask = qubits.iter().fold(0u64, |acc, &q| acc | bit(q));
        for c in 0..(1u64 << (n - qubits.len())) {
            let inds = indexes(&qubits, &sorted, c);
            prop_assert_eq!(inds.len(), 1 << qubits.len());
            prop_assert_eq!(inds[0] & subset_mask, 0);

            let mut unique = inds.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), inds.len());

            for (j, &pos) in inds.iter().enumerate() {
                prop_assert_eq!(compress(pos, &sorted), c);
                for (t, &q) in qubits.iter().enumerate() {
                    prop_assert_eq!((pos >> q) & 1, ((j >> t) & 1) as u64);
                }
            }
        }
    }

    /// Paired positions differ by the flip mask and the pair counter can be
    /// recovered from either member
    #[test]
    fn pair_round_trip(letters in prop::collection::vec(0u8..4, 1..10)) {
        let masks = masks_from_letters(&letters);
        let flip = masks.flip_mask();
        prop_assume!(flip != 0);
        let highest = 63 - flip.leading_zeros() as usize;
        let n = letters.len();

        for k in 0..(1u64 << (n - 1)) {
            let [idx0, idx1] = masks.pair(k);
            prop_assert_eq!(idx1, idx0 ^ flip);
            prop_assert_eq!(idx0 & bit(highest), 0);
            let back = if idx1 & bit(highest) != 0 { idx1 ^ flip } else { idx1 };
            prop_assert_eq!(back, idx0);
            prop_assert_eq!(compress(idx0, &[highest]), k);
        }
    }

    /// Marginals over any subset sum to one
    #[test]
    fn marginals_are_normalized(
        (n, state, _letters) in state_and_letters(),
        pick in prop::collection::vec(any::<bool>(), 5)
    ) {
        let qv = QubitVector::from_vec(state).unwrap();
        let qubits: Vec<usize> = (0..n).filter(|&q| pick[q]).collect();
        let total: f64 = qv.probabilities_of(&qubits).unwrap().iter().sum();
        prop_assert!((total - 1.0).abs() < EPSILON);
    }

    /// MOSQ equals the diagonal with `phase` on odd-parity basis states
    #[test]
    fn mosq_matches_dense_diagonal(
        (n, state, letters) in state_and_letters(),
        theta in -3.2f64..3.2
    ) {
        let qubits: Vec<usize> = (0..n).filter(|&q| letters[q] != 0).collect();
        let phase = Complex64::from_polar(1.0, theta);

        let mut fused = QubitVector::from_vec(state.clone()).unwrap();
        fused.apply_mosq(&qubits, phase).unwrap();

        let diag: Vec<Complex64> = (0..1u64 << qubits.len())
            .map(|j| if j.count_ones() % 2 == 1 { phase } else { Complex64::new(1.0, 0.0) })
            .collect();
        let mut dense = QubitVector::from_vec(state).unwrap();
        dense.apply_diagonal_matrix(&qubits, &diag).unwrap();

        assert_close(fused.data(), dense.data())?;
        prop_assert!((fused.norm() - 1.0).abs() < EPSILON);
    }

    /// MOSQ_CR equals ((1+phase)·I + (1-phase)·P) / 2 applied densely
    #[test]
    fn mosq_cr_matches_dense_operator(
        (n, state, letters) in state_and_letters(),
        theta in -3.2f64..3.2
    ) {
        let masks = masks_from_letters(&letters);
        let phase = Complex64::from_polar(1.0, theta);
        let qubits: Vec<usize> = (0..n).collect();

        let mut fused = QubitVector::from_vec(state.clone()).unwrap();
        fused.apply_mosq_cr(&qubits, phase, masks).unwrap();

        let one = Complex64::new(1.0, 0.0);
        let p = dense_pauli(n, masks);
        let dim = 1usize << n;
        let mut op = CMatrix::zeros(dim, dim);
        for r in 0..dim {
            for c in 0..dim {
                let id = if r == c { one } else { Complex64::new(0.0, 0.0) };
                op.set(r, c, ((one + phase) * id + (one - phase) * p.get(r, c)) * 0.5);
            }
        }
        prop_assert!(op.is_unitary(1e-12));

        let mut dense = QubitVector::from_vec(state).unwrap();
        dense.apply_matrix(&qubits, &op).unwrap();

        assert_close(fused.data(), dense.data())?;
    }

    /// Applying a Pauli string twice is the identity
    #[test]
    fn pauli_is_involution((_n, state, letters) in state_and_letters()) {
        let masks = masks_from_letters(&letters);
        let mut qv = QubitVector::from_vec(state.clone()).unwrap();
        qv.apply_pauli_masks(masks).unwrap();
        qv.apply_pauli_masks(masks).unwrap();
        assert_close(qv.data(), &state)?;
    }
}
