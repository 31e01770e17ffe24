//! Parallel kernel runner
//!
//! Stateless iteration strategies that invoke a caller-supplied function over
//! positions of an amplitude vector:
//!
//! - [`for_each_index`]: every position of a range once
//! - [`for_each_group`] / [`for_each_group_fixed`]: one call per compressed
//!   index with the expanded index group of a qubit subset
//! - [`for_each_odd_parity`]: positions whose parity over a subset is odd
//! - [`for_each_pair`]: position pairs of a Pauli string, with one of four
//!   2×2 matrices chosen per pair
//!
//! and reductions ([`reduce_index`], [`reduce_group`], [`fold_groups`]) whose
//! per-worker partial results are combined after the parallel region.
//!
//! With `workers > 1` a range is split into exactly `workers` contiguous,
//! disjoint chunks which rayon runs in parallel; no ordering between chunks is
//! guaranteed. Every strategy writes disjoint positions per call, so workers
//! never touch the same amplitude.

use crate::indexes::{bit, indexes_array, indexes_into, parity, sorted_qubits, PauliMasks};
use crate::matrix::Matrix2;
use num_complex::Complex64;
use rayon::prelude::*;
use std::marker::PhantomData;

/// Raw view of an amplitude buffer shared by the workers of one kernel call
#[derive(Clone, Copy)]
pub(crate) struct AmpPtr<'a> {
    ptr: *mut Complex64,
    len: usize,
    _marker: PhantomData<&'a mut [Complex64]>,
}

// Workers only ever write the disjoint positions handed to them by a strategy
unsafe impl Send for AmpPtr<'_> {}
unsafe impl Sync for AmpPtr<'_> {}

impl<'a> AmpPtr<'a> {
    pub(crate) fn new(data: &'a mut [Complex64]) -> Self {
        Self {
            ptr: data.as_mut_ptr(),
            len: data.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// `i` must be in bounds and must not be written by another worker
    /// during the current kernel call.
    #[inline]
    pub(crate) unsafe fn get(self, i: u64) -> Complex64 {
        debug_assert!((i as usize) < self.len);
        *self.ptr.add(i as usize)
    }

    /// # Safety
    /// Same contract as [`AmpPtr::get`].
    #[inline]
    pub(crate) unsafe fn set(self, i: u64, value: Complex64) {
        debug_assert!((i as usize) < self.len);
        *self.ptr.add(i as usize) = value;
    }
}

#[inline]
fn chunk_bounds(start: u64, stop: u64, workers: usize, worker: usize) -> (u64, u64) {
    let len = u128::from(stop - start);
    let lo = start + (len * worker as u128 / workers as u128) as u64;
    let hi = start + (len * (worker as u128 + 1) / workers as u128) as u64;
    (lo, hi)
}

fn run_chunks<F>(start: u64, stop: u64, workers: usize, body: F)
where
    F: Fn(u64, u64) + Sync,
{
    if stop <= start {
        return;
    }
    if workers > 1 {
        (0..workers).into_par_iter().for_each(|worker| {
            let (lo, hi) = chunk_bounds(start, stop, workers, worker);
            body(lo, hi);
        });
    } else {
        body(start, stop);
    }
}

/// Visit every position of `[start, stop)` once
pub fn for_each_index<F>(start: u64, stop: u64, workers: usize, func: F)
where
    F: Fn(u64) + Sync,
{
    run_chunks(start, stop, workers, |lo, hi| {
        for k in lo..hi {
            func(k);
        }
    });
}

/// Visit the index group of every compressed index of a `dim`-sized vector
///
/// `func` receives the `2^qubits.len()` positions ordered by the declared
/// qubit order. Each worker owns one group buffer for the whole call.
pub fn for_each_group<F>(dim: u64, workers: usize, qubits: &[usize], func: F)
where
    F: Fn(&[u64]) + Sync,
{
    let sorted = sorted_qubits(qubits);
    let end = dim >> qubits.len();
    run_chunks(0, end, workers, |lo, hi| {
        let mut inds = vec![0u64; 1usize << qubits.len()];
        for k in lo..hi {
            indexes_into(qubits, &sorted, k, &mut inds);
            func(&inds);
        }
    });
}

/// [`for_each_group`] for a subset size known at compile time (`D = 2^N`)
pub fn for_each_group_fixed<const N: usize, const D: usize, F>(
    dim: u64,
    workers: usize,
    qubits: &[usize; N],
    func: F,
) where
    F: Fn(&[u64; D]) + Sync,
{
    let mut sorted = *qubits;
    sorted.sort_unstable();
    let end = dim >> N;
    run_chunks(0, end, workers, |lo, hi| {
        for k in lo..hi {
            let inds: [u64; D] = indexes_array(qubits, &sorted, k);
            func(&inds);
        }
    });
}

/// Visit only the positions of `[0, dim)` with odd parity over `qubits`
///
/// Iterates the full range directly; no index groups are built.
pub fn for_each_odd_parity<F>(dim: u64, workers: usize, qubits: &[usize], func: F)
where
    F: Fn(u64) + Sync,
{
    let mask = qubits.iter().fold(0u64, |acc, &q| acc | bit(q));
    run_chunks(0, dim, workers, |lo, hi| {
        for k in lo..hi {
            if parity(k & mask) {
                func(k);
            }
        }
    });
}

/// Visit the `dim / 2` position pairs of a Pauli string
///
/// For each compressed counter the pair `[idx0, idx1]` is derived from the
/// flip mask and `func` receives the matrix `mats[masks.selector(idx0)]`.
/// The string must flip at least one bit.
pub fn for_each_pair<F>(
    dim: u64,
    workers: usize,
    masks: PauliMasks,
    mats: &[Matrix2; 4],
    func: F,
) where
    F: Fn([u64; 2], &Matrix2) + Sync,
{
    debug_assert_ne!(masks.flip_mask(), 0);
    run_chunks(0, dim >> 1, workers, |lo, hi| {
        for k in lo..hi {
            let pair = masks.pair(k);
            func(pair, &mats[masks.selector(pair[0])]);
        }
    });
}

/// Fold every index group into a per-worker accumulator, then combine
pub fn fold_groups<T, I, F, C>(
    dim: u64,
    workers: usize,
    qubits: &[usize],
    identity: I,
    fold: F,
    combine: C,
) -> T
where
    T: Send,
    I: Fn() -> T + Sync,
    F: Fn(&mut T, &[u64]) + Sync,
    C: Fn(T, T) -> T + Sync,
{
    let sorted = sorted_qubits(qubits);
    let end = dim >> qubits.len();
    let body = |lo: u64, hi: u64| {
        let mut acc = identity();
        let mut inds = vec![0u64; 1usize << qubits.len()];
        for k in lo..hi {
            indexes_into(qubits, &sorted, k, &mut inds);
            fold(&mut acc, &inds);
        }
        acc
    };
    if workers > 1 && end > 0 {
        (0..workers)
            .into_par_iter()
            .map(|worker| {
                let (lo, hi) = chunk_bounds(0, end, workers, worker);
                body(lo, hi)
            })
            .reduce(&identity, &combine)
    } else {
        body(0, end)
    }
}

/// Sum real and imaginary contributions of every position of `[start, stop)`
pub fn reduce_index<F>(start: u64, stop: u64, workers: usize, func: F) -> Complex64
where
    F: Fn(u64, &mut f64, &mut f64) + Sync,
{
    let body = |lo: u64, hi: u64| {
        let (mut re, mut im) = (0.0, 0.0);
        for k in lo..hi {
            func(k, &mut re, &mut im);
        }
        (re, im)
    };
    let (re, im) = if workers > 1 && stop > start {
        (0..workers)
            .into_par_iter()
            .map(|worker| {
                let (lo, hi) = chunk_bounds(start, stop, workers, worker);
                body(lo, hi)
            })
            .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1))
    } else {
        body(start, stop.max(start))
    };
    Complex64::new(re, im)
}

/// Sum real and imaginary contributions of every index group
pub fn reduce_group<F>(dim: u64, workers: usize, qubits: &[usize], func: F) -> Complex64
where
    F: Fn(&[u64], &mut f64, &mut f64) + Sync,
{
    let (re, im) = fold_groups(
        dim,
        workers,
        qubits,
        || (0.0, 0.0),
        |acc: &mut (f64, f64), inds| func(inds, &mut acc.0, &mut acc.1),
        |a, b| (a.0 + b.0, a.1 + b.1),
    );
    Complex64::new(re, im)
}
