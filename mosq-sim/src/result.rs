//! Experiment results
//!
//! Saves land in one of three places depending on their [`SaveType`]: the
//! last value per key, a list with one value per shot, or a running sum that
//! is divided by the number of contributions on read.

use crate::error::{Result, SimulatorError};
use crate::telemetry::ExecutionTelemetry;
use mosq_state::CMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a save is recorded across shots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveType {
    /// Keep the value from the last shot
    #[default]
    Single,
    /// Keep one value per shot
    List,
    /// Average over shots
    Average,
}

/// Payload of a save instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SavedValue {
    Real(f64),
    Reals(Vec<f64>),
    Complexes(Vec<Complex64>),
    Ket(BTreeMap<String, Complex64>),
    RealKet(BTreeMap<String, f64>),
    Matrix(CMatrix),
}

impl SavedValue {
    /// Add `other` into `self`; fails when kinds or shapes differ
    fn accumulate(&mut self, other: &SavedValue) -> bool {
        match (self, other) {
            (SavedValue::Real(a), SavedValue::Real(b)) => *a += b,
            (SavedValue::Reals(a), SavedValue::Reals(b)) if a.len() == b.len() => {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
            }
            (SavedValue::Complexes(a), SavedValue::Complexes(b)) if a.len() == b.len() => {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
            }
            (SavedValue::Ket(a), SavedValue::Ket(b)) => {
                for (k, v) in b {
                    *a.entry(k.clone()).or_default() += v;
                }
            }
            (SavedValue::RealKet(a), SavedValue::RealKet(b)) => {
                for (k, v) in b {
                    *a.entry(k.clone()).or_default() += v;
                }
            }
            (SavedValue::Matrix(a), SavedValue::Matrix(b))
                if a.rows() == b.rows() && a.cols() == b.cols() =>
            {
                let sum: Vec<Complex64> = a
                    .as_slice()
                    .iter()
                    .zip(b.as_slice())
                    .map(|(x, y)| *x + *y)
                    .collect();
                match CMatrix::from_vec(a.rows(), a.cols(), sum) {
                    Ok(m) => *a = m,
                    Err(_) => return false,
                }
            }
            _ => return false,
        }
        true
    }

    fn scaled(&self, factor: f64) -> SavedValue {
        match self {
            SavedValue::Real(a) => SavedValue::Real(a * factor),
            SavedValue::Reals(a) => SavedValue::Reals(a.iter().map(|x| x * factor).collect()),
            SavedValue::Complexes(a) => {
                SavedValue::Complexes(a.iter().map(|x| *x * factor).collect())
            }
            SavedValue::Ket(a) => {
                SavedValue::Ket(a.iter().map(|(k, v)| (k.clone(), *v * factor)).collect())
            }
            SavedValue::RealKet(a) => {
                SavedValue::RealKet(a.iter().map(|(k, v)| (k.clone(), v * factor)).collect())
            }
            SavedValue::Matrix(a) => SavedValue::Matrix(a.scale(Complex64::new(factor, 0.0))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Accumulator {
    sum: SavedValue,
    count: usize,
}

/// Outcome of running one circuit for a number of shots
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentResult {
    pub shots: usize,
    pub seed: u64,
    /// Memory hex string → number of shots that produced it
    pub counts: BTreeMap<String, usize>,
    /// Memory hex string of every shot, in shot order
    pub memory: Vec<String>,
    single: BTreeMap<String, SavedValue>,
    list: BTreeMap<String, Vec<SavedValue>>,
    average: BTreeMap<String, Accumulator>,
    pub telemetry: Option<ExecutionTelemetry>,
}

impl ExperimentResult {
    pub fn new(shots: usize, seed: u64) -> Self {
        Self {
            shots,
            seed,
            ..Default::default()
        }
    }

    /// Record a save under `key`
    ///
    /// # Errors
    /// `ShapeMismatch` when an averaged key receives a value of another kind
    /// or shape than earlier shots.
    pub fn save(&mut self, key: &str, value: SavedValue, save_type: SaveType) -> Result<()> {
        match save_type {
            SaveType::Single => {
                self.single.insert(key.to_string(), value);
            }
            SaveType::List => self.list.entry(key.to_string()).or_default().push(value),
            SaveType::Average => match self.average.get_mut(key) {
                Some(acc) => {
                    if !acc.sum.accumulate(&value) {
                        return Err(SimulatorError::shape(
                            "save",
                            format!("averaged key '{key}' changed shape between shots"),
                        ));
                    }
                    acc.count += 1;
                }
                None => {
                    self.average.insert(
                        key.to_string(),
                        Accumulator {
                            sum: value,
                            count: 1,
                        },
                    );
                }
            },
        }
        Ok(())
    }

    /// Record one shot's classical memory
    pub fn add_memory(&mut self, hex: String) {
        *self.counts.entry(hex.clone()).or_insert(0) += 1;
        self.memory.push(hex);
    }

    pub fn single(&self, key: &str) -> Option<&SavedValue> {
        self.single.get(key)
    }

    pub fn list(&self, key: &str) -> Option<&[SavedValue]> {
        self.list.get(key).map(Vec::as_slice)
    }

    /// Mean of every value saved under `key` with [`SaveType::Average`]
    pub fn average(&self, key: &str) -> Option<SavedValue> {
        self.average
            .get(key)
            .map(|acc| acc.sum.scaled(1.0 / acc.count as f64))
    }

    /// Fraction of shots whose memory equals `hex`
    pub fn probability(&self, hex: &str) -> f64 {
        let total: usize = self.counts.values().sum();
        if total == 0 {
            0.0
        } else {
            self.counts.get(hex).copied().unwrap_or(0) as f64 / total as f64
        }
    }
}
