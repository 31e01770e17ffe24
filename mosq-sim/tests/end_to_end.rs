//! Whole-circuit runs through the simulator

use approx::assert_relative_eq;
use mosq_sim::{
    Circuit, ExpvalTerm, Op, OpType, SaveType, SavedValue, Simulator, SimulatorConfig,
    SimulatorError,
};
use mosq_state::CMatrix;
use num_complex::Complex64;
use proptest::prelude::*;

const EPSILON: f64 = 1e-10;

fn simulator(shots: usize) -> Simulator {
    Simulator::new(SimulatorConfig::new().with_shots(shots).with_seed(1234)).unwrap()
}

fn reals(value: Option<&SavedValue>) -> Vec<f64> {
    match value {
        Some(SavedValue::Reals(v)) => v.clone(),
        other => panic!("expected reals, got {other:?}"),
    }
}

fn complexes(value: Option<&SavedValue>) -> Vec<Complex64> {
    match value {
        Some(SavedValue::Complexes(v)) => v.clone(),
        other => panic!("expected complexes, got {other:?}"),
    }
}

#[test]
fn test_bell_state_probabilities() {
    let mut circuit = Circuit::new(2);
    circuit
        .push(Op::gate("h", &[0], &[]))
        .push(Op::gate("cx", &[0, 1], &[]))
        .push(Op::save(OpType::SaveProbs, &[0, 1], "probs", SaveType::Single));

    let result = simulator(1).run(&circuit).unwrap();
    let probs = reals(result.single("probs"));
    assert_relative_eq!(probs[0], 0.5, epsilon = EPSILON);
    assert_relative_eq!(probs[1], 0.0, epsilon = EPSILON);
    assert_relative_eq!(probs[2], 0.0, epsilon = EPSILON);
    assert_relative_eq!(probs[3], 0.5, epsilon = EPSILON);
}

#[test]
fn test_gate_then_inverse_restores_state() {
    let mut circuit = Circuit::new(2);
    circuit
        .push(Op::gate("u3", &[0], &[0.3, 1.1, -0.4]))
        .push(Op::gate("ry", &[1], &[0.9]))
        .push(Op::save(OpType::SaveStatevec, &[0, 1], "before", SaveType::Single))
        .push(Op::gate("s", &[0], &[]))
        .push(Op::gate("sdg", &[0], &[]))
        .push(Op::gate("t", &[1], &[]))
        .push(Op::gate("tdg", &[1], &[]))
        .push(Op::gate("sx", &[1], &[]))
        .push(Op::gate("sxdg", &[1], &[]))
        .push(Op::gate("rzx", &[0, 1], &[0.7]))
        .push(Op::gate("rzx", &[0, 1], &[-0.7]))
        .push(Op::save(OpType::SaveStatevec, &[0, 1], "after", SaveType::Single));

    let result = simulator(1).run(&circuit).unwrap();
    let before = complexes(result.single("before"));
    let after = complexes(result.single("after"));
    for (a, b) in after.iter().zip(&before) {
        assert_relative_eq!(a.re, b.re, epsilon = EPSILON);
        assert_relative_eq!(a.im, b.im, epsilon = EPSILON);
    }
}

#[test]
fn test_measure_reset_remeasure_is_zero() {
    let mut circuit = Circuit::new(1).with_memory(2);
    circuit
        .push(Op::gate("h", &[0], &[]))
        .push(Op::measure(&[0], &[0], &[]))
        .push(Op::reset(&[0]))
        .push(Op::measure(&[0], &[1], &[]));

    let result = simulator(200).run(&circuit).unwrap();
    assert_eq!(result.memory.len(), 200);
    for hex in result.counts.keys() {
        assert!(hex == "0x0" || hex == "0x1", "second bit set in {hex}");
    }
    assert!(result.counts.contains_key("0x1"));
}

#[test]
fn test_kraus_channel_frequencies() {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let identity = CMatrix::identity(2).scale(Complex64::new(h, 0.0));
    let flip = CMatrix::from_rows(vec![
        vec![Complex64::new(0.0, 0.0), Complex64::new(h, 0.0)],
        vec![Complex64::new(h, 0.0), Complex64::new(0.0, 0.0)],
    ])
    .unwrap();

    let mut circuit = Circuit::new(1).with_memory(1);
    circuit
        .push(Op::kraus(&[0], vec![identity.clone(), flip.clone()]))
        .push(Op::kraus(&[0], vec![identity, flip]))
        .push(Op::measure(&[0], &[0], &[]));

    let shots = 4000;
    let result = simulator(shots).run(&circuit).unwrap();
    let ones = result.counts.get("0x1").copied().unwrap_or(0) as f64 / shots as f64;
    assert!((ones - 0.5).abs() < 0.05, "frequency of 1 was {ones}");
}

#[test]
fn test_mosq_zero_angle_is_identity() {
    let mut circuit = Circuit::new(3);
    circuit
        .push(Op::gate("h", &[0], &[]))
        .push(Op::gate("ry", &[2], &[1.3]))
        .push(Op::save(OpType::SaveStatevec, &[0, 1, 2], "before", SaveType::Single))
        .push(Op::gate("MOSQ", &[2, 0, 1], &[0.0]))
        .push(Op::save(OpType::SaveStatevec, &[0, 1, 2], "after", SaveType::Single));

    let result = simulator(1).run(&circuit).unwrap();
    assert_eq!(
        complexes(result.single("before")),
        complexes(result.single("after"))
    );
}

#[test]
fn test_mosq_cr_matches_rzz_exponent() {
    // MOSQ_CR with a pure Z⊗Z string is exp(iθ/2)·exp(-iθ/2·ZZ) up to the
    // global phase, so the probabilities after the basis change match rzz.
    let theta = 0.6;
    let build = |gate: Op| {
        let mut circuit = Circuit::new(2);
        circuit
            .push(Op::gate("h", &[0], &[]))
            .push(Op::gate("h", &[1], &[]))
            .push(gate)
            .push(Op::gate("h", &[0], &[]))
            .push(Op::gate("h", &[1], &[]))
            .push(Op::save(OpType::SaveProbs, &[0, 1], "p", SaveType::Single));
        circuit
    };
    let fused = simulator(1)
        .run(&build(Op::gate("MOSQ_CR", &[0, 1], &[theta, 0.0, 0.0, 3.0])))
        .unwrap();
    let dense = simulator(1)
        .run(&build(Op::gate("rzz", &[0, 1], &[theta])))
        .unwrap();
    for (a, b) in reals(fused.single("p")).iter().zip(&reals(dense.single("p"))) {
        assert_relative_eq!(a, b, epsilon = EPSILON);
    }
}

#[test]
fn test_unknown_instruction_aborts() {
    let mut circuit = Circuit::new(1);
    circuit.push(Op::gate("h", &[0], &[])).push(Op::gate("toffoli", &[0], &[]));
    let err = simulator(4).run(&circuit).unwrap_err();
    assert!(err.to_string().contains("toffoli"));
    assert!(matches!(err, SimulatorError::Aborted { shot: 0, .. }));
}

#[test]
fn test_partial_statevector_save_is_rejected() {
    let mut circuit = Circuit::new(2);
    circuit.push(Op::save(OpType::SaveStatevec, &[1], "sv", SaveType::Single));
    match simulator(1).run(&circuit).unwrap_err() {
        SimulatorError::Aborted { source, .. } => {
            assert!(matches!(*source, SimulatorError::ShapeMismatch { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_sampling_agrees_with_full_shots() {
    let mut circuit = Circuit::new(3).with_memory(3);
    circuit
        .push(Op::gate("ry", &[0], &[1.0]))
        .push(Op::gate("cx", &[0, 2], &[]))
        .push(Op::gate("x", &[1], &[]))
        .push(Op::measure(&[2, 1], &[0, 1], &[]))
        .push(Op::barrier(&[0, 1, 2]))
        .push(Op::measure(&[0], &[2], &[]));

    let shots = 3000;
    let run = |sampling: bool| {
        let config = SimulatorConfig::new()
            .with_shots(shots)
            .with_seed(99)
            .with_measure_sampling(sampling);
        Simulator::new(config).unwrap().run(&circuit).unwrap()
    };
    let sampled = run(true);
    let full = run(false);

    // q0 and q2 are perfectly correlated and q1 is always 1
    for result in [&sampled, &full] {
        assert!(result.counts.keys().all(|k| k == "0x2" || k == "0x7"));
    }
    let expected = (0.5f64).sin().powi(2);
    let freq = |r: &mosq_sim::ExperimentResult| {
        r.counts.get("0x7").copied().unwrap_or(0) as f64 / shots as f64
    };
    assert!((freq(&sampled) - expected).abs() < 0.05);
    assert!((freq(&full) - expected).abs() < 0.05);
}

#[test]
fn test_partial_initialize_before_measure_is_resampled_per_shot() {
    let zero = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)];
    let mut circuit = Circuit::new(2).with_memory(1);
    circuit
        .push(Op::gate("h", &[0], &[]))
        .push(Op::gate("cx", &[0, 1], &[]))
        .push(Op::initialize(&[0], &zero))
        .push(Op::measure(&[1], &[0], &[]));

    let shots = 2000;
    let run = |sampling: bool| {
        let config = SimulatorConfig::new()
            .with_shots(shots)
            .with_seed(9)
            .with_measure_sampling(sampling);
        Simulator::new(config).unwrap().run(&circuit).unwrap()
    };
    // initializing q0 collapses its Bell partner independently on every shot
    for result in [run(true), run(false)] {
        assert_eq!(result.memory.len(), shots);
        assert!((result.probability("0x1") - 0.5).abs() < 0.05);
        assert!((result.probability("0x0") - 0.5).abs() < 0.05);
    }
}

#[test]
fn test_initialize_and_amplitudes() {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let state = [
        Complex64::new(h, 0.0),
        Complex64::new(0.0, 0.0),
        Complex64::new(0.0, 0.0),
        Complex64::new(0.0, h),
    ];
    let mut circuit = Circuit::new(3);
    circuit
        .push(Op::initialize(&[2, 0], &state))
        .push(Op::save_amps(&[0, 1, 2], "amps", &[0, 5], false, SaveType::Single));

    let result = simulator(1).run(&circuit).unwrap();
    let amps = complexes(result.single("amps"));
    assert_relative_eq!(amps[0].re, h, epsilon = EPSILON);
    assert_relative_eq!(amps[1].im, h, epsilon = EPSILON);
}

#[test]
fn test_density_matrix_of_bell_half() {
    let mut circuit = Circuit::new(2);
    circuit
        .push(Op::gate("h", &[0], &[]))
        .push(Op::gate("cx", &[0, 1], &[]))
        .push(Op::save(OpType::SaveDensmat, &[1], "rho", SaveType::Single));

    let result = simulator(1).run(&circuit).unwrap();
    match result.single("rho") {
        Some(SavedValue::Matrix(rho)) => {
            assert_relative_eq!(rho[(0, 0)].re, 0.5, epsilon = EPSILON);
            assert_relative_eq!(rho[(1, 1)].re, 0.5, epsilon = EPSILON);
            assert_relative_eq!(rho[(0, 1)].norm(), 0.0, epsilon = EPSILON);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_averaged_expectation_over_shots() {
    let mut circuit = Circuit::new(1).with_memory(1);
    let z = vec![ExpvalTerm {
        pauli: "Z".to_string(),
        coeff: 1.0,
        sq_coeff: 0.0,
    }];
    circuit
        .push(Op::gate("h", &[0], &[]))
        .push(Op::measure(&[0], &[0], &[]))
        .push(Op::save_expval(&[0], "z", z, false, SaveType::Average));

    let result = simulator(2000).run(&circuit).unwrap();
    match result.average("z") {
        Some(SavedValue::Real(v)) => assert!(v.abs() < 0.1, "mean ⟨Z⟩ was {v}"),
        other => panic!("unexpected {other:?}"),
    }
}

fn gate_sequence() -> impl Strategy<Value = Vec<Op>> {
    let gate = prop_oneof![
        (0usize..3).prop_map(|q| Op::gate("h", &[q], &[])),
        (0usize..3, -3.0f64..3.0).prop_map(|(q, t)| Op::gate("rx", &[q], &[t])),
        (0usize..3, -3.0f64..3.0).prop_map(|(q, t)| Op::gate("MOSQ", &[q, (q + 1) % 3], &[t])),
        (-3.0f64..3.0, 1u64..8, 0u64..8).prop_map(|(t, x, y)| {
            let y = y & !x;
            let z = !(x | y) & 0b111;
            Op::gate("MOSQ_CR", &[0, 1, 2], &[t, x as f64, y as f64, z as f64])
        }),
        Just(Op::gate("ccx", &[0, 1, 2], &[])),
        Just(Op::pauli(&[0, 2], "YX")),
    ];
    prop::collection::vec(gate, 1..12)
}

proptest! {
    #[test]
    fn marginals_stay_normalized(ops in gate_sequence(), subset in prop::sample::subsequence(vec![0usize, 1, 2], 1..=3)) {
        let mut circuit = Circuit::new(3);
        for op in ops {
            circuit.push(op);
        }
        circuit.push(Op::save(OpType::SaveProbs, &subset, "p", SaveType::Single));
        let result = simulator(1).run(&circuit).unwrap();
        let total: f64 = reals(result.single("p")).iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
    }
}
