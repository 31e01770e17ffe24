//! Standard gate matrices
//!
//! Constant matrices for fixed gates and builders for parameterized ones.
//! Two-qubit matrices index rows/columns with bit 0 on the first listed qubit.

use mosq_state::{CMatrix, Matrix2};
use num_complex::Complex64;

// Compile-time constant helpers
const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);
const NEG_I: Complex64 = Complex64::new(0.0, -1.0);

const INV_SQRT2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Phase applied by `s`
pub const PHASE_S: Complex64 = I;

/// Phase applied by `sdg`
pub const PHASE_SDG: Complex64 = NEG_I;

/// Phase applied by `t`: (1+i)/√2
pub const PHASE_T: Complex64 = Complex64::new(INV_SQRT2, INV_SQRT2);

/// Phase applied by `tdg`: (1-i)/√2
pub const PHASE_TDG: Complex64 = Complex64::new(INV_SQRT2, -INV_SQRT2);

/// √X gate matrix
/// SX = 1/2 * [[1+i, 1-i],
///             [1-i, 1+i]]
pub const SX: Matrix2 = [
    [Complex64::new(0.5, 0.5), Complex64::new(0.5, -0.5)],
    [Complex64::new(0.5, -0.5), Complex64::new(0.5, 0.5)],
];

/// √X† gate matrix
pub const SXDG: Matrix2 = [
    [Complex64::new(0.5, -0.5), Complex64::new(0.5, 0.5)],
    [Complex64::new(0.5, 0.5), Complex64::new(0.5, -0.5)],
];

/// Echoed cross-resonance gate matrix
/// ECR = 1/√2 * [[ 0, 1,  0, i],
///               [ 1, 0, -i, 0],
///               [ 0, i,  0, 1],
///               [-i, 0,  1, 0]]
pub const ECR: [[Complex64; 4]; 4] = [
    [ZERO, Complex64::new(INV_SQRT2, 0.0), ZERO, Complex64::new(0.0, INV_SQRT2)],
    [Complex64::new(INV_SQRT2, 0.0), ZERO, Complex64::new(0.0, -INV_SQRT2), ZERO],
    [ZERO, Complex64::new(0.0, INV_SQRT2), ZERO, Complex64::new(INV_SQRT2, 0.0)],
    [Complex64::new(0.0, -INV_SQRT2), ZERO, Complex64::new(INV_SQRT2, 0.0), ZERO],
];

/// General single-qubit rotation U3(θ, φ, λ)
///
/// U3 = [[cos(θ/2),          -e^(iλ) sin(θ/2)],
///       [e^(iφ) sin(θ/2),  e^(i(φ+λ)) cos(θ/2)]]
pub fn u3(theta: f64, phi: f64, lambda: f64) -> Matrix2 {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(c, 0.0), -Complex64::from_polar(s, lambda)],
        [
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        ],
    ]
}

/// U3 with an extra global phase `e^(iγ)`
pub fn u4(theta: f64, phi: f64, lambda: f64, gamma: f64) -> Matrix2 {
    let g = Complex64::from_polar(1.0, gamma);
    let m = u3(theta, phi, lambda);
    [[g * m[0][0], g * m[0][1]], [g * m[1][0], g * m[1][1]]]
}

/// Rotation by θ about the axis cos(φ)X + sin(φ)Y
pub fn r(theta: f64, phi: f64) -> Matrix2 {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(c, 0.0), NEG_I * Complex64::from_polar(s, -phi)],
        [NEG_I * Complex64::from_polar(s, phi), Complex64::new(c, 0.0)],
    ]
}

/// Hadamard as `u(π/2, 0, π)`
pub fn hadamard() -> Matrix2 {
    u3(std::f64::consts::FRAC_PI_2, 0.0, std::f64::consts::PI)
}

/// `H+S`: S applied after H, `u(π/2, π/2, π)`
pub fn h_then_s() -> Matrix2 {
    u3(
        std::f64::consts::FRAC_PI_2,
        std::f64::consts::FRAC_PI_2,
        std::f64::consts::PI,
    )
}

/// `SDG+H`: H applied after S†, `u(π/2, 0, π/2)`
pub fn sdg_then_h() -> Matrix2 {
    u3(std::f64::consts::FRAC_PI_2, 0.0, std::f64::consts::FRAC_PI_2)
}

pub fn ecr() -> CMatrix {
    CMatrix::from_array(&ECR)
}
