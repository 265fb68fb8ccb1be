use nalgebra::{SMatrix, SVector, Vector3};

use super::{MEASUREMENT_SIZE, STATE_SIZE, index};
use crate::math::vector::STANDARD_GRAVITY;

pub const SEA_LEVEL_PRESSURE: f32 = 101_325.0;

// international barometric formula, troposphere
const BARO_SCALE_HEIGHT: f32 = 44_330.77;
const BARO_EXPONENT: f32 = 5.25588;

/// Pressure (Pa) at `altitude` metres above the point where the pressure is
/// `reference_pressure`.
pub fn altitude_to_pressure(altitude: f32, reference_pressure: f32) -> f32 {
    reference_pressure * libm::powf(1.0 - altitude / BARO_SCALE_HEIGHT, BARO_EXPONENT)
}

/// Inverse of [`altitude_to_pressure`].
pub fn pressure_to_altitude(pressure: f32, reference_pressure: f32) -> f32 {
    BARO_SCALE_HEIGHT * (1.0 - libm::powf(pressure / reference_pressure, 1.0 / BARO_EXPONENT))
}

/// h(x): predicted `[pressure, acc_g, acc_g]` for state `x`.
pub fn measurement_model(
    x: &SVector<f32, STATE_SIZE>,
    reference_pressure: f32,
) -> Vector3<f32> {
    let acc_g = x[index::ACC] / STANDARD_GRAVITY;
    Vector3::new(
        altitude_to_pressure(x[index::POS], reference_pressure),
        acc_g,
        acc_g,
    )
}

/// ∂h/∂x evaluated at `x`. Only the altitude and acceleration columns are
/// non-zero, orientation is not observed.
pub fn measurement_jacobian(
    x: &SVector<f32, STATE_SIZE>,
    reference_pressure: f32,
) -> SMatrix<f32, MEASUREMENT_SIZE, STATE_SIZE> {
    let mut h = SMatrix::zeros();

    let base = 1.0 - x[index::POS] / BARO_SCALE_HEIGHT;
    h[(0, index::POS)] = -reference_pressure * BARO_EXPONENT / BARO_SCALE_HEIGHT
        * libm::powf(base, BARO_EXPONENT - 1.0);

    h[(1, index::ACC)] = 1.0 / STANDARD_GRAVITY;
    h[(2, index::ACC)] = 1.0 / STANDARD_GRAVITY;

    h
}
