use nalgebra::SVector;
use serde::{Deserialize, Serialize};

use super::{MEASUREMENT_SIZE, STATE_SIZE};

/// Diagonal process and measurement noise for one operating regime.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    /// per second, scaled by dt in predict: [pos, vel, acc, q0, q1, q2, q3]
    pub process: [f32; STATE_SIZE],
    /// [pressure (Pa^2), acc (g^2), acc (g^2)]
    pub measurement: [f32; MEASUREMENT_SIZE],
}

impl NoiseProfile {
    pub const NEAR_GROUND: Self = Self {
        process: [1e-3, 1e-2, 1e-1, 1e-6, 1e-6, 1e-6, 1e-6],
        measurement: [4.0, 1e-3, 1e-3],
    };

    pub const IN_FLIGHT: Self = Self {
        process: [1e-2, 1.0, 100.0, 1e-5, 1e-5, 1e-5, 1e-5],
        measurement: [100.0, 1e-2, 1e-2],
    };

    pub fn process_diagonal(&self) -> SVector<f32, STATE_SIZE> {
        SVector::from_column_slice(&self.process)
    }

    pub fn is_valid(&self) -> bool {
        self.process
            .iter()
            .chain(self.measurement.iter())
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseProfileKind {
    NearGround,
    InFlight,
}
