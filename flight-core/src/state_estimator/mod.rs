use nalgebra::{Quaternion, SMatrix, SVector, Vector3};

use crate::{
    config::EstimatorConfig,
    math::{MatrixError, fill_diagonal, invert, quaternion, scan_nan, valid_indices},
    phase::FlightPhase,
};

mod measurement;
mod noise;
mod welford;

pub use measurement::{
    SEA_LEVEL_PRESSURE, altitude_to_pressure, measurement_jacobian, measurement_model,
    pressure_to_altitude,
};
pub use noise::{NoiseProfile, NoiseProfileKind};
pub use welford::Welford;

pub const STATE_SIZE: usize = 7;
pub const MEASUREMENT_SIZE: usize = 3;

/// State-sized square matrix: covariance, transition and process noise.
pub type Matrix7 = SMatrix<f32, STATE_SIZE, STATE_SIZE>;

/// Below this body axis speed (m/s) the near ground noise profile is used.
pub const NEAR_GROUND_VELOCITY: f32 = 2.0;

/// Positions inside the state vector.
pub mod index {
    pub const POS: usize = 0;
    pub const VEL: usize = 1;
    pub const ACC: usize = 2;
    pub const Q0: usize = 3;
    pub const Q1: usize = 4;
    pub const Q2: usize = 5;
    pub const Q3: usize = 6;
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorError {
    SizeMismatch { expected: usize, actual: usize },
    /// innovation covariance could not be inverted, update skipped
    Singular,
    /// every measurement was NaN, update skipped
    NoValidMeasurement,
}

impl From<MatrixError> for EstimatorError {
    fn from(error: MatrixError) -> Self {
        match error {
            MatrixError::Singular => Self::Singular,
        }
    }
}

/// x = [pos, vel, acc, q0, q1, q2, q3] along the body axis, and its covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub x: SVector<f32, STATE_SIZE>,
    pub p: Matrix7,
}

impl FilterState {
    fn at_rest(p_diagonal: &SVector<f32, STATE_SIZE>) -> Self {
        let mut x = SVector::zeros();
        x[index::Q0] = 1.0;
        Self {
            x,
            p: SMatrix::from_diagonal(p_diagonal),
        }
    }
}

/// Extended Kalman filter over one kinematic axis plus orientation.
///
/// Process model: constant acceleration on the body axis, first order
/// quaternion integration of the gyro rate. The quaternion rows of F are
/// identity, so orientation covariance only grows by Q.
///
/// Measurement: barometric pressure and the high range accelerometer, see
/// [`measurement_model`]. NaN measurements drop out of the update row by row.
#[derive(Debug, Clone)]
pub struct StateEstimator {
    state: FilterState,
    /// State-transition matrix of the last predict
    f: Matrix7,
    /// Process-noise covariance of the last predict
    q: Matrix7,
    config: EstimatorConfig,
    active_profile: NoiseProfileKind,
    reference_pressure: f32,
}

impl StateEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let p0 = SVector::from_column_slice(&config.initial_covariance);
        Self {
            state: FilterState::at_rest(&p0),
            f: SMatrix::identity(),
            q: SMatrix::zeros(),
            config,
            active_profile: NoiseProfileKind::NearGround,
            reference_pressure: SEA_LEVEL_PRESSURE,
        }
    }

    /// Sets the state vector and a diagonal covariance.
    pub fn initialize(&mut self, x0: &[f32], p0_diagonal: &[f32]) -> Result<(), EstimatorError> {
        for len in [x0.len(), p0_diagonal.len()] {
            if len != STATE_SIZE {
                return Err(EstimatorError::SizeMismatch {
                    expected: STATE_SIZE,
                    actual: len,
                });
            }
        }

        self.state.x = SVector::from_column_slice(x0);
        fill_diagonal(&mut self.state.p, &SVector::from_column_slice(p0_diagonal));
        log_debug!("estimator initialized, p0 = {:?}", p0_diagonal);
        Ok(())
    }

    /// Back to rest on the pad with the configured initial covariance.
    pub fn reset(&mut self) {
        let p0 = SVector::from_column_slice(&self.config.initial_covariance);
        self.state = FilterState::at_rest(&p0);
        self.f = SMatrix::identity();
        self.q = SMatrix::zeros();
        self.active_profile = NoiseProfileKind::NearGround;
    }

    /// Pressure the barometric model treats as zero altitude.
    pub fn set_reference_pressure(&mut self, pressure: f32) {
        self.reference_pressure = pressure;
    }

    pub fn reference_pressure(&self) -> f32 {
        self.reference_pressure
    }

    /// Picks the noise profile for this tick.
    pub fn preprocess(&mut self, phase: FlightPhase) -> NoiseProfileKind {
        let profile = if phase.is_on_ground()
            || libm::fabsf(self.velocity()) < NEAR_GROUND_VELOCITY
        {
            NoiseProfileKind::NearGround
        } else {
            NoiseProfileKind::InFlight
        };

        if profile != self.active_profile {
            log_debug!("noise profile {:?} -> {:?}", self.active_profile, profile);
            self.active_profile = profile;
        }
        profile
    }

    pub fn active_profile_kind(&self) -> NoiseProfileKind {
        self.active_profile
    }

    pub fn active_profile(&self) -> &NoiseProfile {
        match self.active_profile {
            NoiseProfileKind::NearGround => &self.config.near_ground,
            NoiseProfileKind::InFlight => &self.config.in_flight,
        }
    }

    /// Propagates the state `dt` seconds forward.
    ///
    /// `angular_velocity` (rad/s) must not contain NaN, hold the last valid gyro
    /// reading instead. A NaN here would stick in the quaternion for good.
    pub fn predict(&mut self, dt: f32, angular_velocity: &Vector3<f32>) {
        // F, kinematic block only
        self.f = SMatrix::identity();
        self.f[(index::POS, index::VEL)] = dt;
        self.f[(index::POS, index::ACC)] = 0.5 * dt * dt;
        self.f[(index::VEL, index::ACC)] = dt;

        // x̂₋ = F x̂
        self.state.x = self.f * self.state.x;

        let q = quaternion::integrate(&self.orientation(), angular_velocity, dt);
        self.set_orientation(&quaternion::normalized(&q));

        let process = self.active_profile().process_diagonal() * dt;
        fill_diagonal(&mut self.q, &process);

        // P₋ = F P Fᵀ + Q
        let p = &self.state.p;
        self.state.p = self.f * p * self.f.transpose() + self.q;
        self.state.p = 0.5 * (self.state.p + self.state.p.transpose()); // keep symmetric
    }

    /// Fuses `z = [pressure, acc, acc]`, skipping NaN rows.
    ///
    /// On error the state and covariance are left untouched.
    pub fn update(
        &mut self,
        z: &Vector3<f32>,
        noise: &NoiseProfile,
    ) -> Result<(), EstimatorError> {
        let (nan_count, nan_mask) = scan_nan(z.as_slice());
        match MEASUREMENT_SIZE - nan_count {
            0 => Err(EstimatorError::NoValidMeasurement),
            1 => self.update_rows(valid_indices::<1>(nan_mask, MEASUREMENT_SIZE), z, noise),
            2 => self.update_rows(valid_indices::<2>(nan_mask, MEASUREMENT_SIZE), z, noise),
            _ => self.update_rows(valid_indices::<3>(nan_mask, MEASUREMENT_SIZE), z, noise),
        }
    }

    /// Update restricted to the measurement `rows`.
    fn update_rows<const M: usize>(
        &mut self,
        rows: [usize; M],
        z: &Vector3<f32>,
        noise: &NoiseProfile,
    ) -> Result<(), EstimatorError> {
        let h_full = measurement_jacobian(&self.state.x, self.reference_pressure);
        let z_predicted = measurement_model(&self.state.x, self.reference_pressure);

        let mut h = SMatrix::<f32, M, STATE_SIZE>::zeros();
        let mut y = SVector::<f32, M>::zeros();
        let mut r = SMatrix::<f32, M, M>::zeros();
        for (i, &row) in rows.iter().enumerate() {
            h.set_row(i, &h_full.row(row));
            // Innovation y = z - h(x̂₋)
            y[i] = z[row] - z_predicted[row];
            r[(i, i)] = noise.measurement[row];
        }

        let p = &self.state.p;
        let h_t = h.transpose();

        // Innovation covariance S = H P₋ Hᵀ + R
        let s = h * p * h_t + r;

        // Kalman gain K = P₋ Hᵀ S⁻¹
        let s_inverse = invert(&s)?;
        let k = p * h_t * s_inverse;

        // x̂ = x̂₋ + K y
        let x = self.state.x + k * y;
        // P = P₋ - K H P₋
        let p = p - k * h * p;

        self.state.x = x;
        self.state.p = 0.5 * (p + p.transpose());
        Ok(())
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.state
    }

    pub fn state(&self) -> &SVector<f32, STATE_SIZE> {
        &self.state.x
    }

    pub fn covariance(&self) -> &Matrix7 {
        &self.state.p
    }

    /// Matrices of the last predict step.
    pub fn transition(&self) -> (&Matrix7, &Matrix7) {
        (&self.f, &self.q)
    }

    /// m above the reference pressure level
    pub fn altitude(&self) -> f32 {
        self.state.x[index::POS]
    }

    /// body axis, m/s
    pub fn velocity(&self) -> f32 {
        self.state.x[index::VEL]
    }

    /// body axis, m/s^2
    pub fn acceleration(&self) -> f32 {
        self.state.x[index::ACC]
    }

    pub fn orientation(&self) -> Quaternion<f32> {
        let x = &self.state.x;
        Quaternion::new(x[index::Q0], x[index::Q1], x[index::Q2], x[index::Q3])
    }

    fn set_orientation(&mut self, q: &Quaternion<f32>) {
        self.state.x[index::Q0] = q.w;
        self.state.x[index::Q1] = q.i;
        self.state.x[index::Q2] = q.j;
        self.state.x[index::Q3] = q.k;
    }

    /// Body axis velocity projected onto the vertical.
    pub fn geodetic_velocity(&self) -> f32 {
        self.velocity() * quaternion::vertical_component(&self.orientation())
    }

    pub fn angle_from_vertical(&self) -> f32 {
        quaternion::angle_from_vertical(&self.orientation())
    }
}
