//! Synthetic sensor data for flight tests.

use crate::{
    math::vector::STANDARD_GRAVITY, sensor::SensorSample, state_estimator::altitude_to_pressure,
};

/// Static pressure on the pad, deliberately off sea level.
pub const PAD_PRESSURE: f32 = 98_000.0;

pub const BOOST_START_US: u64 = 2_000_000;
pub const BOOST_END_US: u64 = 5_000_000;
/// m/s^2 during boost
pub const BOOST_ACCELERATION: f32 = 60.0;
pub const DROGUE_DESCENT_RATE: f32 = -30.0;
pub const MAIN_DESCENT_RATE: f32 = -6.0;
/// altitude the simulated main canopy opens at
pub const MAIN_OPEN_ALTITUDE: f32 = 250.0;

/// Rocket standing upright on the pad.
pub fn pad_sample(timestamp_us: u64) -> SensorSample {
    SensorSample {
        timestamp_us,
        acc: [1.0, 0.0, 0.0],
        acc_high: [1.0, 0.0, 0.0],
        gyro: [0.0; 3],
        mag: [0.2, 0.0, 0.4],
        pressure: PAD_PRESSURE,
        temperature: 20.0,
    }
}

/// Pad sample with both accelerometers reading `acc_g` on the body axis.
pub fn boost_sample(timestamp_us: u64, acc_g: f32) -> SensorSample {
    let mut sample = pad_sample(timestamp_us);
    sample.acc[0] = acc_g;
    sample.acc_high[0] = acc_g;
    sample
}

/// Vertical flight at `altitude` with kinematic `acceleration` (m/s^2).
pub fn kinematic_sample(timestamp_us: u64, altitude: f32, acceleration: f32) -> SensorSample {
    let acc_g = acceleration / STANDARD_GRAVITY + 1.0;
    let mut sample = boost_sample(timestamp_us, acc_g);
    sample.pressure = altitude_to_pressure(altitude, PAD_PRESSURE);
    sample
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruePoint {
    pub timestamp_us: u64,
    pub altitude: f32,
    pub velocity: f32,
}

/// Single stage vertical flight: pad, 3 s boost, ballistic coast, drogue
/// descent, main descent, and a few seconds resting after touchdown.
pub fn simulated_flight(period_us: u64) -> Vec<(SensorSample, TruePoint)> {
    let dt = period_us as f32 / 1_000_000.0;
    let mut samples = Vec::new();
    let mut altitude = 0.0f32;
    let mut velocity = 0.0f32;
    let mut landed_at = None;
    let mut ts = 0;

    while landed_at.is_none_or(|landed| ts < landed + 5_000_000) {
        let launched = ts >= BOOST_START_US;
        let acceleration = if !launched || landed_at.is_some() {
            0.0
        } else if ts < BOOST_END_US {
            BOOST_ACCELERATION
        } else if velocity > DROGUE_DESCENT_RATE && altitude > MAIN_OPEN_ALTITUDE {
            -STANDARD_GRAVITY
        } else {
            // under canopy, steady descent
            velocity = if altitude > MAIN_OPEN_ALTITUDE {
                DROGUE_DESCENT_RATE
            } else {
                MAIN_DESCENT_RATE
            };
            0.0
        };

        samples.push((
            kinematic_sample(ts, altitude, acceleration),
            TruePoint {
                timestamp_us: ts,
                altitude,
                velocity,
            },
        ));

        altitude += velocity * dt + 0.5 * acceleration * dt * dt;
        velocity += acceleration * dt;
        if launched && landed_at.is_none() && ts > BOOST_END_US && altitude <= 0.0 {
            altitude = 0.0;
            velocity = 0.0;
            landed_at = Some(ts);
        }
        ts += period_us;
    }

    samples
}

/// Time of the simulated apogee.
pub fn true_apogee_us() -> u64 {
    let burnout_velocity = BOOST_ACCELERATION * (BOOST_END_US - BOOST_START_US) as f32 / 1e6;
    BOOST_END_US + (burnout_velocity / STANDARD_GRAVITY * 1e6) as u64
}
