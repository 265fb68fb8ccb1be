use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::math::vector::from_array;

/// Index of the rocket's longitudinal axis in the sensor frame.
pub const BODY_AXIS: usize = 0;

/// One control tick worth of sensor data. Any field may be NaN when the
/// corresponding reading was dropped.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SensorSample {
    /// time since boot
    pub timestamp_us: u64,
    /// primary accelerometer, g
    pub acc: [f32; 3],
    /// high range accelerometer, g
    pub acc_high: [f32; 3],
    /// rad/s
    pub gyro: [f32; 3],
    /// gauss, carried through for logging only
    pub mag: [f32; 3],
    /// Pa
    pub pressure: f32,
    /// C
    pub temperature: f32,
}

impl SensorSample {
    /// A sample with every reading missing, used when no new data arrived
    /// since the last tick.
    pub fn missing(timestamp_us: u64) -> Self {
        Self {
            timestamp_us,
            acc: [f32::NAN; 3],
            acc_high: [f32::NAN; 3],
            gyro: [f32::NAN; 3],
            mag: [f32::NAN; 3],
            pressure: f32::NAN,
            temperature: f32::NAN,
        }
    }

    /// Primary accelerometer reading along the body axis, g.
    pub fn body_acc(&self) -> f32 {
        self.acc[BODY_AXIS]
    }

    /// Gyro reading, `None` if any axis dropped out.
    pub fn angular_velocity(&self) -> Option<Vector3<f32>> {
        let gyro = from_array(self.gyro);
        if gyro.iter().any(|w| w.is_nan()) {
            None
        } else {
            Some(gyro)
        }
    }

    /// Estimator measurement vector `[pressure, acc, acc]`.
    ///
    /// The two acceleration slots both come from the high range body axis,
    /// with one g of gravity taken out so they line up with the kinematic
    /// acceleration state.
    pub fn measurement(&self) -> Vector3<f32> {
        let acc = self.acc_high[BODY_AXIS] - 1.0;
        Vector3::new(self.pressure, acc, acc)
    }
}

/// Single slot handoff between the sensor task and the control task. The
/// latest published sample always replaces the previous one.
pub struct SampleHandoff<M: RawMutex> {
    signal: Signal<M, SensorSample>,
}

impl<M: RawMutex> SampleHandoff<M> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    pub fn publish(&self, sample: SensorSample) {
        self.signal.signal(sample);
    }

    /// Latest sample if one arrived since the last call, otherwise an all-NaN
    /// sample stamped `now_us`.
    pub fn take_or_missing(&self, now_us: u64) -> SensorSample {
        match self.signal.try_take() {
            Some(sample) => sample,
            None => {
                log_trace!("no sample since last tick, synthesizing one at {}", now_us);
                SensorSample::missing(now_us)
            }
        }
    }
}

impl<M: RawMutex> Default for SampleHandoff<M> {
    fn default() -> Self {
        Self::new()
    }
}
