use serde::{Deserialize, Serialize};

use crate::{flight_core::LAUNCH_DETECT_CAPACITY, state_estimator::NoiseProfile};

/// Inclusive `[min, max]` range. NaN is never inside.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub min: f32,
    pub max: f32,
}

impl Window {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn is_valid(&self) -> bool {
        !self.min.is_nan() && !self.max.is_nan() && self.min <= self.max
    }
}

/// Gate for one stage event (separation or ignition).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageLockoutConfig {
    pub enabled: bool,
    /// earliest decision time after launch
    pub delay_ms: u32,
    /// body axis velocity, m/s
    pub velocity: Window,
    /// m above pad
    pub altitude: Window,
    /// angle from vertical, rad
    pub angle: Window,
}

impl StageLockoutConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            delay_ms: 0,
            velocity: Window::new(0.0, 0.0),
            altitude: Window::new(0.0, 0.0),
            angle: Window::new(0.0, 0.0),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub near_ground: NoiseProfile,
    pub in_flight: NoiseProfile,
    /// diagonal of the covariance the filter starts from
    pub initial_covariance: [f32; 7],
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            near_ground: NoiseProfile::NEAR_GROUND,
            in_flight: NoiseProfile::IN_FLIGHT,
            initial_covariance: [1.0, 0.1, 0.1, 1e-4, 1e-4, 1e-4, 1e-4],
        }
    }
}

/// Tunables the flight core reads. Loaded once at boot, never written by the
/// core.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlightConfig {
    pub control_period_ms: u32,
    /// time spent in INIT collecting the pad reference
    pub init_duration_ms: u32,

    /// primary accelerometer body axis threshold, g
    pub launch_detect_acc: f32,
    /// how long the threshold must hold continuously
    pub launch_detect_duration_ms: u32,
    pub launch_detect_replay: bool,

    /// m/s
    pub fast_velocity: f32,
    /// kinematic acceleration below which the motor is considered burnt out, m/s^2
    pub coast_acceleration: f32,

    pub separation: StageLockoutConfig,
    pub ignition: StageLockoutConfig,

    /// m above pad
    pub main_deploy_altitude: f32,
    /// delay between apogee and drogue
    pub drogue_delay_ms: u32,
    /// no chute deploys before this long after boot
    pub deploy_lockout_ms: u32,
    /// m above pad, anything lower counts as landed
    pub grounded_altitude: f32,

    pub estimator: EstimatorConfig,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            control_period_ms: 10,
            init_duration_ms: 5_000,
            launch_detect_acc: 3.0,
            launch_detect_duration_ms: 100,
            launch_detect_replay: true,
            fast_velocity: 100.0,
            coast_acceleration: 0.0,
            separation: StageLockoutConfig::disabled(),
            ignition: StageLockoutConfig::disabled(),
            main_deploy_altitude: 300.0,
            drogue_delay_ms: 1_000,
            deploy_lockout_ms: 10_000,
            grounded_altitude: 5.0,
            estimator: EstimatorConfig::default(),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    ZeroControlPeriod,
    LaunchDetectWindowTooLong { required: usize, capacity: usize },
    InvalidWindow(&'static str),
    InvalidNoise,
    InvalidThreshold(&'static str),
}

impl FlightConfig {
    /// Number of samples the launch detect buffer has to hold to cover one
    /// confirmation window.
    pub fn launch_detect_capacity(&self) -> usize {
        if self.control_period_ms == 0 {
            return 1;
        }
        1 + (self.launch_detect_duration_ms / self.control_period_ms) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let result = self.check();
        if let Err(e) = &result {
            log_warn!("flight config rejected: {:?}", e);
        }
        result
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.control_period_ms == 0 {
            return Err(ConfigError::ZeroControlPeriod);
        }

        let required = self.launch_detect_capacity();
        if required > LAUNCH_DETECT_CAPACITY {
            return Err(ConfigError::LaunchDetectWindowTooLong {
                required,
                capacity: LAUNCH_DETECT_CAPACITY,
            });
        }

        for (name, lockout) in [("separation", &self.separation), ("ignition", &self.ignition)] {
            if lockout.enabled
                && !(lockout.velocity.is_valid()
                    && lockout.altitude.is_valid()
                    && lockout.angle.is_valid())
            {
                return Err(ConfigError::InvalidWindow(name));
            }
        }

        for (name, value) in [
            ("launch_detect_acc", self.launch_detect_acc),
            ("fast_velocity", self.fast_velocity),
            ("coast_acceleration", self.coast_acceleration),
            ("main_deploy_altitude", self.main_deploy_altitude),
            ("grounded_altitude", self.grounded_altitude),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidThreshold(name));
            }
        }

        let estimator = &self.estimator;
        if !estimator.near_ground.is_valid()
            || !estimator.in_flight.is_valid()
            || estimator
                .initial_covariance
                .iter()
                .any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(ConfigError::InvalidNoise);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(FlightConfig::default().validate(), Ok(()));
        assert_eq!(FlightConfig::default().launch_detect_capacity(), 11);
    }

    #[test]
    fn window_is_inclusive_and_rejects_nan() {
        let window = Window::new(-1.0, 1.0);
        assert!(window.contains(-1.0));
        assert!(window.contains(1.0));
        assert!(!window.contains(1.0001));
        assert!(!window.contains(f32::NAN));
    }

    #[test]
    fn rejects_bad_configs() {
        let mut config = FlightConfig::default();
        config.control_period_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroControlPeriod));

        let mut config = FlightConfig::default();
        config.launch_detect_duration_ms = 10_000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::LaunchDetectWindowTooLong {
                required: 1001,
                capacity: LAUNCH_DETECT_CAPACITY,
            })
        );

        let mut config = FlightConfig::default();
        config.separation.enabled = true;
        config.separation.velocity = Window::new(10.0, 5.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidWindow("separation"))
        );

        let mut config = FlightConfig::default();
        config.estimator.in_flight.process[2] = f32::NAN;
        assert_eq!(config.validate(), Err(ConfigError::InvalidNoise));

        let mut config = FlightConfig::default();
        config.grounded_altitude = f32::INFINITY;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreshold("grounded_altitude"))
        );
    }

    #[test]
    fn disabled_lockout_windows_are_not_checked() {
        let mut config = FlightConfig::default();
        config.ignition.velocity = Window::new(1.0, -1.0);
        assert_eq!(config.validate(), Ok(()));
    }
}
