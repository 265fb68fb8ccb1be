// only use std when feature = "std" is enabled or during testing
#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod fmt;

pub mod config;
pub mod control_loop;
pub mod flight_core;
pub mod math;
pub mod phase;
pub mod sensor;
pub mod state_estimator;
mod utils;

pub use config::{ConfigError, FlightConfig, StageLockoutConfig, Window};
pub use control_loop::ControlLoop;
pub use flight_core::{
    EstimateSnapshot, FlightCoreEvent, FlightCoreEventDispatcher, FlightPhaseController, PyroEvent,
};
pub use phase::{FlightPhase, StageLockStatus};
pub use sensor::{SampleHandoff, SensorSample};
pub use state_estimator::{EstimatorError, NoiseProfile, StateEstimator};

#[cfg(test)]
mod tests;
