use nalgebra::Vector3;
use serde::Serialize;

use crate::{
    config::FlightConfig,
    phase::{FlightPhase, StageLockStatus},
    sensor::SensorSample,
    state_estimator::{
        EstimatorError, NoiseProfileKind, SEA_LEVEL_PRESSURE, STATE_SIZE, StateEstimator, Welford,
    },
    utils::{elapsed_us, ms_to_us, us_to_s},
};

mod event;
mod launch_detect;
mod lockout;

pub use event::{FlightCoreEvent, FlightCoreEventDispatcher, PyroEvent};
pub use launch_detect::{LAUNCH_DETECT_CAPACITY, LaunchDetect, LaunchDetector};
pub use lockout::{LockoutInputs, StageLockout};

/// Estimator state the filter starts from once the pad reference is known.
const REST_STATE: [f32; STATE_SIZE] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

/// Phases of one propulsive stage, picked by the boost classification.
struct StagePhases {
    boost: FlightPhase,
    fast_boost: FlightPhase,
    fast: FlightPhase,
    coast: FlightPhase,
}

const FIRST_STAGE: StagePhases = StagePhases {
    boost: FlightPhase::Boost1,
    fast_boost: FlightPhase::FastBoost1,
    fast: FlightPhase::Fast1,
    coast: FlightPhase::Coast1,
};

const SECOND_STAGE: StagePhases = StagePhases {
    boost: FlightPhase::Boost2,
    fast_boost: FlightPhase::FastBoost2,
    fast: FlightPhase::Fast2,
    coast: FlightPhase::Coast2,
};

/// What the rest of the system sees of the estimator after a tick.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EstimateSnapshot {
    pub timestamp_us: u64,
    pub phase: FlightPhase,
    pub altitude: f32,
    pub velocity: f32,
    pub acceleration: f32,
    pub geodetic_velocity: f32,
    /// [w, x, y, z]
    pub orientation: [f32; 4],
    pub angle_from_vertical: f32,
    pub noise_profile: NoiseProfileKind,
}

/// Flight phase state machine driving the estimator.
///
/// Call [`FlightPhaseController::update`] once per control tick with the
/// latest sample, or an all-NaN one when nothing new arrived.
pub struct FlightPhaseController<D: FlightCoreEventDispatcher> {
    event_dispatcher: D,
    config: FlightConfig,
    phase: FlightPhase,
    estimator: StateEstimator,

    init_started_us: Option<u64>,
    pad_pressure: Welford,
    launch_detector: LaunchDetector,
    separation: StageLockout,
    ignition: StageLockout,

    launch_time_us: Option<u64>,
    apogee_time_us: Option<u64>,
    /// timestamp the estimator was last propagated to
    last_step_us: Option<u64>,
    last_timestamp_us: u64,
    /// last valid gyro reading, held through dropouts
    angular_velocity: Vector3<f32>,
    rejected_updates: u32,
}

impl<D: FlightCoreEventDispatcher> FlightPhaseController<D> {
    /// `config` is expected to have passed [`FlightConfig::validate`].
    pub fn new(config: FlightConfig, event_dispatcher: D) -> Self {
        let launch_detector = LaunchDetector::new(
            config.launch_detect_acc,
            ms_to_us(config.launch_detect_duration_ms),
            config.launch_detect_replay,
            config.launch_detect_capacity(),
        );
        Self {
            event_dispatcher,
            estimator: StateEstimator::new(config.estimator.clone()),
            separation: StageLockout::new("separation", config.separation.clone()),
            ignition: StageLockout::new("ignition", config.ignition.clone()),
            launch_detector,
            config,
            phase: FlightPhase::Init,
            init_started_us: None,
            pad_pressure: Welford::new(),
            launch_time_us: None,
            apogee_time_us: None,
            last_step_us: None,
            last_timestamp_us: 0,
            angular_velocity: Vector3::zeros(),
            rejected_updates: 0,
        }
    }

    /// Advances the state machine by one sample. Returns the pyro event to
    /// fire if this tick entered a deploy phase.
    pub fn update(&mut self, sample: &SensorSample) -> Option<PyroEvent> {
        let ts = sample.timestamp_us;
        self.last_timestamp_us = ts;

        let next = match self.phase {
            FlightPhase::Init => self.init(sample),
            FlightPhase::Ready => self.ready(sample),
            FlightPhase::Boost1 | FlightPhase::FastBoost1 => {
                self.step(sample);
                self.classify_boost(&FIRST_STAGE)
            }
            FlightPhase::Fast1 | FlightPhase::Coast1 => {
                self.step(sample);
                self.first_stage_coast(ts)
            }
            FlightPhase::Stage => {
                self.step(sample);
                match self.evaluate_ignition(ts) {
                    StageLockStatus::Go => FlightPhase::Ignite,
                    StageLockStatus::Wait => self.classify_coast(&FIRST_STAGE),
                    StageLockStatus::NoGo => self.classify_coast(&SECOND_STAGE),
                }
            }
            FlightPhase::Ignite => {
                self.step(sample);
                if self.estimator.velocity() > self.config.fast_velocity {
                    FlightPhase::FastBoost2
                } else {
                    FlightPhase::Boost2
                }
            }
            FlightPhase::Boost2 | FlightPhase::FastBoost2 => {
                self.step(sample);
                self.classify_boost(&SECOND_STAGE)
            }
            FlightPhase::Fast2 => {
                self.step(sample);
                self.classify_coast(&SECOND_STAGE)
            }
            FlightPhase::Coast2 => {
                self.step(sample);
                self.coast_to_apogee(ts)
            }
            FlightPhase::Drogue => {
                self.step(sample);
                if self.is_grounded() {
                    FlightPhase::Landed
                } else if self.estimator.altitude() < self.config.main_deploy_altitude {
                    FlightPhase::Main
                } else {
                    FlightPhase::Drogue
                }
            }
            FlightPhase::Main => {
                self.step(sample);
                if self.is_grounded() {
                    FlightPhase::Landed
                } else {
                    FlightPhase::Main
                }
            }
            FlightPhase::Landed => FlightPhase::Landed,
        };

        self.transition(next)
    }

    fn transition(&mut self, next: FlightPhase) -> Option<PyroEvent> {
        if next == self.phase {
            return None;
        }

        log_info!(
            "{} -> {} at {}us, h={} v={}",
            self.phase.label(),
            next.label(),
            self.last_timestamp_us,
            self.estimator.altitude(),
            self.estimator.velocity()
        );
        self.phase = next;
        self.event_dispatcher
            .dispatch(FlightCoreEvent::PhaseChanged(next));

        let pyro = PyroEvent::on_entry(next);
        if let Some(pyro) = pyro {
            log_info!("firing {:?}", pyro);
            self.event_dispatcher.dispatch(FlightCoreEvent::Pyro(pyro));
        }
        pyro
    }

    /// Collects the pad pressure, then arms.
    fn init(&mut self, sample: &SensorSample) -> FlightPhase {
        let ts = sample.timestamp_us;
        let started = *self.init_started_us.get_or_insert(ts);
        self.pad_pressure.update(sample.pressure);
        if let Some(w) = sample.angular_velocity() {
            self.angular_velocity = w;
        }

        if elapsed_us(ts, started) < ms_to_us(self.config.init_duration_ms) {
            return FlightPhase::Init;
        }

        let reference = match self.pad_pressure.mean() {
            Some(mean) => mean,
            None => {
                log_warn!("no pad pressure collected, assuming sea level");
                SEA_LEVEL_PRESSURE
            }
        };

        self.estimator.reset();
        let p0 = self.config.estimator.initial_covariance;
        if let Err(e) = self.estimator.initialize(&REST_STATE, &p0) {
            log_error!("estimator initialize failed: {:?}", e);
        }
        self.estimator.set_reference_pressure(reference);
        self.last_step_us = Some(ts);
        self.launch_detector.clear();

        log_info!(
            "pad reference {} Pa from {} samples",
            reference,
            self.pad_pressure.count()
        );
        FlightPhase::Ready
    }

    /// Waits for launch. The estimator is not propagated on the pad.
    fn ready(&mut self, sample: &SensorSample) -> FlightPhase {
        let ts = sample.timestamp_us;
        if let Some(w) = sample.angular_velocity() {
            self.angular_velocity = w;
        }

        match self.launch_detector.feed(sample) {
            LaunchDetect::Quiet => {
                self.last_step_us = Some(ts);
                FlightPhase::Ready
            }
            LaunchDetect::Pending => FlightPhase::Ready,
            LaunchDetect::Confirmed { launch_time_us } => {
                self.launch_time_us = Some(launch_time_us);

                let mut replayed = 0;
                if self.launch_detector.replay_enabled() {
                    while let Some(buffered) = self.launch_detector.pop_front() {
                        self.propagate(&buffered, FlightPhase::Boost1);
                        replayed += 1;
                    }
                } else {
                    self.last_step_us = Some(ts);
                }
                self.launch_detector.clear();

                log_info!(
                    "launch at {}us, replayed {} samples",
                    launch_time_us,
                    replayed
                );
                self.event_dispatcher.dispatch(FlightCoreEvent::LaunchDetected {
                    launch_time_us,
                    replayed,
                });
                FlightPhase::Boost1
            }
        }
    }

    fn step(&mut self, sample: &SensorSample) {
        self.propagate(sample, self.phase);
    }

    /// One predict and update of the estimator up to `sample`.
    fn propagate(&mut self, sample: &SensorSample, phase: FlightPhase) {
        let ts = sample.timestamp_us;
        let dt = match self.last_step_us {
            Some(last) => us_to_s(elapsed_us(ts, last)),
            None => 0.0,
        };
        if self.last_step_us.is_none_or(|last| ts > last) {
            self.last_step_us = Some(ts);
        }

        if let Some(w) = sample.angular_velocity() {
            self.angular_velocity = w;
        }

        self.estimator.preprocess(phase);
        self.estimator.predict(dt, &self.angular_velocity);

        let noise = *self.estimator.active_profile();
        if let Err(e) = self.estimator.update(&sample.measurement(), &noise) {
            self.reject(ts, e);
        }
    }

    fn reject(&mut self, ts: u64, error: EstimatorError) {
        self.rejected_updates = self.rejected_updates.saturating_add(1);
        match error {
            EstimatorError::NoValidMeasurement => {
                log_debug!("no valid measurement at {}us, predict only", ts)
            }
            _ => log_warn!("estimator update rejected at {}us: {:?}", ts, error),
        }
        self.event_dispatcher
            .dispatch(FlightCoreEvent::EstimatorRejected(error));
    }

    fn classify_boost(&self, stage: &StagePhases) -> FlightPhase {
        let fast = self.estimator.velocity() > self.config.fast_velocity;
        let coasting = self.estimator.acceleration() < self.config.coast_acceleration;
        match (fast, coasting) {
            (false, false) => stage.boost,
            (true, false) => stage.fast_boost,
            (false, true) => stage.coast,
            (true, true) => stage.fast,
        }
    }

    fn classify_coast(&self, stage: &StagePhases) -> FlightPhase {
        if self.estimator.geodetic_velocity() > self.config.fast_velocity {
            stage.fast
        } else {
            stage.coast
        }
    }

    fn first_stage_coast(&mut self, ts: u64) -> FlightPhase {
        if self.evaluate_separation(ts) == StageLockStatus::Go {
            return FlightPhase::Stage;
        }
        if self.evaluate_ignition(ts) == StageLockStatus::Go {
            return FlightPhase::Ignite;
        }

        if self.separation.status().is_resolved() && self.ignition.status().is_resolved() {
            self.classify_coast(&SECOND_STAGE)
        } else {
            self.classify_coast(&FIRST_STAGE)
        }
    }

    fn coast_to_apogee(&mut self, ts: u64) -> FlightPhase {
        if self.apogee_time_us.is_none() && self.estimator.velocity() < 0.0 {
            log_info!("apogee at {}us, h={}", ts, self.estimator.altitude());
            self.apogee_time_us = Some(ts);
            self.event_dispatcher
                .dispatch(FlightCoreEvent::ApogeeDetected { timestamp_us: ts });
        }

        if let Some(apogee) = self.apogee_time_us {
            let delay_passed = elapsed_us(ts, apogee) >= ms_to_us(self.config.drogue_delay_ms);
            let lockout_passed = ts >= ms_to_us(self.config.deploy_lockout_ms);
            if delay_passed && lockout_passed {
                return FlightPhase::Drogue;
            }
        }

        self.classify_coast(&SECOND_STAGE)
    }

    fn lockout_inputs(&self) -> LockoutInputs {
        LockoutInputs {
            velocity: self.estimator.velocity(),
            altitude: self.estimator.altitude(),
            angle_from_vertical: self.estimator.angle_from_vertical(),
        }
    }

    fn since_launch_ms(&self, ts: u64) -> u64 {
        self.launch_time_us
            .map_or(0, |launch| elapsed_us(ts, launch) / 1_000)
    }

    fn evaluate_separation(&mut self, ts: u64) -> StageLockStatus {
        let inputs = self.lockout_inputs();
        self.separation.evaluate(self.since_launch_ms(ts), &inputs)
    }

    fn evaluate_ignition(&mut self, ts: u64) -> StageLockStatus {
        let inputs = self.lockout_inputs();
        self.ignition.evaluate(self.since_launch_ms(ts), &inputs)
    }

    fn is_grounded(&self) -> bool {
        self.estimator.altitude() < self.config.grounded_altitude
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn estimator(&self) -> &StateEstimator {
        &self.estimator
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn separation_status(&self) -> StageLockStatus {
        self.separation.status()
    }

    pub fn ignition_status(&self) -> StageLockStatus {
        self.ignition.status()
    }

    pub fn launch_time_us(&self) -> Option<u64> {
        self.launch_time_us
    }

    pub fn apogee_time_us(&self) -> Option<u64> {
        self.apogee_time_us
    }

    /// Estimator updates skipped since boot, dropouts included.
    pub fn rejected_updates(&self) -> u32 {
        self.rejected_updates
    }

    pub fn event_dispatcher(&self) -> &D {
        &self.event_dispatcher
    }

    pub fn event_dispatcher_mut(&mut self) -> &mut D {
        &mut self.event_dispatcher
    }

    pub fn snapshot(&self) -> EstimateSnapshot {
        let q = self.estimator.orientation();
        EstimateSnapshot {
            timestamp_us: self.last_timestamp_us,
            phase: self.phase,
            altitude: self.estimator.altitude(),
            velocity: self.estimator.velocity(),
            acceleration: self.estimator.acceleration(),
            geodetic_velocity: self.estimator.geodetic_velocity(),
            orientation: [q.w, q.i, q.j, q.k],
            angle_from_vertical: self.estimator.angle_from_vertical(),
            noise_profile: self.estimator.active_profile_kind(),
        }
    }

    /// Back to INIT as if freshly booted. The dispatcher is kept.
    pub fn reset(&mut self) {
        log_info!("flight core reset");
        self.phase = FlightPhase::Init;
        self.estimator.reset();
        self.estimator.set_reference_pressure(SEA_LEVEL_PRESSURE);
        self.init_started_us = None;
        self.pad_pressure.clear();
        self.launch_detector.clear();
        self.separation.reset();
        self.ignition.reset();
        self.launch_time_us = None;
        self.apogee_time_us = None;
        self.last_step_us = None;
        self.last_timestamp_us = 0;
        self.angular_velocity = Vector3::zeros();
        self.rejected_updates = 0;
    }
}
