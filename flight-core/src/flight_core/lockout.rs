use crate::{config::StageLockoutConfig, phase::StageLockStatus};

/// Estimator values a lockout decision is made on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockoutInputs {
    /// body axis, m/s
    pub velocity: f32,
    /// m above pad
    pub altitude: f32,
    /// rad
    pub angle_from_vertical: f32,
}

/// One-shot gate for a stage event.
///
/// Answers `Wait` until the configured delay after launch has passed, then
/// decides exactly once. A `Go` is handed out a single time; every later
/// evaluation reads `NoGo` so the event can never fire twice. The decision
/// itself stays available through [`StageLockout::status`].
#[derive(Debug, Clone)]
pub struct StageLockout {
    name: &'static str,
    config: StageLockoutConfig,
    decision: Option<StageLockStatus>,
}

impl StageLockout {
    pub fn new(name: &'static str, config: StageLockoutConfig) -> Self {
        Self {
            name,
            config,
            decision: None,
        }
    }

    pub fn evaluate(&mut self, since_launch_ms: u64, inputs: &LockoutInputs) -> StageLockStatus {
        if self.decision.is_some() {
            return StageLockStatus::NoGo;
        }

        if !self.config.enabled {
            return self.latch(StageLockStatus::NoGo);
        }

        if since_launch_ms < self.config.delay_ms as u64 {
            return StageLockStatus::Wait;
        }

        let config = &self.config;
        let go = config.velocity.contains(inputs.velocity)
            && config.altitude.contains(inputs.altitude)
            && config.angle.contains(inputs.angle_from_vertical);
        if !go {
            log_info!(
                "{} lockout: no go, v={} h={} angle={}",
                self.name,
                inputs.velocity,
                inputs.altitude,
                inputs.angle_from_vertical
            );
        }

        self.latch(if go {
            StageLockStatus::Go
        } else {
            StageLockStatus::NoGo
        })
    }

    fn latch(&mut self, status: StageLockStatus) -> StageLockStatus {
        log_info!("{} lockout latched {:?}", self.name, status);
        self.decision = Some(status);
        status
    }

    /// Latched decision, `Wait` while undecided.
    pub fn status(&self) -> StageLockStatus {
        self.decision.unwrap_or(StageLockStatus::Wait)
    }

    pub fn is_latched(&self) -> bool {
        self.decision.is_some()
    }

    pub fn reset(&mut self) {
        self.decision = None;
    }
}
