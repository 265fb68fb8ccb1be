use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::{
    config::FlightConfig,
    flight_core::{EstimateSnapshot, FlightCoreEventDispatcher, FlightPhaseController, PyroEvent},
    sensor::SampleHandoff,
    utils::ms_to_us,
};

/// Periodic control task body: pulls the latest sample from the sensor task
/// and advances the flight core. The caller owns the timer and invokes
/// [`ControlLoop::tick`] every `control_period_ms`.
pub struct ControlLoop<'a, M: RawMutex, D: FlightCoreEventDispatcher> {
    samples: &'a SampleHandoff<M>,
    controller: FlightPhaseController<D>,
    ticks: u32,
}

impl<'a, M: RawMutex, D: FlightCoreEventDispatcher> ControlLoop<'a, M, D> {
    pub fn new(config: FlightConfig, samples: &'a SampleHandoff<M>, event_dispatcher: D) -> Self {
        Self {
            samples,
            controller: FlightPhaseController::new(config, event_dispatcher),
            ticks: 0,
        }
    }

    /// One control period. A missing sample becomes an all-NaN one stamped
    /// `now_us`, so the estimator still propagates.
    pub fn tick(&mut self, now_us: u64) -> Option<PyroEvent> {
        let sample = self.samples.take_or_missing(now_us);
        self.ticks = self.ticks.wrapping_add(1);
        self.controller.update(&sample)
    }

    pub fn period_us(&self) -> u64 {
        ms_to_us(self.controller.config().control_period_ms)
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn snapshot(&self) -> EstimateSnapshot {
        self.controller.snapshot()
    }

    pub fn controller(&self) -> &FlightPhaseController<D> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut FlightPhaseController<D> {
        &mut self.controller
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::{flight_core::FlightCoreEvent, phase::FlightPhase, tests::flight::pad_sample};

    #[test]
    fn ticks_through_init_with_dropouts() {
        let handoff = SampleHandoff::<NoopRawMutex>::new();
        let config = FlightConfig {
            init_duration_ms: 100,
            ..FlightConfig::default()
        };
        let events = heapless::Vec::<FlightCoreEvent, 8>::new();
        let mut control = ControlLoop::new(config, &handoff, events);
        assert_eq!(control.period_us(), 10_000);

        let mut now = 0;
        for i in 0..20 {
            // every other tick the sensor task is late
            if i % 2 == 0 {
                handoff.publish(pad_sample(now));
            }
            assert_eq!(control.tick(now), None);
            now += control.period_us();
        }

        assert_eq!(control.ticks(), 20);
        assert_eq!(control.controller().phase(), FlightPhase::Ready);
        assert_eq!(
            control.controller().event_dispatcher().as_slice(),
            &[FlightCoreEvent::PhaseChanged(FlightPhase::Ready)]
        );
        assert_eq!(control.snapshot().phase, FlightPhase::Ready);
        assert_eq!(control.snapshot().timestamp_us, now - control.period_us());
    }

    #[test]
    fn latest_sample_wins() {
        let handoff = SampleHandoff::<NoopRawMutex>::new();
        let mut control = ControlLoop::new(FlightConfig::default(), &handoff, ());

        handoff.publish(pad_sample(1_000));
        handoff.publish(pad_sample(2_000));
        control.tick(5_000);
        assert_eq!(control.snapshot().timestamp_us, 2_000);

        control.tick(15_000);
        assert_eq!(control.snapshot().timestamp_us, 15_000);
    }
}
