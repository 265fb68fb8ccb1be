use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Sender as ChannelSender};

use crate::{phase::FlightPhase, state_estimator::EstimatorError};

/// Pyro channel to fire. Emitted once, on entry into the phase that owns it.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyroEvent {
    StageSeparation,
    StageIgnition,
    Drogue,
    Main,
}

impl PyroEvent {
    pub fn on_entry(phase: FlightPhase) -> Option<Self> {
        match phase {
            FlightPhase::Stage => Some(Self::StageSeparation),
            FlightPhase::Ignite => Some(Self::StageIgnition),
            FlightPhase::Drogue => Some(Self::Drogue),
            FlightPhase::Main => Some(Self::Main),
            _ => None,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightCoreEvent {
    PhaseChanged(FlightPhase),
    LaunchDetected {
        launch_time_us: u64,
        /// buffered samples run through the estimator on confirmation
        replayed: usize,
    },
    ApogeeDetected {
        timestamp_us: u64,
    },
    Pyro(PyroEvent),
    /// estimator update skipped this tick
    EstimatorRejected(EstimatorError),
}

pub trait FlightCoreEventDispatcher {
    fn dispatch(&mut self, event: FlightCoreEvent);
}

impl<'ch, M: RawMutex, const N: usize> FlightCoreEventDispatcher
    for ChannelSender<'ch, M, FlightCoreEvent, N>
{
    fn dispatch(&mut self, event: FlightCoreEvent) {
        if self.try_send(event).is_err() {
            log_warn!("FlightCoreEventDispatcher: event queue full");
        }
    }
}

/// Collects events in place, newest dropped once full.
impl<const N: usize> FlightCoreEventDispatcher for heapless::Vec<FlightCoreEvent, N> {
    fn dispatch(&mut self, event: FlightCoreEvent) {
        if self.push(event).is_err() {
            log_trace!("FlightCoreEventDispatcher: event buffer full");
        }
    }
}

impl FlightCoreEventDispatcher for () {
    fn dispatch(&mut self, _event: FlightCoreEvent) {}
}
