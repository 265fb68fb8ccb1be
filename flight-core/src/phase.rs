use serde::{Deserialize, Serialize};

#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    Init = 0,
    Ready = 1,
    Boost1 = 2,
    FastBoost1 = 3,
    Fast1 = 4,
    Coast1 = 5,
    Stage = 6,
    Ignite = 7,
    Boost2 = 8,
    FastBoost2 = 9,
    Fast2 = 10,
    Coast2 = 11,
    Drogue = 12,
    Main = 13,
    Landed = 14,
}

impl FlightPhase {
    /// Still on the ground, before launch or after landing.
    pub fn is_on_ground(&self) -> bool {
        matches!(self, Self::Init | Self::Ready | Self::Landed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Ready => "READY",
            Self::Boost1 => "BOOST_1",
            Self::FastBoost1 => "FAST_BOOST_1",
            Self::Fast1 => "FAST_1",
            Self::Coast1 => "COAST_1",
            Self::Stage => "STAGE",
            Self::Ignite => "IGNITE",
            Self::Boost2 => "BOOST_2",
            Self::FastBoost2 => "FAST_BOOST_2",
            Self::Fast2 => "FAST_2",
            Self::Coast2 => "COAST_2",
            Self::Drogue => "DROGUE",
            Self::Main => "MAIN",
            Self::Landed => "LANDED",
        }
    }
}

/// Outcome of a one-shot stage lockout.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLockStatus {
    Go,
    NoGo,
    Wait,
}

impl StageLockStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Wait)
    }
}
