use strum_macros::{Display, EnumIter};

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Display, EnumIter)]
pub enum MissionPhase {
    #[default]
    Idle,
    Takeoff,
    Mission,
    Land,
}

/// Ordered sub-steps of [`MissionPhase::Mission`].
///
/// `Complete` is terminal. Handing the formation over to the next vehicle and
/// lateral repositioning would be further stages after it; neither is
/// scheduled, and adding one requires its own guards on the next vehicle's
/// state.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Display)]
pub enum MissionStage {
    #[default]
    StartMeasurement,
    HoverAndReport,
    Complete,
}

impl MissionStage {
    pub fn next(self) -> Self {
        match self {
            MissionStage::StartMeasurement => MissionStage::HoverAndReport,
            MissionStage::HoverAndReport | MissionStage::Complete => MissionStage::Complete,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct MissionWorkingData {
    pub stage: MissionStage,
    /// Tracker ticks spent in `HoverAndReport`.
    pub tick: u32,
}

impl MissionWorkingData {
    pub fn reset(&mut self) { *self = Self::default(); }
}
