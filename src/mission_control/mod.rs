//! The mission state machine of the agent.
//!
//! [`MissionController::step`] consumes one [`AgentEvent`] at a time and
//! answers with the [`Effect`]s the runtime has to carry out. It never performs
//! I/O itself, which keeps every transition testable in isolation.

mod event;
mod mission_controller;
mod mission_phase;
mod network_handler;

pub use event::{AgentEvent, Effect, LogLevel};
pub use mission_controller::MissionController;
pub use mission_phase::{MissionPhase, MissionStage, MissionWorkingData};
pub use network_handler::{HandlerContext, NetworkMessageHandler, PassThroughHandler};
