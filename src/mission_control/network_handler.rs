use super::{event::Effect, mission_phase::MissionPhase};
use crate::communication::AddressedMessage;

/// What a network handler may look at when a peer message arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandlerContext {
    pub bound_vehicle_id: Option<u8>,
    pub phase: MissionPhase,
    pub armed: bool,
}

/// Reaction of the agent to messages from other agents of the formation.
///
/// This is where formation behaviour plugs in, e.g. arming once the
/// predecessor (`own id - 1`) reports it is done. Any such behaviour has to
/// check the phase and armed state it is handed before emitting a vehicle
/// command.
pub trait NetworkMessageHandler: Send + Sync {
    fn on_message(&mut self, message: &AddressedMessage, context: HandlerContext) -> Vec<Effect>;
}

/// Default handler: messages are only logged by the controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughHandler;

impl NetworkMessageHandler for PassThroughHandler {
    fn on_message(&mut self, _message: &AddressedMessage, _context: HandlerContext) -> Vec<Effect> {
        Vec::new()
    }
}
