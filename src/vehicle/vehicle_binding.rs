use crate::communication::PeerAddress;
use crate::mission_control::{Effect, LogLevel};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleBindingState {
    pub bound_vehicle_id: Option<u8>,
    /// Last flight mode reported by any bound vehicle. Survives rebinding.
    pub previous_flight_mode: String,
    /// Mirror of the bound vehicle's armed flag as last notified.
    pub armed: bool,
}

/// Tracks which vehicle the agent is flying.
///
/// Binding changes never touch the vehicle or the network channel directly,
/// they return the subscription and addressing effects for the runtime to
/// carry out.
#[derive(Debug, Default)]
pub struct VehicleBinding {
    state: VehicleBindingState,
}

impl VehicleBinding {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> &VehicleBindingState { &self.state }
    pub fn bound_id(&self) -> Option<u8> { self.state.bound_vehicle_id }
    pub fn is_bound(&self) -> bool { self.state.bound_vehicle_id.is_some() }
    pub fn is_bound_to(&self, vehicle_id: u8) -> bool { self.state.bound_vehicle_id == Some(vehicle_id) }

    /// Attaches `vehicle_id` as the active vehicle, detaching the previous one.
    pub fn bind(&mut self, vehicle_id: u8) -> Vec<Effect> {
        if self.is_bound_to(vehicle_id) {
            return Vec::new();
        }
        let Some(address) = PeerAddress::for_vehicle(vehicle_id) else {
            return vec![Effect::Log(
                LogLevel::Warn,
                format!("Ignoring MAV with reserved ID {vehicle_id}"),
            )];
        };

        let mut effects = Vec::with_capacity(4);
        if let Some(previous) = self.state.bound_vehicle_id.replace(vehicle_id) {
            effects.push(Effect::Unsubscribe(previous));
        }
        self.state.armed = false;
        effects.push(Effect::Subscribe(vehicle_id));
        effects.push(Effect::SetNetworkAddress(address));
        effects.push(Effect::Log(LogLevel::Info, format!("New MAV connected with ID: {vehicle_id}")));
        effects
    }

    /// Detaches `vehicle_id` if, and only if, it is the bound vehicle.
    pub fn unbind(&mut self, vehicle_id: u8) -> Vec<Effect> {
        if !self.is_bound_to(vehicle_id) {
            return Vec::new();
        }
        self.state.bound_vehicle_id = None;
        self.state.armed = false;
        vec![
            Effect::Unsubscribe(vehicle_id),
            Effect::SetNetworkAddress(PeerAddress::UNBOUND),
            Effect::Log(LogLevel::Info, format!("MAV disconnected with ID: {vehicle_id}")),
        ]
    }

    pub(crate) fn record_armed(&mut self, armed: bool) { self.state.armed = armed; }

    /// Stores `mode` as the latest flight mode and hands back the one it replaces.
    pub(crate) fn record_flight_mode(&mut self, mode: &str) -> String {
        std::mem::replace(&mut self.state.previous_flight_mode, mode.to_owned())
    }
}
