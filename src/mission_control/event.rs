use crate::communication::{AddressedMessage, ChannelKind, PeerAddress, PowerCommand};
use crate::vehicle::{VehicleCommand, VehicleNotification};
use chrono::{DateTime, Utc};
use strum_macros::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    VehicleAdded(u8),
    VehicleRemoved(u8),
    Armed { vehicle_id: u8, armed: bool },
    FlightMode { vehicle_id: u8, mode: String },
    MessageReceived { channel: ChannelKind, message: AddressedMessage },
    Tick(DateTime<Utc>),
}

impl From<VehicleNotification> for AgentEvent {
    fn from(value: VehicleNotification) -> Self {
        match value {
            VehicleNotification::ArmedChanged { vehicle_id, armed } => {
                AgentEvent::Armed { vehicle_id, armed }
            }
            VehicleNotification::FlightModeChanged { vehicle_id, mode } => {
                AgentEvent::FlightMode { vehicle_id, mode }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogLevel {
    Info,
    Log,
    Warn,
    Msg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Subscribe(u8),
    Unsubscribe(u8),
    SetNetworkAddress(PeerAddress),
    Vehicle(VehicleCommand),
    Power(PowerCommand),
    Network { target: PeerAddress, payload: Vec<u8> },
    Log(LogLevel, String),
}
