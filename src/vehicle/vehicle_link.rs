use super::telemetry::VehicleTelemetry;
use async_trait::async_trait;
use strum_macros::Display;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Takeoff { altitude: f64, show_error: bool },
    Land,
    Arm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VehicleNotification {
    ArmedChanged { vehicle_id: u8, armed: bool },
    FlightModeChanged { vehicle_id: u8, mode: String },
}

impl VehicleNotification {
    pub fn vehicle_id(&self) -> u8 {
        match self {
            VehicleNotification::ArmedChanged { vehicle_id, .. }
            | VehicleNotification::FlightModeChanged { vehicle_id, .. } => *vehicle_id,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum VehicleError {
    NotArmed,
    NotGuided,
    Airborne,
}

impl std::error::Error for VehicleError {}

/// A vehicle as seen through its flight controller link.
///
/// Telemetry reads are synchronous snapshots of the latest values the link
/// received. Command futures resolve once the autopilot accepted or rejected
/// the command, which can take a while; the agent issues them from their own
/// task and never retries. Armed and flight mode
/// changes are pushed to the sink registered with [`Vehicle::subscribe`].
#[async_trait]
pub trait Vehicle: Send + Sync {
    fn id(&self) -> u8;

    fn telemetry(&self) -> VehicleTelemetry;

    /// Replaces any previous subscriber.
    fn subscribe(&self, sink: mpsc::UnboundedSender<VehicleNotification>);

    fn unsubscribe(&self);

    /// Guided takeoff to `altitude` metres. With `show_error` unset a
    /// rejection is swallowed by the link and reported as success.
    async fn takeoff(&self, altitude: f64, show_error: bool) -> Result<(), VehicleError>;

    async fn land(&self) -> Result<(), VehicleError>;

    async fn set_armed(&self, armed: bool) -> Result<(), VehicleError>;

    async fn execute(&self, command: &VehicleCommand) -> Result<(), VehicleError> {
        match *command {
            VehicleCommand::Takeoff { altitude, show_error } => self.takeoff(altitude, show_error).await,
            VehicleCommand::Land => self.land().await,
            VehicleCommand::Arm => self.set_armed(true).await,
        }
    }
}
