use strum_macros::Display;

/// Flight modes of the autopilot, named as the autopilot reports them.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Display)]
pub enum FlightMode {
    Stabilize,
    #[strum(serialize = "Altitude Hold")]
    AltHold,
    Loiter,
    Guided,
    Land,
    #[strum(serialize = "RTL")]
    Rtl,
    Unknown,
}

impl From<&str> for FlightMode {
    fn from(value: &str) -> Self {
        match value {
            "Stabilize" => FlightMode::Stabilize,
            "Altitude Hold" => FlightMode::AltHold,
            "Loiter" => FlightMode::Loiter,
            "Guided" => FlightMode::Guided,
            "Land" => FlightMode::Land,
            "RTL" => FlightMode::Rtl,
            _ => FlightMode::Unknown,
        }
    }
}

/// Snapshot of the vehicle state read at the start of every handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTelemetry {
    /// Altitude above the home position in metres.
    pub relative_altitude: f64,
    pub armed: bool,
    /// Whether the autopilot currently accepts guided commands.
    pub guided: bool,
}

impl VehicleTelemetry {
    pub fn on_ground(guided: bool) -> Self {
        Self { relative_altitude: 0.0, armed: false, guided }
    }
}
