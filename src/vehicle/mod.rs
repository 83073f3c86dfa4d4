//! Boundary to the flight controller of the vehicle the agent flies.

mod sim_vehicle;
mod telemetry;
mod vehicle_binding;
mod vehicle_link;

pub use sim_vehicle::SimVehicle;
pub use telemetry::{FlightMode, VehicleTelemetry};
pub use vehicle_binding::{VehicleBinding, VehicleBindingState};
pub use vehicle_link::{Vehicle, VehicleCommand, VehicleError, VehicleNotification};
