use super::{
    event::{AgentEvent, Effect, LogLevel},
    mission_phase::{MissionPhase, MissionStage, MissionWorkingData},
    network_handler::{HandlerContext, NetworkMessageHandler, PassThroughHandler},
};
use crate::communication::{AddressedMessage, ChannelKind, PowerCommand};
use crate::config::AgentConfig;
use crate::vehicle::{FlightMode, VehicleBinding, VehicleCommand, VehicleTelemetry};
use chrono::{DateTime, Utc};

/// Mission state machine of a single agent.
///
/// Owns the current [`MissionPhase`], its [`MissionWorkingData`] and the
/// [`VehicleBinding`]. All input arrives through [`MissionController::step`],
/// one event at a time; the caller passes a telemetry snapshot of the bound
/// vehicle (or `None` if it cannot provide one) and executes the returned
/// effects in order before stepping the next event.
pub struct MissionController {
    phase: MissionPhase,
    data: MissionWorkingData,
    binding: VehicleBinding,
    net_handler: Box<dyn NetworkMessageHandler>,
    takeoff_alt: f64,
    takeoff_done_alt: f64,
    point_zone: f64,
    tick_threshold: u32,
}

impl MissionController {
    pub fn new(cfg: &AgentConfig) -> Self {
        Self::with_handler(cfg, Box::new(PassThroughHandler))
    }

    pub fn with_handler(cfg: &AgentConfig, net_handler: Box<dyn NetworkMessageHandler>) -> Self {
        Self {
            phase: MissionPhase::Idle,
            data: MissionWorkingData::default(),
            binding: VehicleBinding::new(),
            net_handler,
            takeoff_alt: cfg.takeoff_alt(),
            takeoff_done_alt: cfg.takeoff_done_alt(),
            point_zone: cfg.point_zone(),
            tick_threshold: cfg.tick_threshold(),
        }
    }

    pub fn phase(&self) -> MissionPhase { self.phase }
    pub fn working_data(&self) -> MissionWorkingData { self.data }
    pub fn binding(&self) -> &VehicleBinding { &self.binding }
    pub fn tick_threshold(&self) -> u32 { self.tick_threshold }

    /// Phase the tracker acts on. Without a bound vehicle nothing may be
    /// commanded, whatever phase is stored.
    pub fn effective_phase(&self) -> MissionPhase {
        if self.binding.is_bound() { self.phase } else { MissionPhase::Idle }
    }

    pub fn step(&mut self, event: AgentEvent, telemetry: Option<&VehicleTelemetry>) -> Vec<Effect> {
        match event {
            AgentEvent::VehicleAdded(id) => self.binding.bind(id),
            AgentEvent::VehicleRemoved(id) => self.binding.unbind(id),
            AgentEvent::Armed { vehicle_id, armed } => {
                if !self.binding.is_bound_to(vehicle_id) {
                    return Vec::new();
                }
                self.on_armed_changed(armed, telemetry)
            }
            AgentEvent::FlightMode { vehicle_id, mode } => {
                if !self.binding.is_bound_to(vehicle_id) {
                    return Vec::new();
                }
                self.on_flight_mode_changed(&mode, telemetry)
            }
            AgentEvent::MessageReceived { channel, message } => self.on_message(channel, &message),
            AgentEvent::Tick(now) => match telemetry {
                Some(t) => self.track(now, t),
                None => Vec::new(),
            },
        }
    }

    fn on_armed_changed(&mut self, armed: bool, telemetry: Option<&VehicleTelemetry>) -> Vec<Effect> {
        self.binding.record_armed(armed);
        if !armed {
            let aborted = self.phase != MissionPhase::Idle;
            self.phase = MissionPhase::Idle;
            return if aborted {
                vec![Effect::Log(LogLevel::Info, String::from("Vehicle disarmed, mission aborted."))]
            } else {
                Vec::new()
            };
        }

        let Some(t) = telemetry else {
            return vec![Effect::Log(
                LogLevel::Warn,
                String::from("The mission can not start without vehicle telemetry!"),
            )];
        };
        if t.relative_altitude > self.point_zone {
            return vec![Effect::Log(
                LogLevel::Warn,
                String::from("The mission can not start while the drone is airborne!"),
            )];
        }
        if !t.guided {
            return vec![Effect::Log(
                LogLevel::Warn,
                String::from("The mission can not start while the drone is not in Guided mode!"),
            )];
        }

        self.data.reset();
        self.phase = MissionPhase::Takeoff;
        vec![
            Effect::Log(LogLevel::Info, String::from("Mission starts...")),
            Effect::Vehicle(VehicleCommand::Takeoff { altitude: self.takeoff_alt, show_error: true }),
        ]
    }

    fn on_flight_mode_changed(&mut self, mode: &str, telemetry: Option<&VehicleTelemetry>) -> Vec<Effect> {
        let mut effects = vec![Effect::Log(LogLevel::Info, format!("Flight mode: {mode}"))];
        let previous = self.binding.record_flight_mode(mode);
        let armed = telemetry.map_or(self.binding.state().armed, |t| t.armed);
        // re-arm after a pilot switches a landed vehicle from Land back to Guided
        if FlightMode::from(previous.as_str()) == FlightMode::Land
            && FlightMode::from(mode) == FlightMode::Guided
            && !armed
        {
            effects.push(Effect::Log(LogLevel::Log, String::from("Re-arming after Land -> Guided")));
            effects.push(Effect::Vehicle(VehicleCommand::Arm));
        }
        effects
    }

    fn on_message(&mut self, channel: ChannelKind, message: &AddressedMessage) -> Vec<Effect> {
        let mut effects = vec![Effect::Log(
            LogLevel::Msg,
            format!(
                "{channel} data received from srcID={}: {}",
                message.source_id(),
                message.payload_lossy()
            ),
        )];
        if channel == ChannelKind::Network {
            let context = HandlerContext {
                bound_vehicle_id: self.binding.bound_id(),
                phase: self.effective_phase(),
                armed: self.binding.state().armed,
            };
            effects.extend(self.net_handler.on_message(message, context));
        }
        effects
    }

    /// One tracker tick: runs the handler of the effective phase.
    fn track(&mut self, now: DateTime<Utc>, telemetry: &VehicleTelemetry) -> Vec<Effect> {
        match self.effective_phase() {
            MissionPhase::Idle => Vec::new(),
            MissionPhase::Takeoff => self.track_takeoff(telemetry),
            MissionPhase::Mission => self.track_mission(now),
            MissionPhase::Land => self.track_land(telemetry),
        }
    }

    fn track_takeoff(&mut self, telemetry: &VehicleTelemetry) -> Vec<Effect> {
        if telemetry.relative_altitude > self.takeoff_done_alt {
            self.data.stage = MissionStage::StartMeasurement;
            self.phase = MissionPhase::Mission;
            return vec![Effect::Log(LogLevel::Info, String::from("Takeoff completed."))];
        }
        Vec::new()
    }

    fn track_mission(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.data.stage == MissionStage::StartMeasurement {
            effects.push(Effect::Log(LogLevel::Info, String::from("Starting measurement")));
            effects.push(Effect::Power(PowerCommand::start()));
            self.data.stage = self.data.stage.next();
        }
        // entered in the same tick that started the measurement
        if self.data.stage == MissionStage::HoverAndReport {
            self.data.tick += 1;
            effects.push(Effect::Power(PowerCommand::info(now, self.data.tick)));
            if self.data.tick >= self.tick_threshold {
                effects.push(Effect::Log(LogLevel::Info, String::from("Finishing measurement and landing")));
                effects.push(Effect::Power(PowerCommand::stop()));
                self.phase = MissionPhase::Land;
                effects.push(Effect::Vehicle(VehicleCommand::Land));
                self.data.stage = self.data.stage.next();
            }
        }
        effects
    }

    fn track_land(&mut self, telemetry: &VehicleTelemetry) -> Vec<Effect> {
        if telemetry.relative_altitude < self.point_zone {
            self.phase = MissionPhase::Idle;
            return vec![Effect::Log(LogLevel::Info, String::from("Land completed."))];
        }
        Vec::new()
    }
}
