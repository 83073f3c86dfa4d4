use crate::communication::{AddressedMessage, ChannelKind, MessageChannel, PeerAddress};
use crate::config::AgentConfig;
use crate::mission_control::{AgentEvent, Effect, LogLevel, MissionController};
use crate::vehicle::{Vehicle, VehicleNotification, VehicleTelemetry};
use crate::{error, event, info, log, msg, warn};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Vehicles appearing on or disappearing from the flight controller link.
pub enum FleetEvent {
    Added(Arc<dyn Vehicle>),
    Removed(u8),
}

/// Drives the [`MissionController`].
///
/// A single task multiplexes the mission tracker ticks, fleet changes,
/// vehicle notifications and inbound channel traffic. Every event is stepped
/// through the controller and all resulting effects are executed before the
/// next event is taken, so handlers never overlap.
pub struct AgentRuntime {
    controller: MissionController,
    network: Arc<dyn MessageChannel>,
    power: Arc<dyn MessageChannel>,
    fleet: HashMap<u8, Arc<dyn Vehicle>>,
    fleet_rx: mpsc::UnboundedReceiver<FleetEvent>,
    notify_tx: mpsc::UnboundedSender<VehicleNotification>,
    notify_rx: mpsc::UnboundedReceiver<VehicleNotification>,
    net_rx: mpsc::Receiver<AddressedMessage>,
    pwr_rx: mpsc::Receiver<AddressedMessage>,
    track_rate: Duration,
}

impl AgentRuntime {
    /// Creates the runtime and the sender through which the vehicle link
    /// announces vehicles.
    pub fn new(
        cfg: &AgentConfig,
        controller: MissionController,
        network: (Arc<dyn MessageChannel>, mpsc::Receiver<AddressedMessage>),
        power: (Arc<dyn MessageChannel>, mpsc::Receiver<AddressedMessage>),
    ) -> (Self, mpsc::UnboundedSender<FleetEvent>) {
        let (fleet_tx, fleet_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            controller,
            network: network.0,
            power: power.0,
            fleet: HashMap::new(),
            fleet_rx,
            notify_tx,
            notify_rx,
            net_rx: network.1,
            pwr_rx: power.1,
            track_rate: cfg.track_rate(),
        };
        (runtime, fleet_tx)
    }

    pub fn controller(&self) -> &MissionController { &self.controller }

    /// Runs until `token` is cancelled.
    pub async fn run(&mut self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.track_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately, the tracker fires one period in
        ticker.tick().await;
        info!("Mission tracker running every {}ms", self.track_rate.as_millis());

        loop {
            // pending notifications are always handled before the next tick
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                Some(fleet_event) = self.fleet_rx.recv() => self.handle_fleet_event(fleet_event),
                Some(notification) = self.notify_rx.recv() => {
                    event!("Notification {notification:?}");
                    self.dispatch(AgentEvent::from(notification));
                }
                Some(message) = self.net_rx.recv() => {
                    self.dispatch(AgentEvent::MessageReceived { channel: ChannelKind::Network, message });
                }
                Some(message) = self.pwr_rx.recv() => {
                    self.dispatch(AgentEvent::MessageReceived { channel: ChannelKind::Power, message });
                }
                _ = ticker.tick() => self.dispatch(AgentEvent::Tick(Utc::now())),
            }
        }
        info!("Mission tracker stopped in phase {}", self.controller.phase());
    }

    fn handle_fleet_event(&mut self, fleet_event: FleetEvent) {
        match fleet_event {
            FleetEvent::Added(vehicle) => {
                let id = vehicle.id();
                // reserved ids are never bound, the controller only warns
                if PeerAddress::for_vehicle(id).is_some() {
                    self.track_vehicle(vehicle);
                }
                self.dispatch(AgentEvent::VehicleAdded(id));
            }
            FleetEvent::Removed(id) => {
                self.dispatch(AgentEvent::VehicleRemoved(id));
                self.fleet.remove(&id);
            }
        }
    }

    /// Stores `vehicle` in the fleet. A new link announced under the bound id
    /// takes over the notification subscription from the replaced one, as
    /// binding the same id again is a no-op.
    fn track_vehicle(&mut self, vehicle: Arc<dyn Vehicle>) {
        let id = vehicle.id();
        let Some(previous) = self.fleet.insert(id, Arc::clone(&vehicle)) else {
            return;
        };
        if self.controller.binding().is_bound_to(id) && !Arc::ptr_eq(&previous, &vehicle) {
            log!("MAV {id} re-announced, moving subscription to the new link");
            previous.unsubscribe();
            vehicle.subscribe(self.notify_tx.clone());
        }
    }

    fn bound_vehicle(&self) -> Option<&Arc<dyn Vehicle>> {
        self.controller.binding().bound_id().and_then(|id| self.fleet.get(&id))
    }

    /// Steps the controller with a fresh telemetry snapshot and executes its effects.
    pub fn dispatch(&mut self, agent_event: AgentEvent) {
        let telemetry: Option<VehicleTelemetry> = self.bound_vehicle().map(|v| v.telemetry());
        let effects = self.controller.step(agent_event, telemetry.as_ref());
        for effect in effects {
            self.execute(effect);
        }
    }

    /// Never waits on a peer: vehicle commands run in their own task and
    /// channel sends only queue the frame.
    fn execute(&self, effect: Effect) {
        match effect {
            Effect::Subscribe(id) => match self.fleet.get(&id) {
                Some(vehicle) => vehicle.subscribe(self.notify_tx.clone()),
                None => warn!("Cannot subscribe to unknown MAV {id}"),
            },
            Effect::Unsubscribe(id) => {
                if let Some(vehicle) = self.fleet.get(&id) {
                    vehicle.unsubscribe();
                }
            }
            Effect::SetNetworkAddress(address) => {
                self.network.set_peer_address(address);
                log!("Network channel addressed as {address}");
            }
            Effect::Vehicle(command) => {
                let Some(vehicle) = self.bound_vehicle().map(Arc::clone) else {
                    warn!("Dropping {command:?}, no MAV bound");
                    return;
                };
                tokio::spawn(async move {
                    if let Err(e) = vehicle.execute(&command).await {
                        error!("MAV {} rejected {command:?}: {e}", vehicle.id());
                    }
                });
            }
            Effect::Power(command) => {
                let (kind, payload) = command.into_parts();
                if let Err(e) = self.power.send(kind.tag(), payload) {
                    warn!("Power command {kind} not sent: {e}");
                }
            }
            Effect::Network { target, payload } => {
                if let Err(e) = self.network.send(target.id(), payload) {
                    warn!("Network message to {target} not sent: {e}");
                }
            }
            Effect::Log(level, text) => match level {
                LogLevel::Info => info!("{text}"),
                LogLevel::Log => log!("{text}"),
                LogLevel::Warn => warn!("{text}"),
                LogLevel::Msg => msg!("{text}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::{PeerAddress, PowerCommandKind, mock_channel::RecordingChannel};
    use crate::config::TAKEOFF_ALT;
    use crate::mission_control::MissionPhase;
    use crate::vehicle::{FlightMode, SimVehicle, VehicleCommand, VehicleError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Harness {
        runtime: AgentRuntime,
        fleet_tx: mpsc::UnboundedSender<FleetEvent>,
        network: Arc<RecordingChannel>,
        power: Arc<RecordingChannel>,
        net_tx: mpsc::Sender<AddressedMessage>,
        _pwr_tx: mpsc::Sender<AddressedMessage>,
    }

    fn harness() -> Harness {
        let cfg = AgentConfig::default();
        let network = Arc::new(RecordingChannel::new(ChannelKind::Network));
        let power = Arc::new(RecordingChannel::new(ChannelKind::Power));
        let (net_tx, net_rx) = mpsc::channel(8);
        let (pwr_tx, pwr_rx) = mpsc::channel(8);
        let net_dyn: Arc<dyn MessageChannel> = Arc::clone(&network) as Arc<dyn MessageChannel>;
        let pwr_dyn: Arc<dyn MessageChannel> = Arc::clone(&power) as Arc<dyn MessageChannel>;
        let (runtime, fleet_tx) =
            AgentRuntime::new(&cfg, MissionController::new(&cfg), (net_dyn, net_rx), (pwr_dyn, pwr_rx));
        Harness { runtime, fleet_tx, network, power, net_tx, _pwr_tx: pwr_tx }
    }

    /// Accepts every command, but only after `ack_delay`.
    struct SlowAckVehicle {
        ack_delay: Duration,
        acked: Mutex<Vec<VehicleCommand>>,
    }

    impl SlowAckVehicle {
        fn acked(&self) -> Vec<VehicleCommand> { self.acked.lock().unwrap().clone() }
    }

    #[async_trait]
    impl Vehicle for SlowAckVehicle {
        fn id(&self) -> u8 { 7 }

        fn telemetry(&self) -> VehicleTelemetry { VehicleTelemetry::on_ground(true) }

        fn subscribe(&self, _sink: mpsc::UnboundedSender<VehicleNotification>) {}

        fn unsubscribe(&self) {}

        async fn takeoff(&self, altitude: f64, show_error: bool) -> Result<(), VehicleError> {
            tokio::time::sleep(self.ack_delay).await;
            self.acked.lock().unwrap().push(VehicleCommand::Takeoff { altitude, show_error });
            Ok(())
        }

        async fn land(&self) -> Result<(), VehicleError> {
            tokio::time::sleep(self.ack_delay).await;
            self.acked.lock().unwrap().push(VehicleCommand::Land);
            Ok(())
        }

        async fn set_armed(&self, armed: bool) -> Result<(), VehicleError> {
            tokio::time::sleep(self.ack_delay).await;
            if armed {
                self.acked.lock().unwrap().push(VehicleCommand::Arm);
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_flies_full_mission() {
        info!("Running runtime mission test against simulated vehicle");
        let Harness { mut runtime, fleet_tx, network, power, net_tx, .. } = harness();
        let token = CancellationToken::new();
        let vehicle = SimVehicle::spawn(7, token.child_token());
        assert!(fleet_tx.send(FleetEvent::Added(Arc::clone(&vehicle) as Arc<dyn Vehicle>)).is_ok());

        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            runtime.run(run_token).await;
            runtime
        });

        vehicle.operator_preflight(Duration::from_secs(1)).await;
        let hello = AddressedMessage::new(PeerAddress::for_vehicle(6).unwrap(), b"hello".to_vec());
        net_tx.send(hello).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        token.cancel();
        let runtime = handle.await.unwrap();

        assert_eq!(network.peer_address(), PeerAddress::for_vehicle(7).unwrap());
        assert!(network.sent().is_empty());
        let tags = power.sent_tags();
        assert_eq!(tags.first(), Some(&PowerCommandKind::Start.tag()));
        assert_eq!(tags.last(), Some(&PowerCommandKind::Stop.tag()));
        assert_eq!(tags.iter().filter(|t| **t == PowerCommandKind::Info.tag()).count(), 20);
        assert_eq!(runtime.controller().phase(), MissionPhase::Idle);
        let t = vehicle.telemetry();
        assert!(!t.armed);
        assert!(t.relative_altitude < 0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_unbind_stops_ticks() {
        let Harness { mut runtime, fleet_tx, power, .. } = harness();
        let token = CancellationToken::new();
        let vehicle = SimVehicle::spawn(4, token.child_token());
        assert!(fleet_tx.send(FleetEvent::Added(Arc::clone(&vehicle) as Arc<dyn Vehicle>)).is_ok());

        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            runtime.run(run_token).await;
            runtime
        });

        vehicle.operator_preflight(Duration::from_secs(1)).await;
        // climb to 5 m and report for a few ticks
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(fleet_tx.send(FleetEvent::Removed(4)).is_ok());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let sent_before = power.sent().len();
        assert!(sent_before > 0);
        tokio::time::sleep(Duration::from_secs(30)).await;
        token.cancel();
        let runtime = handle.await.unwrap();

        assert_eq!(power.sent().len(), sent_before);
        assert!(!power.sent_tags().contains(&PowerCommandKind::Stop.tag()));
        assert_eq!(runtime.controller().binding().bound_id(), None);
        // left hovering: nothing commanded the landing
        assert!(vehicle.telemetry().guided);
        assert!(vehicle.telemetry().relative_altitude > 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_command_ack_does_not_hold_events() {
        let Harness { mut runtime, .. } = harness();
        let vehicle =
            Arc::new(SlowAckVehicle { ack_delay: Duration::from_secs(5), acked: Mutex::new(Vec::new()) });
        runtime.handle_fleet_event(FleetEvent::Added(Arc::clone(&vehicle) as Arc<dyn Vehicle>));

        let started = tokio::time::Instant::now();
        runtime.dispatch(AgentEvent::Armed { vehicle_id: 7, armed: true });
        assert_eq!(runtime.controller().phase(), MissionPhase::Takeoff);
        // the abort is handled while the takeoff still waits for its ack
        runtime.dispatch(AgentEvent::Armed { vehicle_id: 7, armed: false });
        assert_eq!(runtime.controller().phase(), MissionPhase::Idle);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(vehicle.acked().is_empty());

        tokio::time::sleep(Duration::from_secs(6)).await;
        let takeoff = VehicleCommand::Takeoff { altitude: TAKEOFF_ALT, show_error: true };
        assert_eq!(vehicle.acked(), vec![takeoff]);
    }

    #[tokio::test]
    async fn test_reannounced_vehicle_takes_over_subscription() {
        let Harness { mut runtime, .. } = harness();
        let stale = Arc::new(SimVehicle::new(7));
        let fresh = Arc::new(SimVehicle::new(7));
        runtime.handle_fleet_event(FleetEvent::Added(Arc::clone(&stale) as Arc<dyn Vehicle>));
        runtime.handle_fleet_event(FleetEvent::Added(Arc::clone(&fresh) as Arc<dyn Vehicle>));
        assert_eq!(runtime.controller().binding().bound_id(), Some(7));

        stale.set_flight_mode(FlightMode::Guided);
        assert!(runtime.notify_rx.try_recv().is_err());

        fresh.set_flight_mode(FlightMode::Guided);
        fresh.set_armed(true).await.unwrap();
        let mut seen = 0;
        while let Ok(notification) = runtime.notify_rx.try_recv() {
            runtime.dispatch(AgentEvent::from(notification));
            seen += 1;
        }
        assert_eq!(seen, 2);
        assert_eq!(runtime.controller().phase(), MissionPhase::Takeoff);
    }

    #[test]
    fn test_reserved_vehicle_ids_are_not_tracked() {
        let Harness { mut runtime, network, .. } = harness();
        for id in [PeerAddress::UNBOUND.id(), PeerAddress::BROADCAST.id()] {
            runtime.handle_fleet_event(FleetEvent::Added(Arc::new(SimVehicle::new(id)) as Arc<dyn Vehicle>));
            assert!(!runtime.fleet.contains_key(&id));
        }
        assert_eq!(runtime.controller().binding().bound_id(), None);
        assert!(network.peer_address().is_unbound());
    }
}
