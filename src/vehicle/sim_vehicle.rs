use super::{
    telemetry::{FlightMode, VehicleTelemetry},
    vehicle_link::{Vehicle, VehicleError, VehicleNotification},
};
use crate::{event, log};
use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct SimState {
    altitude: f64,
    armed: bool,
    mode: FlightMode,
    target_alt: Option<f64>,
}

/// Point-mass multirotor used when no real autopilot is attached.
///
/// Only vertical motion is modelled: a guided takeoff climbs at
/// [`SimVehicle::CLIMB_RATE`] towards its target, `Land` descends at
/// [`SimVehicle::DESCENT_RATE`] and disarms on touchdown like the autopilot does.
pub struct SimVehicle {
    id: u8,
    state: Mutex<SimState>,
    sink: Mutex<Option<mpsc::UnboundedSender<VehicleNotification>>>,
}

impl SimVehicle {
    const STEP: Duration = Duration::from_millis(100);
    const CLIMB_RATE: f64 = 1.0;
    const DESCENT_RATE: f64 = 0.7;
    const ALT_NOISE: f64 = 0.02;
    const GROUND_ALT: f64 = 0.1;

    pub fn new(id: u8) -> Self {
        Self {
            id,
            state: Mutex::new(SimState {
                altitude: 0.0,
                armed: false,
                mode: FlightMode::Stabilize,
                target_alt: None,
            }),
            sink: Mutex::new(None),
        }
    }

    /// Creates the vehicle and integrates its motion until `token` is cancelled.
    pub fn spawn(id: u8, token: CancellationToken) -> Arc<Self> {
        let vehicle = Arc::new(Self::new(id));
        let vehicle_local = Arc::clone(&vehicle);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Self::STEP);
            loop {
                tokio::select! {
                    _ = ticker.tick() => vehicle_local.advance(Self::STEP),
                    () = token.cancelled() => break,
                }
            }
        });
        vehicle
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notifications: Vec<VehicleNotification>) {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = sink.as_ref() {
            for n in notifications {
                event!("Vehicle {} -> {n:?}", self.id);
                let _ = tx.send(n);
            }
        }
    }

    /// Mode change requested from outside the agent (RC or ground station).
    pub fn set_flight_mode(&self, mode: FlightMode) {
        let changed = {
            let mut s = self.state();
            let changed = s.mode != mode;
            s.mode = mode;
            if mode != FlightMode::Guided {
                s.target_alt = None;
            }
            changed
        };
        if changed {
            self.notify(vec![VehicleNotification::FlightModeChanged {
                vehicle_id: self.id,
                mode: mode.to_string(),
            }]);
        }
    }

    /// What a pilot does before a mission: switch to Guided, then arm.
    pub async fn operator_preflight(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.set_flight_mode(FlightMode::Guided);
        tokio::time::sleep(delay).await;
        if let Err(e) = self.set_armed(true).await {
            log!("Operator could not arm vehicle {}: {e}", self.id);
        }
    }

    /// Integrates the vertical motion over `dt`.
    pub fn advance(&self, dt: Duration) {
        let dt_s = dt.as_secs_f64();
        let mut notifications = Vec::new();
        {
            let mut s = self.state();
            match s.mode {
                FlightMode::Land => {
                    s.altitude = (s.altitude - Self::DESCENT_RATE * dt_s).max(0.0);
                    if s.altitude <= 0.0 && s.armed {
                        s.armed = false;
                        notifications.push(VehicleNotification::ArmedChanged {
                            vehicle_id: self.id,
                            armed: false,
                        });
                    }
                }
                FlightMode::Guided if s.armed => {
                    if let Some(target) = s.target_alt {
                        let max_step = Self::CLIMB_RATE * dt_s;
                        s.altitude += (target - s.altitude).clamp(-max_step, max_step);
                    }
                }
                _ => {}
            }
        }
        self.notify(notifications);
    }
}

#[async_trait]
impl Vehicle for SimVehicle {
    fn id(&self) -> u8 { self.id }

    fn telemetry(&self) -> VehicleTelemetry {
        let s = self.state();
        let noise = if s.altitude > Self::GROUND_ALT {
            rand::rng().random_range(-Self::ALT_NOISE..=Self::ALT_NOISE)
        } else {
            0.0
        };
        VehicleTelemetry {
            relative_altitude: (s.altitude + noise).max(0.0),
            armed: s.armed,
            guided: s.mode == FlightMode::Guided,
        }
    }

    fn subscribe(&self, sink: mpsc::UnboundedSender<VehicleNotification>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    fn unsubscribe(&self) { *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = None; }

    async fn takeoff(&self, altitude: f64, show_error: bool) -> Result<(), VehicleError> {
        let res = {
            let mut s = self.state();
            if !s.armed {
                Err(VehicleError::NotArmed)
            } else if s.mode != FlightMode::Guided {
                Err(VehicleError::NotGuided)
            } else {
                s.target_alt = Some(altitude);
                Ok(())
            }
        };
        if show_error { res } else { Ok(()) }
    }

    async fn land(&self) -> Result<(), VehicleError> {
        self.set_flight_mode(FlightMode::Land);
        Ok(())
    }

    async fn set_armed(&self, armed: bool) -> Result<(), VehicleError> {
        let changed = {
            let mut s = self.state();
            if !armed && s.altitude > Self::GROUND_ALT {
                return Err(VehicleError::Airborne);
            }
            let changed = s.armed != armed;
            s.armed = armed;
            if !armed {
                s.target_alt = None;
            }
            changed
        };
        if changed {
            self.notify(vec![VehicleNotification::ArmedChanged { vehicle_id: self.id, armed }]);
        }
        Ok(())
    }
}
