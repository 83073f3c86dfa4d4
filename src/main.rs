#![allow(dead_code, clippy::similar_names)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
mod communication;
mod config;
mod logger;
mod mission_control;
mod scheduler;
mod vehicle;

use crate::communication::{ChannelEndpoint, ChannelKind, MessageChannel};
use crate::config::AgentConfig;
use crate::mission_control::MissionController;
use crate::scheduler::{AgentRuntime, FleetEvent};
use crate::vehicle::{SimVehicle, Vehicle};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const PREFLIGHT_DELAY: Duration = Duration::from_secs(3);

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    let cfg = AgentConfig::from_env();
    info!(
        "Agent {} on {}: network port {}, power port {}, vehicle link port {}",
        cfg.instance(),
        cfg.host(),
        cfg.net_port(),
        cfg.power_port(),
        cfg.vehicle_link_port()
    );
    info!("Reporting {} ticks per measurement", cfg.tick_threshold());

    let token = CancellationToken::new();
    let network = {
        let remote = SocketAddr::from((cfg.host(), cfg.net_port()));
        let (endpoint, rx) = ChannelEndpoint::start(ChannelKind::Network, remote, token.child_token());
        (Arc::new(endpoint) as Arc<dyn MessageChannel>, rx)
    };
    let power = {
        let remote = SocketAddr::from((cfg.host(), cfg.power_port()));
        let (endpoint, rx) = ChannelEndpoint::start(ChannelKind::Power, remote, token.child_token());
        (Arc::new(endpoint) as Arc<dyn MessageChannel>, rx)
    };

    let (mut runtime, fleet_tx) = AgentRuntime::new(&cfg, MissionController::new(&cfg), network, power);

    // no autopilot link: fly a simulated vehicle under the configured id
    let vehicle = SimVehicle::spawn(cfg.instance().max(1), token.child_token());
    if fleet_tx.send(FleetEvent::Added(Arc::clone(&vehicle) as Arc<dyn Vehicle>)).is_err() {
        fatal!("Mission tracker gone before the first vehicle was announced");
    }
    let vehicle_clone = Arc::clone(&vehicle);
    tokio::spawn(async move {
        vehicle_clone.operator_preflight(PREFLIGHT_DELAY).await;
    });

    let signal_token = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown requested");
        signal_token.cancel();
    });

    runtime.run(token).await;
}
