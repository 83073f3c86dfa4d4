use crate::warn;
use std::{env, net::Ipv4Addr, str::FromStr, time::Duration};
use strum_macros::Display;

/// Base port of the vehicle link (SITL serial-over-TCP), offset per instance.
pub const STL_PORT: u16 = 5760;
/// Base port of the formation network channel, offset per instance.
pub const NET_PORT: u16 = 15760;
/// Fixed port of the payload/power controller.
pub const PWR_PORT: u16 = 35760;
/// Peer id addressing every agent in the formation.
pub const BROADCAST_ID: u8 = 255;
/// Peer id used while no vehicle is bound.
pub const UNBOUND_ID: u8 = 0;
/// Ground-proximity radius in metres.
pub const POINT_ZONE: f64 = 1.0;
/// Target altitude of the autonomous takeoff in metres.
pub const TAKEOFF_ALT: f64 = 5.0;
/// Period of the mission tracker.
pub const MISSION_TRACK_RATE: Duration = Duration::from_millis(1000);
/// Wall-clock length of the hover measurement.
pub const MEASUREMENT_WINDOW: Duration = Duration::from_secs(20);
/// Delay before a dropped channel connection is retried.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Display, PartialEq)]
pub enum ConfigError {
    InvalidValue(&'static str),
    ZeroTrackRate,
}

impl std::error::Error for ConfigError {}

/// Runtime parameters of one agent instance.
///
/// Built from the compile-time defaults above and optionally overridden by
/// `AGENT_*` environment variables in [`AgentConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    instance: u8,
    host: Ipv4Addr,
    track_rate: Duration,
    measurement_window: Duration,
    takeoff_alt: f64,
    point_zone: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance: 0,
            host: Ipv4Addr::LOCALHOST,
            track_rate: MISSION_TRACK_RATE,
            measurement_window: MEASUREMENT_WINDOW,
            takeoff_alt: TAKEOFF_ALT,
            point_zone: POINT_ZONE,
        }
    }
}

impl AgentConfig {
    const INSTANCE_VAR: &'static str = "AGENT_INSTANCE";
    const HOST_VAR: &'static str = "AGENT_HOST";
    const TRACK_RATE_VAR: &'static str = "AGENT_TRACK_RATE_MS";
    const TAKEOFF_ALT_VAR: &'static str = "AGENT_TAKEOFF_ALT";
    const POINT_ZONE_VAR: &'static str = "AGENT_POINT_ZONE";

    /// Reads all overrides from the process environment. Unparsable values are
    /// reported and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AgentConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let mut cfg = Self::default();
        if let Some(id) = Self::parse_var(&lookup, Self::INSTANCE_VAR) {
            cfg.instance = id;
        }
        if let Some(host) = Self::parse_var(&lookup, Self::HOST_VAR) {
            cfg.host = host;
        }
        if let Some(alt) = Self::parse_var(&lookup, Self::TAKEOFF_ALT_VAR) {
            cfg.takeoff_alt = alt;
        }
        if let Some(zone) = Self::parse_var(&lookup, Self::POINT_ZONE_VAR) {
            cfg.point_zone = zone;
        }
        if let Some(ms) = Self::parse_var::<u64, _>(&lookup, Self::TRACK_RATE_VAR) {
            match cfg.clone().with_track_rate(Duration::from_millis(ms)) {
                Ok(updated) => cfg = updated,
                Err(e) => warn!("Ignoring {}: {e}", Self::TRACK_RATE_VAR),
            }
        }
        cfg
    }

    fn parse_var<T, F>(lookup: &F, key: &'static str) -> Option<T>
    where
        T: FromStr,
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup(key)?;
        match raw.trim().parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("{}: '{raw}' for {key}, using default", ConfigError::InvalidValue(key));
                None
            }
        }
    }

    pub fn with_instance(mut self, instance: u8) -> Self {
        self.instance = instance;
        self
    }

    pub fn with_track_rate(mut self, rate: Duration) -> Result<Self, ConfigError> {
        if rate.is_zero() {
            return Err(ConfigError::ZeroTrackRate);
        }
        self.track_rate = rate;
        Ok(self)
    }

    pub fn with_measurement_window(mut self, window: Duration) -> Self {
        self.measurement_window = window;
        self
    }

    pub fn instance(&self) -> u8 { self.instance }
    pub fn host(&self) -> Ipv4Addr { self.host }
    pub fn track_rate(&self) -> Duration { self.track_rate }
    pub fn measurement_window(&self) -> Duration { self.measurement_window }
    pub fn takeoff_alt(&self) -> f64 { self.takeoff_alt }
    pub fn point_zone(&self) -> f64 { self.point_zone }

    /// Altitude above which a takeoff counts as completed.
    pub fn takeoff_done_alt(&self) -> f64 { self.takeoff_alt - self.point_zone }

    /// Number of tracker ticks covering the whole measurement window. Rounded
    /// up so that the window is never cut short.
    #[allow(clippy::cast_possible_truncation)]
    pub fn tick_threshold(&self) -> u32 {
        let window = self.measurement_window.as_millis();
        let period = self.track_rate.as_millis().max(1);
        window.div_ceil(period).min(u128::from(u32::MAX)) as u32
    }

    pub fn net_port(&self) -> u16 { NET_PORT + 10 * u16::from(self.instance) }
    pub fn power_port(&self) -> u16 { PWR_PORT }
    pub fn vehicle_link_port(&self) -> u16 { STL_PORT + 10 * u16::from(self.instance) + 3 }
}
