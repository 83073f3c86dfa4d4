use chrono::{DateTime, Utc};
use strum_macros::Display;

/// The single frame type exchanged on both channels.
///
/// On the network channel `tag` carries the destination peer id, on the
/// power channel it carries the [`PowerCommandKind`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelFrame {
    #[prost(uint32, tag = "1")]
    pub source_id: u32,
    #[prost(uint32, tag = "2")]
    pub tag: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, prost::Enumeration)]
#[repr(i32)]
pub enum PowerCommandKind {
    Start = 0,
    Stop = 1,
    Info = 2,
}

impl PowerCommandKind {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tag(self) -> u8 { self as i32 as u8 }

    pub fn from_tag(tag: u8) -> Option<Self> { Self::try_from(i32::from(tag)).ok() }
}

/// Command for the payload/power controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCommand {
    kind: PowerCommandKind,
    payload: Vec<u8>,
}

impl PowerCommand {
    pub fn start() -> Self { Self { kind: PowerCommandKind::Start, payload: Vec::new() } }

    pub fn stop() -> Self { Self { kind: PowerCommandKind::Stop, payload: Vec::new() } }

    /// Progress report, e.g. `"1718031600.250 The tick is: 4"`.
    #[allow(clippy::cast_precision_loss)]
    pub fn info(timestamp: DateTime<Utc>, tick: u32) -> Self {
        let secs = timestamp.timestamp_millis() as f64 / 1000.0;
        Self {
            kind: PowerCommandKind::Info,
            payload: format!("{secs:.3} The tick is: {tick}").into_bytes(),
        }
    }

    pub fn kind(&self) -> PowerCommandKind { self.kind }
    pub fn payload(&self) -> &[u8] { &self.payload }
    pub fn into_parts(self) -> (PowerCommandKind, Vec<u8>) { (self.kind, self.payload) }

    /// Parses a frame received from the power controller. `None` for unknown kinds.
    pub fn from_frame(frame: ChannelFrame) -> Option<Self> {
        let kind = u8::try_from(frame.tag).ok().and_then(PowerCommandKind::from_tag)?;
        Some(Self { kind, payload: frame.payload })
    }
}
