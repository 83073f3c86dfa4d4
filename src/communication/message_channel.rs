use super::addressing::PeerAddress;
use super::agent_messages::PowerCommandKind;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ChannelKind {
    Network,
    Power,
}

impl ChannelKind {
    /// Only the network channel routes by peer id.
    pub fn is_addressed(self) -> bool { matches!(self, ChannelKind::Network) }
}

#[derive(Debug, Display)]
pub enum ChannelError {
    Io(std::io::Error),
    UnboundTarget,
    UnknownTag(u8),
    Closed,
}

impl std::error::Error for ChannelError {}

impl From<std::io::Error> for ChannelError {
    fn from(value: std::io::Error) -> Self { ChannelError::Io(value) }
}

/// Outbound side of a point-to-point message channel.
///
/// Sends are fire-and-forget: a successful return only means the frame was
/// queued, nothing is acknowledged. Inbound frames are delivered separately
/// through the receiver handed out when the channel is started.
pub trait MessageChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Own address, stamped as source id onto every outgoing frame.
    fn peer_address(&self) -> PeerAddress;

    fn set_peer_address(&self, address: PeerAddress);

    /// Queues `payload` with the given tag (destination id or power command kind).
    fn send(&self, tag: u8, payload: Vec<u8>) -> Result<(), ChannelError>;
}

/// Rejects tags a channel must never put on the wire: the unbound sentinel
/// as network destination, unknown command kinds on the power channel.
pub(super) fn check_tag(kind: ChannelKind, tag: u8) -> Result<(), ChannelError> {
    match kind {
        ChannelKind::Network if !PeerAddress::from_raw(tag).is_sendable() => {
            Err(ChannelError::UnboundTarget)
        }
        ChannelKind::Power if PowerCommandKind::from_tag(tag).is_none() => {
            Err(ChannelError::UnknownTag(tag))
        }
        _ => Ok(()),
    }
}
