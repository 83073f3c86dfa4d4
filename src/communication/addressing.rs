use crate::config::{BROADCAST_ID, UNBOUND_ID};
use std::fmt;

/// Identifier of a peer on the formation network.
///
/// Vehicle ids map one to one onto peer addresses. Two values are reserved:
/// [`PeerAddress::BROADCAST`] reaches every agent and is never a vehicle
/// identity, [`PeerAddress::UNBOUND`] marks an agent without a vehicle and is
/// never a valid destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress(u8);

impl PeerAddress {
    pub const BROADCAST: PeerAddress = PeerAddress(BROADCAST_ID);
    pub const UNBOUND: PeerAddress = PeerAddress(UNBOUND_ID);

    /// Address of the agent flying vehicle `id`, `None` for the reserved ids.
    pub fn for_vehicle(id: u8) -> Option<Self> {
        match id {
            UNBOUND_ID | BROADCAST_ID => None,
            _ => Some(Self(id)),
        }
    }

    /// Wraps a raw id taken off the wire without any validation.
    pub fn from_raw(id: u8) -> Self { Self(id) }

    pub fn id(self) -> u8 { self.0 }
    pub fn is_broadcast(self) -> bool { self == Self::BROADCAST }
    pub fn is_unbound(self) -> bool { self == Self::UNBOUND }

    /// Whether a frame may be sent to this address.
    pub fn is_sendable(self) -> bool { !self.is_unbound() }

    /// Whether an agent listening on `self` takes a frame sent to `destination`.
    pub fn accepts(self, destination: PeerAddress) -> bool {
        destination.is_broadcast() || (!self.is_unbound() && destination == self)
    }

    /// The next vehicle in the formation ordering (`id + 1`).
    pub fn next_in_formation(self) -> Option<Self> {
        if self.is_unbound() || self.is_broadcast() {
            return None;
        }
        self.0.checked_add(1).and_then(Self::for_vehicle)
    }
}

impl Default for PeerAddress {
    fn default() -> Self { Self::UNBOUND }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BROADCAST => write!(f, "broadcast"),
            Self::UNBOUND => write!(f, "unbound"),
            Self(id) => write!(f, "{id}"),
        }
    }
}

/// A payload received from, or destined to, a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedMessage {
    source_id: PeerAddress,
    payload: Vec<u8>,
}

impl AddressedMessage {
    pub fn new(source_id: PeerAddress, payload: Vec<u8>) -> Self { Self { source_id, payload } }

    pub fn source_id(&self) -> PeerAddress { self.source_id }
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Payload rendered for logs, invalid UTF-8 is replaced.
    pub fn payload_lossy(&self) -> String { String::from_utf8_lossy(&self.payload).into_owned() }
}
