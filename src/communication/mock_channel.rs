use super::addressing::PeerAddress;
use super::message_channel::{ChannelError, ChannelKind, MessageChannel, check_tag};
use std::sync::Mutex;

/// In-memory channel recording every frame it is asked to send.
pub(crate) struct RecordingChannel {
    kind: ChannelKind,
    address: Mutex<PeerAddress>,
    sent: Mutex<Vec<(u8, Vec<u8>)>>,
}

impl RecordingChannel {
    pub(crate) fn new(kind: ChannelKind) -> Self {
        Self { kind, address: Mutex::new(PeerAddress::UNBOUND), sent: Mutex::new(Vec::new()) }
    }

    pub(crate) fn sent(&self) -> Vec<(u8, Vec<u8>)> { self.sent.lock().unwrap().clone() }

    pub(crate) fn sent_tags(&self) -> Vec<u8> {
        self.sent.lock().unwrap().iter().map(|(tag, _)| *tag).collect()
    }
}

impl MessageChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind { self.kind }

    fn peer_address(&self) -> PeerAddress { *self.address.lock().unwrap() }

    fn set_peer_address(&self, address: PeerAddress) { *self.address.lock().unwrap() = address; }

    fn send(&self, tag: u8, payload: Vec<u8>) -> Result<(), ChannelError> {
        check_tag(self.kind, tag)?;
        self.sent.lock().unwrap().push((tag, payload));
        Ok(())
    }
}
