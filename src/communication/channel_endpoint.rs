use super::addressing::{AddressedMessage, PeerAddress};
use super::agent_messages::{ChannelFrame, PowerCommand};
use super::message_channel::{ChannelError, ChannelKind, MessageChannel, check_tag};
use crate::config::RECONNECT_DELAY;
use crate::{info, warn};
use prost::Message;
use std::io::{Cursor, ErrorKind};
use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{ReadHalf, WriteHalf};
use tokio::sync::{broadcast, broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;

/// TCP client side of one message channel.
///
/// Frames are a big-endian `u32` length followed by a prost encoded
/// [`ChannelFrame`]. The connection is re-established after
/// [`RECONNECT_DELAY`] whenever it drops; frames queued while disconnected are
/// discarded.
pub struct ChannelEndpoint {
    kind: ChannelKind,
    own_address: Arc<AtomicU8>,
    downstream_sender: broadcast::Sender<Vec<u8>>,
    close_token: CancellationToken,
}

impl ChannelEndpoint {
    const INBOUND_CAPACITY: usize = 32;
    const OUTBOUND_CAPACITY: usize = 32;
    const MAX_FRAME_LEN: u32 = 64 * 1024;

    async fn handle_connection_rx(
        kind: ChannelKind,
        socket: &mut ReadHalf<'_>,
        own_address: &AtomicU8,
        inbound_sender: &mpsc::Sender<AddressedMessage>,
    ) -> Result<(), ChannelError> {
        loop {
            let length = socket.read_u32().await?;
            if length > Self::MAX_FRAME_LEN {
                return Err(std::io::Error::new(ErrorKind::InvalidData, "oversized frame").into());
            }

            let mut buffer = vec![0u8; length as usize];
            socket.read_exact(&mut buffer).await?;

            let frame = match ChannelFrame::decode(&mut Cursor::new(buffer)) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("{kind} channel dropped undecodable frame: {e}");
                    continue;
                }
            };
            let own = PeerAddress::from_raw(own_address.load(Ordering::Relaxed));
            if let Some(message) = Self::admit(kind, own, frame) {
                inbound_sender.send(message).await.map_err(|_| ChannelError::Closed)?;
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn handle_connection_tx(
        kind: ChannelKind,
        socket: &mut WriteHalf<'_>,
        downstream_receiver: &mut broadcast::Receiver<Vec<u8>>,
    ) -> Result<(), ChannelError> {
        loop {
            match downstream_receiver.recv().await {
                Ok(message_buffer) => {
                    socket.write_u32(message_buffer.len() as u32).await?;
                    socket.write_all(&message_buffer).await?;
                }
                Err(RecvError::Lagged(n)) => warn!("{kind} channel skipped {n} outbound frames"),
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Filters an inbound frame. Network frames must be addressed to us or to
    /// everyone and must not be our own echo; power frames must carry a known
    /// command kind.
    pub(super) fn admit(
        kind: ChannelKind,
        own: PeerAddress,
        frame: ChannelFrame,
    ) -> Option<AddressedMessage> {
        let source = PeerAddress::from_raw(u8::try_from(frame.source_id).ok()?);
        if kind.is_addressed() {
            let destination = PeerAddress::from_raw(u8::try_from(frame.tag).ok()?);
            if !own.accepts(destination) || (source == own && !own.is_unbound()) {
                return None;
            }
            Some(AddressedMessage::new(source, frame.payload))
        } else {
            let (_, payload) = PowerCommand::from_frame(frame)?.into_parts();
            Some(AddressedMessage::new(source, payload))
        }
    }

    /// Connects to `remote` in the background. The returned receiver yields
    /// every admitted inbound message until `token` is cancelled.
    pub fn start(
        kind: ChannelKind,
        remote: SocketAddr,
        token: CancellationToken,
    ) -> (Self, mpsc::Receiver<AddressedMessage>) {
        let downstream_sender = broadcast::Sender::new(Self::OUTBOUND_CAPACITY);
        let (inbound_sender, inbound_receiver) = mpsc::channel(Self::INBOUND_CAPACITY);
        let own_address = Arc::new(AtomicU8::new(PeerAddress::UNBOUND.id()));
        let inst = Self {
            kind,
            own_address: Arc::clone(&own_address),
            downstream_sender: downstream_sender.clone(),
            close_token: token.clone(),
        };

        tokio::spawn(async move {
            loop {
                let connect = tokio::select! {
                    c = TcpStream::connect(remote) => c,
                    () = token.cancelled() => break,
                };

                match connect {
                    Ok(mut socket) => {
                        info!("{kind} channel connected to {remote}");
                        let mut downstream_receiver = downstream_sender.subscribe();
                        let (mut rx_socket, mut tx_socket) = socket.split();

                        let result = tokio::select! {
                            res = ChannelEndpoint::handle_connection_tx(kind, &mut tx_socket, &mut downstream_receiver) => res,
                            res = ChannelEndpoint::handle_connection_rx(kind, &mut rx_socket, &own_address, &inbound_sender) => res,
                            () = token.cancelled() => Ok(()),
                        };
                        let _ = socket.shutdown().await;

                        match result {
                            Err(ChannelError::Io(e))
                                if e.kind() == ErrorKind::UnexpectedEof
                                    || e.kind() == ErrorKind::ConnectionReset
                                    || e.kind() == ErrorKind::ConnectionAborted =>
                            {
                                warn!("{kind} channel to {remote} lost");
                            }
                            Err(ChannelError::Closed) | Ok(()) => break,
                            Err(e) => warn!("{kind} channel closed due to {e:?}"),
                        }
                    }
                    Err(e) => warn!("{kind} channel cannot reach {remote}: {e}"),
                }

                tokio::select! {
                    () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    () = token.cancelled() => break,
                }
            }
        });
        (inst, inbound_receiver)
    }

    pub fn is_connected(&self) -> bool { self.downstream_sender.receiver_count() > 0 }
}

impl MessageChannel for ChannelEndpoint {
    fn kind(&self) -> ChannelKind { self.kind }

    fn peer_address(&self) -> PeerAddress {
        PeerAddress::from_raw(self.own_address.load(Ordering::Relaxed))
    }

    fn set_peer_address(&self, address: PeerAddress) {
        self.own_address.store(address.id(), Ordering::Relaxed);
    }

    fn send(&self, tag: u8, payload: Vec<u8>) -> Result<(), ChannelError> {
        check_tag(self.kind, tag)?;
        let frame = ChannelFrame {
            source_id: u32::from(self.peer_address().id()),
            tag: u32::from(tag),
            payload,
        };
        // no subscriber means no live connection, the frame is dropped
        let _ = self.downstream_sender.send(frame.encode_to_vec());
        Ok(())
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) { self.close_token.cancel(); }
}
