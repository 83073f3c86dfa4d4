//! Message channels connecting the agent to its peers.
//!
//! Two instances exist at runtime: the formation network channel, which is
//! addressed by vehicle id, and the unaddressed power channel towards the
//! payload controller. Both share the same length-prefixed frame format
//! defined in `agent_messages`.

mod addressing;
mod agent_messages;
mod channel_endpoint;
mod message_channel;
#[cfg(test)]
pub(crate) mod mock_channel;

pub use addressing::{AddressedMessage, PeerAddress};
pub use agent_messages::{ChannelFrame, PowerCommand, PowerCommandKind};
pub use channel_endpoint::ChannelEndpoint;
pub use message_channel::{ChannelError, ChannelKind, MessageChannel};
