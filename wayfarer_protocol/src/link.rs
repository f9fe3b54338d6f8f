// Transport seam between the sync engine and whatever carries messages.
//
// `RelayLink` is the only thing `wayfarer_sync` knows about the network: it
// can push a `ClientMessage` out and drain whatever `ServerMessage`s have
// arrived. Both calls must be non-blocking; the sync engine runs them from
// the game tick. `wayfarer_relay::client::NetClient` is the TCP
// implementation; tests use in-memory links.
//
// `encode`/`decode` pair the framing in `framing.rs` with JSON so every
// implementation writes the same bytes.

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::framing::{read_message, write_message};
use crate::message::{ClientMessage, ServerMessage};

/// Errors raised by a `RelayLink` or the framed JSON helpers.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("relay i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("received invalid message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("relay connection closed")]
    Closed,
    #[error("relay rejected the connection: {0}")]
    Rejected(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// A live, non-blocking connection to the relay.
pub trait RelayLink {
    /// Send one message. Must not block on the peer.
    fn send(&mut self, msg: &ClientMessage) -> Result<(), LinkError>;

    /// Drain every message received since the last call, in arrival order.
    /// Returns `LinkError::Closed` once the peer is gone and nothing is left.
    fn poll(&mut self) -> Result<Vec<ServerMessage>, LinkError>;

    /// Best-effort graceful close.
    fn close(&mut self);
}

/// Serialize `msg` as JSON and write it as one frame.
pub fn encode<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), LinkError> {
    let json = serde_json::to_vec(msg).map_err(LinkError::Encode)?;
    write_message(writer, &json)?;
    Ok(())
}

/// Read one frame and deserialize it.
pub fn decode<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, LinkError> {
    let bytes = read_message(reader)?;
    serde_json::from_slice(&bytes).map_err(LinkError::Decode)
}
