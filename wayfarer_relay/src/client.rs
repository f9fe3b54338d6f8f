// TCP client for connecting to the shared-map relay.
//
// Provides a non-blocking interface for the game thread. Architecture:
// - `connect()` performs TCP connect + Hello handshake on the calling thread,
//   then spawns a background reader thread.
// - The reader thread decodes framed `ServerMessage`s in a loop and pushes
//   them into an `mpsc` channel.
// - The game thread holds a `BufWriter<TcpStream>` for sending.
// - `poll()` drains the inbox without blocking.
//
// The game thread never blocks on network reads; writes flush synchronously,
// which is acceptable for the small messages we send.
//
// `NetClient` implements `RelayLink`, so a `SyncSession` can own it directly.
// It lives in the relay crate because it is purely std TCP + protocol
// framing + mpsc, and the integration tests need it without a game engine.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};
use wayfarer_protocol::link::{LinkError, RelayLink, decode, encode};
use wayfarer_protocol::message::{ClientMessage, PROTOCOL_VERSION, ServerMessage};
use wayfarer_protocol::types::{Identity, TilePos};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP client for relay communication.
pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    identity: Identity,
    closed: bool,
}

impl NetClient {
    /// Connect to a relay, perform the Hello handshake, and spawn a reader
    /// thread. Returns the client and the identity the relay assigned.
    pub fn connect(
        addr: &str,
        player_name: &str,
        position: TilePos,
    ) -> Result<(Self, Identity), LinkError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        let hello = ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            player_name: player_name.into(),
            position,
        };
        encode(&mut writer, &hello)?;

        let identity = match decode(&mut reader)? {
            ServerMessage::Connected { identity } => identity,
            ServerMessage::Rejected { reason } => return Err(LinkError::Rejected(reason)),
            other => {
                return Err(LinkError::Handshake(format!("unexpected response: {other:?}")));
            }
        };
        info!("relay {addr} assigned identity {identity}");

        // The long-lived reader loop blocks without a timeout.
        reader.get_ref().set_read_timeout(None)?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            reader_loop(reader, tx);
        });

        Ok((
            Self {
                writer,
                inbox: rx,
                _reader_thread: Some(reader_thread),
                identity: identity.clone(),
                closed: false,
            },
            identity,
        ))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Send Goodbye and shut the socket down.
    pub fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = encode(&mut self.writer, &ClientMessage::Goodbye);
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

impl RelayLink for NetClient {
    fn send(&mut self, msg: &ClientMessage) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        encode(&mut self.writer, msg)
    }

    fn poll(&mut self) -> Result<Vec<ServerMessage>, LinkError> {
        let mut messages = Vec::new();
        loop {
            match self.inbox.try_recv() {
                Ok(msg) => messages.push(msg),
                Err(TryRecvError::Empty) => return Ok(messages),
                Err(TryRecvError::Disconnected) => {
                    // Deliver what arrived before the close; report it next time.
                    return if messages.is_empty() {
                        Err(LinkError::Closed)
                    } else {
                        Ok(messages)
                    };
                }
            }
        }
    }

    fn close(&mut self) {
        self.disconnect();
    }
}

impl Drop for NetClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Reader thread: decode framed messages in a loop, push to channel. Exits
/// on EOF, a malformed frame, or when the receiver is dropped.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    loop {
        match decode::<_, ServerMessage>(&mut reader) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("relay reader ending: {e}");
                break;
            }
        }
    }
}
