// TCP server and main event loop for the shared-map relay.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per client): decode framed `ClientMessage`s in a
//   loop and send `InternalEvent::MessageFrom` to the main thread. On
//   error, EOF, or `Goodbye`, send `InternalEvent::Disconnected`.
// - **Main thread**: owns the `Session`, receives events from the channel,
//   and dispatches them. `recv_timeout` wakes it periodically so it can
//   notice a stop request even when no client is talking.
//
// The main thread is the only writer to client TCP streams (via
// `Session::broadcast`/`send_to`). Reader threads only read from streams.
//
// Shutdown: the main thread checks a `keep_running` flag (cleared by
// `RelayHandle::stop`) and breaks out of the event loop.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use wayfarer_protocol::link::{LinkError, decode, encode};
use wayfarer_protocol::message::{ClientMessage, ServerMessage};
use wayfarer_protocol::types::{RelayPlayerId, TilePos};

use crate::session::Session;

/// How long the main loop waits for an event before rechecking `keep_running`.
const IDLE_WAKE: Duration = Duration::from_millis(100);

/// How long a new connection has to send its `Hello`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    MessageFrom {
        player_id: RelayPlayerId,
        message: ClientMessage,
    },
    Disconnected {
        player_id: RelayPlayerId,
    },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a relay server.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// 0 lets the OS pick a free port.
    pub port: u16,
    pub max_players: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 7878,
            max_players: 16,
        }
    }
}

/// Start the relay server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used
/// to let the OS pick a free port).
pub fn start_relay(config: RelayConfig) -> std::io::Result<(RelayHandle, SocketAddr)> {
    let listener = TcpListener::bind(("127.0.0.1", config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    info!("relay listening on {addr} (max {} players)", config.max_players);
    let thread = thread::spawn(move || {
        run_relay(listener, config, keep_running_clone);
    });

    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is set to false.
fn run_relay(listener: TcpListener, config: RelayConfig, keep_running: Arc<AtomicBool>) {
    let mut session = Session::new(config.max_players);

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Non-blocking so the accept thread can check keep_running periodically.
    if let Err(e) = listener.set_nonblocking(true) {
        warn!("listener stays blocking: {e}");
    }

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("connection from {peer}");
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    warn!("accept failed, listener stopping: {e}");
                    break;
                }
            }
        }
    });

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(IDLE_WAKE) {
            Ok(event) => {
                handle_event(&mut session, event, &tx, &keep_running);
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut session, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("relay stopped");
}

/// Dispatch a single event to the session.
fn handle_event(
    session: &mut Session,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            if let Err(e) = handle_new_connection(session, stream, tx, keep_running) {
                warn!("handshake failed: {e}");
            }
        }
        InternalEvent::MessageFrom { player_id, message } => {
            handle_message(session, player_id, message);
        }
        InternalEvent::Disconnected { player_id } => {
            session.remove_player(player_id);
        }
    }
}

/// Handle a new TCP connection: read the Hello handshake, add the player to
/// the session, and spawn a reader thread.
fn handle_new_connection(
    session: &mut Session,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) -> Result<(), LinkError> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let (protocol_version, player_name, position) = match decode(&mut reader)? {
        ClientMessage::Hello {
            protocol_version,
            player_name,
            position,
        } => (protocol_version, player_name, position),
        other => {
            return Err(LinkError::Handshake(format!("expected Hello, got {other:?}")));
        }
    };

    let write_stream = stream.try_clone()?;
    match session.add_player(protocol_version, &player_name, position, write_stream) {
        Ok((player_id, _identity)) => {
            stream.set_read_timeout(None)?;
            let tx_reader = tx.clone();
            let keep_running_reader = keep_running.clone();
            thread::spawn(move || {
                reader_loop(reader, player_id, tx_reader, keep_running_reader);
            });
            Ok(())
        }
        Err(reason) => {
            info!("rejected {player_name:?}: {reason}");
            let mut writer = BufWriter::new(stream);
            encode(&mut writer, &ServerMessage::Rejected { reason })
        }
    }
}

/// Reader loop for a single client. Runs in its own thread.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    player_id: RelayPlayerId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match decode::<_, ClientMessage>(&mut reader) {
            Ok(ClientMessage::Goodbye) => break,
            Ok(message) => {
                if tx.send(InternalEvent::MessageFrom { player_id, message }).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!("reader for {player_id:?} ending: {e}");
                break;
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { player_id });
}

/// Handle a client message other than Hello and Goodbye (those belong to
/// connection setup and the reader loop respectively).
fn handle_message(session: &mut Session, player_id: RelayPlayerId, message: ClientMessage) {
    match message {
        ClientMessage::MovePlayer { identity, x, y } => {
            session.move_player(player_id, &identity, TilePos::new(x, y));
        }
        ClientMessage::SetPartyMembers { party_member_ids } => {
            session.set_party(player_id, party_member_ids);
        }
        ClientMessage::RequestCurrentPlayers => {
            session.send_current_players(player_id);
        }
        ClientMessage::Hello { .. } => {
            warn!("{player_id:?} sent a second Hello; ignored");
        }
        ClientMessage::Goodbye => {}
    }
}
