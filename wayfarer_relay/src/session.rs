// Shared-map state for the relay.
//
// `Session` is the central data structure that `server.rs` drives. It tracks
// every connected player's identity, last announced tile, and party roster,
// and fans updates out to the other clients. All mutation happens through
// methods called from the server's single-threaded main loop, so there is no
// internal locking.
//
// Routing rules:
// - A new player gets `Connected` with its identity; everyone else gets
//   `PlayerConnected`.
// - Moves and party changes go to every client, the sender included.
//   Clients recognize their own identity and drop the echo.
// - `CurrentPlayers` answers only the requester and lists every player,
//   the requester included.
// - A departure is announced to the remaining players.
//
// The relay is authoritative over identities: a `MovePlayer` naming some
// other identity is attributed to its real sender.
//
// Writing to client streams: `Session` holds cloned `TcpStream` write halves
// wrapped in `BufWriter`. Write errors on a single client are logged but do
// not crash the relay; the reader thread for that client will detect the
// broken pipe and send a `Disconnected` event.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::net::TcpStream;

use log::{info, warn};
use wayfarer_protocol::link::{LinkError, encode};
use wayfarer_protocol::message::{PROTOCOL_VERSION, PlayerSnapshot, ServerMessage};
use wayfarer_protocol::types::{ActorId, Identity, RelayPlayerId, TilePos};

/// Relay state for one shared map.
pub struct Session {
    players: BTreeMap<RelayPlayerId, PlayerState>,
    next_player_id: u32,
    max_players: u32,
}

struct PlayerState {
    identity: Identity,
    position: TilePos,
    party: Option<Vec<ActorId>>,
    writer: BufWriter<TcpStream>,
}

impl PlayerState {
    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            identity: self.identity.clone(),
            x: self.position.x,
            y: self.position.y,
            party_members: self.party.clone(),
        }
    }
}

impl Session {
    pub fn new(max_players: u32) -> Self {
        Self {
            players: BTreeMap::new(),
            next_player_id: 0,
            max_players,
        }
    }

    /// Attempt to add a player. Returns the connection id and the identity
    /// the relay assigned, or a rejection reason.
    ///
    /// The returned `RelayPlayerId` tags the reader thread for this
    /// connection so that its `InternalEvent::MessageFrom` events carry the
    /// right sender.
    pub fn add_player(
        &mut self,
        protocol_version: u32,
        player_name: &str,
        position: TilePos,
        stream: TcpStream,
    ) -> Result<(RelayPlayerId, Identity), String> {
        if protocol_version != PROTOCOL_VERSION {
            return Err(format!(
                "protocol version mismatch: relay speaks {PROTOCOL_VERSION}, client {protocol_version}"
            ));
        }
        let name = player_name.trim();
        if name.is_empty() {
            return Err("player name is empty".into());
        }
        if self.players.len() >= usize::try_from(self.max_players).unwrap_or(usize::MAX) {
            return Err("session is full".into());
        }

        let id = RelayPlayerId(self.next_player_id);
        self.next_player_id += 1;
        let identity = Identity::new(format!("{name}#{}", id.0));

        let state = PlayerState {
            identity: identity.clone(),
            position,
            party: None,
            writer: BufWriter::new(stream),
        };
        let joined = ServerMessage::PlayerConnected(state.snapshot());
        self.broadcast(&joined);
        self.players.insert(id, state);

        self.send_to(
            id,
            &ServerMessage::Connected {
                identity: identity.clone(),
            },
        );
        info!("{identity} joined at {position}");
        Ok((id, identity))
    }

    /// Remove a player and announce the departure.
    pub fn remove_player(&mut self, player_id: RelayPlayerId) {
        if let Some(ps) = self.players.remove(&player_id) {
            info!("{} left", ps.identity);
            self.broadcast(&ServerMessage::PlayerDisconnected {
                identity: ps.identity,
            });
        }
    }

    /// Record a new position for `player_id` and relay it to everyone.
    pub fn move_player(&mut self, player_id: RelayPlayerId, claimed: &Identity, pos: TilePos) {
        let Some(ps) = self.players.get_mut(&player_id) else {
            return;
        };
        if *claimed != ps.identity {
            warn!("{} claimed to move {claimed}; attributing to sender", ps.identity);
        }
        ps.position = pos;
        let msg = ServerMessage::PlayerMoved {
            identity: ps.identity.clone(),
            x: pos.x,
            y: pos.y,
        };
        self.broadcast(&msg);
    }

    /// Replace `player_id`'s roster and relay it to everyone.
    pub fn set_party(&mut self, player_id: RelayPlayerId, party: Vec<ActorId>) {
        let Some(ps) = self.players.get_mut(&player_id) else {
            return;
        };
        ps.party = Some(party.clone());
        let msg = ServerMessage::PlayerPartyUpdated {
            identity: ps.identity.clone(),
            party_members: party,
        };
        self.broadcast(&msg);
    }

    /// Answer a snapshot request from `player_id`.
    pub fn send_current_players(&mut self, player_id: RelayPlayerId) {
        let msg = ServerMessage::CurrentPlayers {
            players: self.snapshots(),
        };
        self.send_to(player_id, &msg);
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn identity_of(&self, player_id: RelayPlayerId) -> Option<&Identity> {
        self.players.get(&player_id).map(|ps| &ps.identity)
    }

    /// Snapshot of every connected player, in connection order.
    pub fn snapshots(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(PlayerState::snapshot).collect()
    }

    fn send_to(&mut self, player_id: RelayPlayerId, msg: &ServerMessage) {
        let Some(ps) = self.players.get_mut(&player_id) else {
            return;
        };
        if let Err(e) = send_message(&mut ps.writer, msg) {
            warn!("write to {} failed: {e}", ps.identity);
        }
    }

    fn broadcast(&mut self, msg: &ServerMessage) {
        let ids: Vec<RelayPlayerId> = self.players.keys().copied().collect();
        for id in ids {
            self.send_to(id, msg);
        }
    }
}

/// Encode one message to a client. Framing flushes the writer.
fn send_message(writer: &mut BufWriter<TcpStream>, msg: &ServerMessage) -> Result<(), LinkError> {
    encode(writer, msg)
}
