// Protocol messages for client-relay communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by game clients to the relay.
// - `ServerMessage`: sent by the relay to game clients.
//
// Tags are snake_case event names (`player_moved`, `set_party_members`, ...)
// and fields are camelCase, matching the event names the browser-side
// clients already speak. Coordinates are integer tile units.
//
// The relay is a broadcast hub: it echoes `player_moved` and
// `player_party_updated` back to the sender too, so clients must suppress
// their own echoes (see `wayfarer_sync::session`).

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, Identity, TilePos};

/// Protocol version sent in `Hello`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent by a client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join the shared map (handshake). `position` is where the avatar stands
    /// right now, so peers can spawn it before the first step.
    Hello {
        protocol_version: u32,
        player_name: String,
        position: TilePos,
    },
    /// The local avatar completed a step and now stands at `(x, y)`.
    MovePlayer { identity: Identity, x: i32, y: i32 },
    /// Full local roster, leader first. Never a diff.
    SetPartyMembers { party_member_ids: Vec<ActorId> },
    /// Ask for a `CurrentPlayers` snapshot.
    RequestCurrentPlayers,
    /// Player is leaving gracefully.
    Goodbye,
}

/// Messages sent by the relay to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Handshake accepted; `identity` is ours for the rest of the connection.
    Connected { identity: Identity },
    /// Handshake rejected.
    Rejected { reason: String },
    /// Everyone currently connected, the requester included.
    CurrentPlayers { players: Vec<PlayerSnapshot> },
    /// Another client joined.
    PlayerConnected(PlayerSnapshot),
    /// A client left (goodbye, EOF or error).
    PlayerDisconnected { identity: Identity },
    /// A client's avatar now stands at `(x, y)`.
    PlayerMoved { identity: Identity, x: i32, y: i32 },
    /// A client's roster changed. Leader first.
    PlayerPartyUpdated {
        identity: Identity,
        party_members: Vec<ActorId>,
    },
}

/// Public state of one connected client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub identity: Identity,
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_members: Option<Vec<ActorId>>,
}

impl PlayerSnapshot {
    pub fn position(&self) -> TilePos {
        TilePos::new(self.x, self.y)
    }
}
