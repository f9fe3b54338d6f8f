// wayfarer_protocol — wire protocol for the shared-map relay.
//
// This crate defines the message types, framing, and transport seam used by
// the relay (`wayfarer_relay`) and by the client-side sync engine
// (`wayfarer_sync`). It has no dependency on either.
//
// Module overview:
// - `types.rs`:    `Identity`, `ActorId`, `TilePos`, `RelayPlayerId`.
// - `message.rs`:  `ClientMessage` / `ServerMessage` enums and `PlayerSnapshot`.
// - `framing.rs`:  4-byte big-endian length prefix, then payload.
// - `link.rs`:     `RelayLink` trait, `LinkError`, framed JSON helpers.
//
// Design decisions:
// - **JSON serialization.** Event names and field casing match the existing
//   browser clients, so a JSON dump of a frame reads like their socket logs.
// - **No async runtime.** `std::io::Read`/`Write` only, usable from blocking
//   TCP streams and from in-memory buffers in tests.

pub mod framing;
pub mod link;
pub mod message;
pub mod types;

pub use framing::{MAX_MESSAGE_SIZE, read_message, write_message};
pub use link::{LinkError, RelayLink, decode, encode};
pub use message::{ClientMessage, PROTOCOL_VERSION, PlayerSnapshot, ServerMessage};
pub use types::{ActorId, Identity, RelayPlayerId, TilePos};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    fn server_json(msg: &ServerMessage) -> serde_json::Value {
        serde_json::to_value(msg).unwrap()
    }

    #[test]
    fn event_names_and_field_casing() {
        let moved = ServerMessage::PlayerMoved {
            identity: Identity::new("alice#0"),
            x: 3,
            y: -2,
        };
        assert_eq!(
            server_json(&moved),
            json!({ "player_moved": { "identity": "alice#0", "x": 3, "y": -2 } })
        );

        let party = ClientMessage::SetPartyMembers {
            party_member_ids: vec![ActorId(1), ActorId(4)],
        };
        assert_eq!(
            serde_json::to_value(&party).unwrap(),
            json!({ "set_party_members": { "partyMemberIds": [1, 4] } })
        );

        assert_eq!(
            serde_json::to_value(&ClientMessage::RequestCurrentPlayers).unwrap(),
            json!("request_current_players")
        );
    }

    #[test]
    fn snapshot_party_members_are_optional() {
        let raw = r#"{ "player_connected": { "identity": "bob#1", "x": 5, "y": 6 } }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ServerMessage::PlayerConnected(PlayerSnapshot {
                identity: Identity::new("bob#1"),
                x: 5,
                y: 6,
                party_members: None,
            })
        );

        let with_party = ServerMessage::CurrentPlayers {
            players: vec![PlayerSnapshot {
                identity: Identity::new("bob#1"),
                x: 5,
                y: 6,
                party_members: Some(vec![ActorId(1), ActorId(2)]),
            }],
        };
        assert_eq!(
            server_json(&with_party),
            json!({ "current_players": { "players": [
                { "identity": "bob#1", "x": 5, "y": 6, "partyMembers": [1, 2] }
            ] } })
        );
    }

    #[test]
    fn framed_json_roundtrip() {
        let sent = vec![
            ClientMessage::Hello {
                protocol_version: PROTOCOL_VERSION,
                player_name: "Wanderer".into(),
                position: TilePos::new(8, 3),
            },
            ClientMessage::MovePlayer {
                identity: Identity::new("w#2"),
                x: 9,
                y: 3,
            },
            ClientMessage::Goodbye,
        ];
        let mut wire = Vec::new();
        for msg in &sent {
            encode(&mut wire, msg).unwrap();
        }

        let mut cursor = Cursor::new(wire);
        for expected in &sent {
            let got: ClientMessage = decode(&mut cursor).unwrap();
            assert_eq!(&got, expected);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut wire = Vec::new();
        write_message(&mut wire, b"{ not json").unwrap();
        let err = decode::<_, ServerMessage>(&mut Cursor::new(wire)).unwrap_err();
        assert!(matches!(err, LinkError::Decode(_)));
    }
}
