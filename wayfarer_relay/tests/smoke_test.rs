// Integration smoke test for the relay server.
//
// Starts a relay on localhost and drives it with plain TCP sockets using the
// protocol crate's framing and message types, plus one `NetClient`, through
// the full lifecycle: handshake, join announcements, move and party echoes,
// snapshot requests, rejection, and disconnect.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use wayfarer_protocol::link::{RelayLink, decode, encode};
use wayfarer_protocol::message::{ClientMessage, PROTOCOL_VERSION, ServerMessage};
use wayfarer_protocol::types::{ActorId, Identity, TilePos};
use wayfarer_relay::client::NetClient;
use wayfarer_relay::server::{RelayConfig, start_relay};

fn send(writer: &mut BufWriter<TcpStream>, msg: &ClientMessage) {
    encode(writer, msg).unwrap();
}

fn recv(reader: &mut BufReader<TcpStream>) -> ServerMessage {
    decode(reader).unwrap()
}

/// Open a socket and send Hello. Returns the reader/writer pair; the
/// response has not been read yet.
fn hello(
    addr: SocketAddr,
    name: &str,
    version: u32,
) -> (BufReader<TcpStream>, BufWriter<TcpStream>) {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = BufWriter::new(stream);
    send(
        &mut writer,
        &ClientMessage::Hello {
            protocol_version: version,
            player_name: name.into(),
            position: TilePos::new(1, 1),
        },
    );
    (reader, writer)
}

/// Connect, handshake, and return the assigned identity.
fn connect(addr: SocketAddr, name: &str) -> (BufReader<TcpStream>, BufWriter<TcpStream>, Identity) {
    let (mut reader, writer) = hello(addr, name, PROTOCOL_VERSION);
    let identity = match recv(&mut reader) {
        ServerMessage::Connected { identity } => identity,
        other => panic!("expected Connected, got {other:?}"),
    };
    (reader, writer, identity)
}

fn start(max_players: u32) -> (wayfarer_relay::RelayHandle, SocketAddr) {
    let (handle, addr) = start_relay(RelayConfig {
        port: 0,
        max_players,
    })
    .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    (handle, addr)
}

#[test]
fn full_session_lifecycle() {
    let (handle, addr) = start(4);

    // 1. Two clients join; the first hears about the second.
    let (mut reader_a, mut writer_a, alice) = connect(addr, "Alice");
    let (mut reader_b, mut writer_b, bob) = connect(addr, "Bob");
    assert_ne!(alice, bob);

    match recv(&mut reader_a) {
        ServerMessage::PlayerConnected(player) => {
            assert_eq!(player.identity, bob);
            assert_eq!(player.position(), TilePos::new(1, 1));
        }
        other => panic!("expected PlayerConnected, got {other:?}"),
    }

    // 2. A move is echoed to both, the sender included.
    send(
        &mut writer_a,
        &ClientMessage::MovePlayer {
            identity: alice.clone(),
            x: 2,
            y: 1,
        },
    );
    let moved = ServerMessage::PlayerMoved {
        identity: alice.clone(),
        x: 2,
        y: 1,
    };
    assert_eq!(recv(&mut reader_a), moved);
    assert_eq!(recv(&mut reader_b), moved);

    // 3. Party changes travel the same way.
    send(
        &mut writer_b,
        &ClientMessage::SetPartyMembers {
            party_member_ids: vec![ActorId(3), ActorId(1)],
        },
    );
    let party = ServerMessage::PlayerPartyUpdated {
        identity: bob.clone(),
        party_members: vec![ActorId(3), ActorId(1)],
    };
    assert_eq!(recv(&mut reader_a), party);
    assert_eq!(recv(&mut reader_b), party);

    // 4. A snapshot request is answered only to the requester.
    send(&mut writer_b, &ClientMessage::RequestCurrentPlayers);
    match recv(&mut reader_b) {
        ServerMessage::CurrentPlayers { players } => {
            assert_eq!(players.len(), 2);
            let a = players.iter().find(|p| p.identity == alice).unwrap();
            assert_eq!(a.position(), TilePos::new(2, 1));
            let b = players.iter().find(|p| p.identity == bob).unwrap();
            assert_eq!(b.party_members, Some(vec![ActorId(3), ActorId(1)]));
        }
        other => panic!("expected CurrentPlayers, got {other:?}"),
    }

    // 5. Goodbye is announced to the rest.
    send(&mut writer_b, &ClientMessage::Goodbye);
    match recv(&mut reader_a) {
        ServerMessage::PlayerDisconnected { identity } => assert_eq!(identity, bob),
        other => panic!("expected PlayerDisconnected, got {other:?}"),
    }

    handle.stop();
}

#[test]
fn dropped_socket_counts_as_disconnect() {
    let (handle, addr) = start(4);
    let (mut reader_a, _writer_a, _alice) = connect(addr, "Alice");
    let (reader_b, writer_b, bob) = connect(addr, "Bob");
    let _joined = recv(&mut reader_a);

    // No Goodbye: the socket just goes away.
    drop(reader_b);
    drop(writer_b);
    match recv(&mut reader_a) {
        ServerMessage::PlayerDisconnected { identity } => assert_eq!(identity, bob),
        other => panic!("expected PlayerDisconnected, got {other:?}"),
    }
    handle.stop();
}

#[test]
fn version_mismatch_is_rejected() {
    let (handle, addr) = start(4);
    let (mut reader, _writer) = hello(addr, "Old", PROTOCOL_VERSION + 1);
    match recv(&mut reader) {
        ServerMessage::Rejected { reason } => assert!(reason.contains("protocol version")),
        other => panic!("expected Rejected, got {other:?}"),
    }
    handle.stop();
}

#[test]
fn full_relay_rejects_net_client() {
    let (handle, addr) = start(1);
    let (_reader, _writer, _first) = connect(addr, "First");
    let result = NetClient::connect(&addr.to_string(), "Second", TilePos::new(0, 0));
    match result {
        Err(wayfarer_protocol::LinkError::Rejected(reason)) => assert_eq!(reason, "session is full"),
        Err(other) => panic!("expected rejection, got {other}"),
        Ok(_) => panic!("expected rejection, got a connection"),
    }
    handle.stop();
}

#[test]
fn net_client_round_trip() {
    let (handle, addr) = start(4);
    let (mut client, identity) =
        NetClient::connect(&addr.to_string(), "Carol", TilePos::new(4, 4)).unwrap();
    assert_eq!(client.identity(), &identity);

    client.send(&ClientMessage::RequestCurrentPlayers).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let players = loop {
        let found = client.poll().unwrap().into_iter().find_map(|msg| match msg {
            ServerMessage::CurrentPlayers { players } => Some(players),
            _ => None,
        });
        if let Some(players) = found {
            break players;
        }
        assert!(Instant::now() < deadline, "timed out waiting for CurrentPlayers");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].identity, identity);
    assert_eq!(players[0].position(), TilePos::new(4, 4));

    client.close();
    assert!(client.send(&ClientMessage::RequestCurrentPlayers).is_err());
    handle.stop();
}
