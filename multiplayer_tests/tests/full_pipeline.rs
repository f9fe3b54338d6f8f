// End-to-end integration tests for the multiplayer pipeline.
//
// Each test starts a real relay server, connects real NetClient instances
// (via TestSyncClient), and verifies the full path:
// local step -> relay -> remote SyncSession -> forced route -> host entity.
//
// These tests exercise the same code paths as a live client (NetClient from
// the relay crate, SyncSession from the sync crate); the only test-specific
// code is the synchronous polling wrappers in TestSyncClient and the
// headless host.

use std::thread;
use std::time::Duration;

use multiplayer_tests::{TestSyncClient, init_logging};
use wayfarer_relay::server::{RelayConfig, RelayHandle, start_relay};
use wayfarer_sync::{ConnectionState, SpriteRef, SupersedePolicy, SyncConfig, TilePos};

/// Start a relay on a random port, connect Alice and then Bob, and wait
/// until each sees the other with its full party.
fn start_test_session(
    alice_party: &[u32],
    bob_party: &[u32],
) -> (RelayHandle, TestSyncClient, TestSyncClient) {
    init_logging();
    let (handle, addr) = start_relay(RelayConfig {
        port: 0,
        max_players: 4,
    })
    .unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut alice = TestSyncClient::connect(addr, "Alice", TilePos::new(2, 2), alice_party);
    let mut bob = TestSyncClient::connect(addr, "Bob", TilePos::new(10, 10), bob_party);

    let bob_id = bob.identity.clone();
    let bob_roster = bob_party.len();
    alice.poll_until("Alice to see Bob's party", |c| {
        c.remote(&bob_id).is_some_and(|p| p.roster().len() == bob_roster)
    });
    let alice_id = alice.identity.clone();
    let alice_roster = alice_party.len();
    bob.poll_until("Bob to see Alice's party", |c| {
        c.remote(&alice_id).is_some_and(|p| p.roster().len() == alice_roster)
    });

    (handle, alice, bob)
}

/// Both clients sit still until reconciliation has settled.
fn settle(a: &mut TestSyncClient, b: &mut TestSyncClient) {
    a.idle_for(Duration::from_millis(100));
    b.idle_for(Duration::from_millis(100));
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

#[test]
fn players_see_each_other_with_parties() {
    let (handle, alice, bob) = start_test_session(&[1, 2, 3], &[4]);

    // Bob learned about Alice from the snapshot, party included.
    let seen = bob.remote(&alice.identity).unwrap();
    assert_eq!(bob.live_position(&alice.identity), Some(TilePos::new(2, 2)));
    assert_eq!(
        bob.host.entity(seen.avatar.handle).unwrap().sprite,
        SpriteRef::new("Actor1", 0)
    );
    assert_eq!(
        bob.follower_positions(&alice.identity),
        vec![TilePos::new(2, 3), TilePos::new(2, 4)]
    );

    // Bob's party is just a leader: no followers.
    assert!(alice.remote(&bob.identity).unwrap().followers().is_empty());

    // Nobody mirrors themselves.
    assert!(alice.remote(&alice.identity).is_none());
    assert_eq!(alice.session.registry().len(), 1);
    assert_eq!(bob.session.registry().len(), 1);

    handle.stop();
}

#[test]
fn remote_steps_are_walked_on_the_other_client() {
    let (handle, mut alice, mut bob) = start_test_session(&[1], &[4]);

    alice.walk(3, -2);
    let target = TilePos::new(5, 0);
    let alice_id = alice.identity.clone();
    bob.poll_until("Alice's avatar to reach (5, 0)", |c| {
        c.live_position(&alice_id) == Some(target)
    });
    settle(&mut alice, &mut bob);

    let seen = bob.remote(&alice.identity).unwrap();
    assert_eq!(seen.avatar.pending_target, None);
    assert_eq!(bob.host.entity(seen.avatar.handle).unwrap().teleports, 0);
    // Alice's own host never grew an entity for Alice.
    assert_eq!(alice.host.entity_count(), 1);

    handle.stop();
}

#[test]
fn blocked_remote_route_snaps_to_announced_tile() {
    let (handle, mut alice, mut bob) = start_test_session(&[1], &[4]);

    // Bob's map has a wall where Alice's map does not.
    bob.host.block(TilePos::new(2, 1));
    alice.walk(0, -2);

    let alice_id = alice.identity.clone();
    bob.poll_until("Alice's avatar to snap to (2, 0)", |c| {
        c.live_position(&alice_id) == Some(TilePos::new(2, 0))
    });
    let seen = bob.remote(&alice.identity).unwrap();
    assert!(bob.host.entity(seen.avatar.handle).unwrap().teleports >= 1);

    handle.stop();
}

#[test]
fn followers_trail_the_leader_across_clients() {
    let (handle, mut alice, mut bob) = start_test_session(&[1, 2, 3], &[4]);

    // Alice starts at (2, 2) with followers at (2, 3) and (2, 4); she walks
    // right two tiles.
    alice.walk(2, 0);
    let alice_id = alice.identity.clone();
    bob.poll_until("Alice's followers to catch up", |c| {
        c.follower_positions(&alice_id) == vec![TilePos::new(3, 2), TilePos::new(2, 2)]
    });
    assert_eq!(bob.live_position(&alice.identity), Some(TilePos::new(4, 2)));
    settle(&mut alice, &mut bob);

    handle.stop();
}

#[test]
fn party_changes_respawn_followers() {
    let (handle, mut alice, mut bob) = start_test_session(&[1, 2, 3], &[4]);

    alice.set_party(&[1, 4]);
    let alice_id = alice.identity.clone();
    bob.poll_until("Alice's smaller party", |c| {
        c.remote(&alice_id).is_some_and(|p| p.roster().len() == 2)
    });

    let seen = bob.remote(&alice.identity).unwrap();
    assert_eq!(seen.followers().len(), 1);
    assert_eq!(seen.followers()[0].sprite, SpriteRef::new("Actor3", 4));
    // Bob's host only holds Alice: her avatar and one follower.
    assert_eq!(bob.host.entity_count(), 2);

    handle.stop();
}

#[test]
fn actor_without_sprite_leaves_its_slot_empty() {
    let (handle, _alice, bob) = start_test_session(&[1, 5, 2], &[4]);

    // Actor 5 has no sprite: slot 1 is skipped, slot 2 still spawns at its
    // own offset.
    let alice = bob.session.registry().players().next().unwrap();
    assert_eq!(alice.followers().len(), 1);
    assert_eq!(alice.followers()[0].slot_index, 2);
    assert_eq!(alice.followers()[0].body.position, TilePos::new(2, 4));

    handle.stop();
}

#[test]
fn disconnect_removes_remote_entities() {
    let (handle, mut alice, mut bob) = start_test_session(&[1, 2], &[4, 1]);
    assert_eq!(alice.host.entity_count(), 2);

    bob.disconnect();
    assert_eq!(bob.session.state(), ConnectionState::Disconnected);
    assert_eq!(bob.host.entity_count(), 0);

    let bob_id = bob.identity.clone();
    alice.poll_until("Bob to vanish", |c| c.remote(&bob_id).is_none());
    assert_eq!(alice.host.entity_count(), 0);

    handle.stop();
}

#[test]
fn leaving_after_relay_stop_still_clears_the_map() {
    let (handle, mut alice, _bob) = start_test_session(&[1], &[4]);
    handle.stop();

    alice.disconnect();
    assert_eq!(alice.session.state(), ConnectionState::Disconnected);
    assert_eq!(alice.host.entity_count(), 0);
    assert!(!alice.session.publish_local_movement(TilePos::new(0, 0)));
}

#[test]
fn scene_reload_rebuilds_remote_players() {
    let (handle, mut alice, mut bob) = start_test_session(&[1, 2], &[4]);

    bob.host.reload_scene();
    bob.session.on_scene_reloaded();
    assert!(bob.session.registry().is_empty());

    let alice_id = alice.identity.clone();
    bob.poll_until("Alice to reappear", |c| {
        c.remote(&alice_id).is_some_and(|p| p.followers().len() == 1)
    });
    assert_eq!(bob.host.entity_count(), 2);
    alice.idle_for(Duration::from_millis(20));

    handle.stop();
}

#[test]
fn wait_for_arrival_policy_reaches_the_last_target() {
    init_logging();
    let (handle, addr) = start_relay(RelayConfig {
        port: 0,
        max_players: 4,
    })
    .unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut alice = TestSyncClient::connect(addr, "Alice", TilePos::new(0, 0), &[1]);
    let patient = SyncConfig {
        supersede_policy: SupersedePolicy::WaitForArrival,
        ..SyncConfig::default()
    };
    let mut bob = TestSyncClient::connect_with(addr, "Bob", TilePos::new(9, 9), &[4], patient);
    let alice_id = alice.identity.clone();
    bob.poll_until("Bob to see Alice", |c| c.remote(&alice_id).is_some());

    alice.walk(4, 3);
    bob.poll_until("Alice's avatar to reach (4, 3)", |c| {
        c.live_position(&alice_id) == Some(TilePos::new(4, 3))
            && c.remote(&alice_id).is_some_and(|p| p.avatar.pending_target.is_none())
    });
    alice.idle_for(Duration::from_millis(20));

    handle.stop();
}
