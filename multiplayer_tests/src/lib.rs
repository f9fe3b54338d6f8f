// Test-only game client for multiplayer integration tests.
//
// Wraps the real `NetClient` (from `wayfarer_relay::client`), a real
// `SyncSession`, and a `HeadlessHost` standing in for the game engine, to
// provide a synchronous, test-friendly API for exercising the full pipeline:
// local step -> relay -> remote client -> registry -> forced route -> host.
//
// The only test-specific code here is the blocking polling wrappers (loops
// around `SyncSession::pump` and `HeadlessHost::advance`). All networking
// and sync logic uses the same code paths as a real client.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use wayfarer_relay::client::NetClient;
use wayfarer_sync::{
    ActorCatalog, ActorId, ClientConfig, EntityGateway, HeadlessHost, Identity, LocalEvent,
    RemotePlayer, SyncConfig, SyncSession, TilePos,
};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Route logs through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Actor database shared by every test client: ids 1..=4 with distinct
/// sprites, id 5 present but without a sprite, and a hole at 0.
pub fn test_catalog() -> ActorCatalog {
    let actors = json!([
        null,
        {"id": 1, "name": "Reid", "characterName": "Actor1", "characterIndex": 0},
        {"id": 2, "name": "Priscilla", "characterName": "Actor1", "characterIndex": 7},
        {"id": 3, "name": "Gale", "characterName": "Actor2", "characterIndex": 1},
        {"id": 4, "name": "Michelle", "characterName": "Actor3", "characterIndex": 4},
        {"id": 5, "name": "Nameless", "characterName": "", "characterIndex": 0},
    ]);
    ActorCatalog::from_json(&actors.to_string()).expect("test catalog parses")
}

/// A test client: one player on the shared map.
pub struct TestSyncClient {
    pub session: SyncSession,
    pub host: HeadlessHost,
    pub identity: Identity,
    position: TilePos,
}

impl TestSyncClient {
    /// Connect to a relay at `addr`, standing at `start` with `party`
    /// (leader first).
    pub fn connect(addr: SocketAddr, name: &str, start: TilePos, party: &[u32]) -> Self {
        Self::connect_with(addr, name, start, party, SyncConfig::default())
    }

    pub fn connect_with(
        addr: SocketAddr,
        name: &str,
        start: TilePos,
        party: &[u32],
        sync: SyncConfig,
    ) -> Self {
        let config = ClientConfig {
            relay_addr: addr.to_string(),
            player_name: name.into(),
        };
        let (client, identity) = NetClient::connect(&config.relay_addr, &config.player_name, start)
            .expect("TestSyncClient::connect failed");

        let mut session = SyncSession::new(sync, test_catalog());
        session.handle_local_event(LocalEvent::PartyChanged(
            party.iter().copied().map(ActorId).collect(),
        ));
        session.attach_link(Box::new(client));
        session.on_connected(identity.clone());

        Self {
            session,
            host: HeadlessHost::new(),
            identity,
            position: start,
        }
    }

    /// One frame: drain the relay, advance the host, reconcile.
    pub fn frame(&mut self) {
        self.session.pump(&mut self.host);
        self.host.advance();
        self.session.tick(&mut self.host);
    }

    /// Walk the local avatar by `(dx, dy)`, announcing every tile on the way.
    pub fn walk(&mut self, dx: i32, dy: i32) {
        let (sx, sy) = (dx.signum(), dy.signum());
        for _ in 0..dy.abs() {
            self.position = TilePos::new(self.position.x, self.position.y + sy);
            self.session
                .handle_local_event(LocalEvent::StepCompleted(self.position));
        }
        for _ in 0..dx.abs() {
            self.position = TilePos::new(self.position.x + sx, self.position.y);
            self.session
                .handle_local_event(LocalEvent::StepCompleted(self.position));
        }
    }

    pub fn set_party(&mut self, party: &[u32]) {
        self.session.handle_local_event(LocalEvent::PartyChanged(
            party.iter().copied().map(ActorId).collect(),
        ));
    }

    pub fn remote(&self, identity: &Identity) -> Option<&RemotePlayer> {
        self.session.remote_player(identity)
    }

    /// Where the host currently draws `identity`'s avatar.
    pub fn live_position(&self, identity: &Identity) -> Option<TilePos> {
        let player = self.remote(identity)?;
        self.host.position(player.avatar.handle)
    }

    /// Where the host currently draws each of `identity`'s followers.
    pub fn follower_positions(&self, identity: &Identity) -> Vec<TilePos> {
        self.remote(identity)
            .map(|p| {
                p.followers()
                    .iter()
                    .filter_map(|f| self.host.position(f.body.handle))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Run frames until `done` holds. Panics after `POLL_TIMEOUT`.
    pub fn poll_until(&mut self, what: &str, done: impl Fn(&Self) -> bool) {
        let start = Instant::now();
        loop {
            self.frame();
            if done(self) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Run frames for roughly `duration`, for asserting that nothing happens.
    pub fn idle_for(&mut self, duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            self.frame();
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Send Goodbye and tear down every remote entity.
    pub fn disconnect(&mut self) {
        self.session.disconnect(&mut self.host);
    }
}
