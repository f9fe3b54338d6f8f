// wayfarer_relay — shared-map relay server and its TCP client.
//
// The relay is a thin message broker: it accepts TCP connections from game
// clients, assigns each one an identity, remembers each player's last tile
// and party roster, and forwards moves and roster changes to everyone on
// the map. It never runs game logic and never validates movement.
//
// Module overview:
// - `session.rs`:  Player table and routing rules. The core data structure
//                  that `server.rs` drives.
// - `server.rs`:   TCP listener, reader threads (one per client), and the
//                  main event loop. Uses `std::net` with a thread-per-reader
//                  architecture and an `mpsc` channel to funnel events into
//                  the single-threaded `Session`.
// - `client.rs`:   `NetClient`, the TCP `RelayLink` used by game clients.
//
// Dependencies: `wayfarer_protocol` (shared message types and framing).
// No dependency on the sync engine.
//
// The relay can run as a standalone binary (`main.rs`) or be embedded in a
// process via the library API (`start_relay`).

pub mod client;
pub mod server;
pub mod session;

pub use client::NetClient;
pub use server::{RelayConfig, RelayHandle, start_relay};
