// wayfarer_sync — client-side synchronization engine for shared-map avatars.
//
// Mirrors other players' avatars and party followers onto the local map. The
// relay tells us where everyone is and who is in their party; this crate
// turns that into host entities, walks them to their announced tiles, and
// publishes the local player's own steps and party changes in return.
//
// Module overview:
// - `types.rs`:     Handles, sprites, directions, and forced move routes.
// - `error.rs`:     `SyncError`, the one error type of the crate.
// - `config.rs`:    `SyncConfig` (tuning) and `ClientConfig` (where to connect).
// - `actors.rs`:    `ActorCatalog`, static actor id -> sprite lookup.
// - `gateway.rs`:   `EntityGateway`, the seam to the game host.
// - `headless.rs`:  `HeadlessHost`, an in-memory `EntityGateway`.
// - `registry.rs`:  `RemoteRegistry`, identity -> avatar and followers.
// - `movement.rs`:  `Reconciler`, route planning and snap-on-miss.
// - `roster.rs`:    Party composition sync for followers.
// - `session.rs`:   `SyncSession`, connection state and message dispatch.
//
// Dependencies: `wayfarer_protocol` for messages and the `RelayLink` seam.
// No dependency on the relay crate or on any game engine.
//
// Threading: none. Everything is driven from the host's game thread through
// `SyncSession::pump`, `SyncSession::handle_local_event`, and
// `SyncSession::tick`.

pub mod actors;
pub mod config;
pub mod error;
pub mod gateway;
pub mod headless;
pub mod movement;
pub mod registry;
pub mod roster;
pub mod session;
pub mod types;

pub use actors::{ActorCatalog, ActorData};
pub use config::{ClientConfig, SupersedePolicy, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use gateway::{AnimationFlags, EntityGateway, EntityOptions};
pub use headless::HeadlessHost;
pub use movement::{Reconciler, TickReport, plan_steps};
pub use registry::{RemoteBody, RemoteFollower, RemotePlayer, RemoteRegistry};
pub use roster::{RosterOutcome, apply_roster};
pub use session::{ConnectionState, LocalEvent, SyncSession};
pub use types::{
    ActorId, Direction, EntityHandle, Identity, MoveRoute, MoveStep, RouteCommand, SpriteRef,
    TilePos,
};
