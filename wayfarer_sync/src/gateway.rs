// Entity Gateway: the capability interface the host environment supplies.
//
// The sync engine never touches rendering, map data, or tile collision. It
// asks the host to create and destroy positioned entities, to play a forced
// route, whether that route is still playing, where an entity stands, and to
// teleport or restyle it. Everything behind this trait belongs to the host.
//
// Implementations: the game's own bridge in production, `HeadlessHost`
// (see `headless.rs`) in tests and bots.

use crate::error::SyncResult;
use crate::types::{Direction, EntityHandle, MoveRoute, SpriteRef, TilePos};

/// Creation flags for a host entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityOptions {
    /// Pass-through: neither blocks nor is blocked by anything.
    pub through: bool,
}

/// Animation flags applied to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationFlags {
    pub walk_anime: bool,
    pub step_anime: bool,
}

pub trait EntityGateway {
    /// Create an entity at `pos`. Fails with `HostCapabilityUnavailable` when
    /// the host cannot host entities right now (e.g. no active map scene); in
    /// that case nothing is left behind.
    fn create_entity(
        &mut self,
        pos: TilePos,
        sprite: &SpriteRef,
        options: EntityOptions,
    ) -> SyncResult<EntityHandle>;

    /// Destroy an entity. Unknown handles are ignored.
    fn destroy_entity(&mut self, handle: EntityHandle);

    /// Replace whatever route the entity is playing with `route`.
    fn force_route(&mut self, handle: EntityHandle, route: &MoveRoute) -> SyncResult<()>;

    /// True while a forced route is still executing.
    fn is_route_forcing(&self, handle: EntityHandle) -> bool;

    /// Live position, or `None` for an unknown handle.
    fn position(&self, handle: EntityHandle) -> Option<TilePos>;

    /// Move instantly, cancelling any forced route.
    fn teleport(&mut self, handle: EntityHandle, pos: TilePos) -> SyncResult<()>;

    fn set_direction(&mut self, handle: EntityHandle, direction: Direction);

    fn set_move_speed(&mut self, handle: EntityHandle, speed: u8);

    fn set_animation(&mut self, handle: EntityHandle, flags: AnimationFlags);
}
