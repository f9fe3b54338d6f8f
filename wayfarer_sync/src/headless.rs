// Headless in-memory host implementing `EntityGateway`.
//
// Used by tests, bots, and the multiplayer harness to run the sync engine
// without a game engine. It models just enough of a tile map host:
//
// - Entities live on an unbounded grid with a set of blocked cells.
// - `advance()` is one host frame: every entity with a forced route takes
//   exactly one step (move speed only matters to a real renderer).
// - A step into a blocked cell, or into a non-pass-through entity, is
//   consumed without moving; the entity only turns to face it. Forced
//   routes therefore always terminate, which is what lets the
//   reconciliation engine detect the miss and snap.
// - With the scene inactive (`set_scene_active(false)`), entity creation
//   fails with `HostCapabilityUnavailable`, like a host that is showing a
//   menu instead of a map.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{SyncError, SyncResult};
use crate::gateway::{AnimationFlags, EntityGateway, EntityOptions};
use crate::types::{Direction, EntityHandle, MoveRoute, MoveStep, SpriteRef, TilePos};

/// Host-side state of one entity, exposed read-only for assertions.
#[derive(Clone, Debug)]
pub struct HostEntity {
    pub position: TilePos,
    pub sprite: SpriteRef,
    pub options: EntityOptions,
    pub direction: Direction,
    pub move_speed: u8,
    pub animation: AnimationFlags,
    route: VecDeque<MoveStep>,
    forcing: bool,
    /// Every route ever forced on this entity, oldest first.
    pub routes_forced: Vec<MoveRoute>,
    pub teleports: u32,
}

#[derive(Debug)]
pub struct HeadlessHost {
    entities: BTreeMap<EntityHandle, HostEntity>,
    blocked: BTreeSet<TilePos>,
    next_handle: u64,
    scene_active: bool,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            blocked: BTreeSet::new(),
            next_handle: 1,
            scene_active: true,
        }
    }

    pub fn block(&mut self, pos: TilePos) {
        self.blocked.insert(pos);
    }

    pub fn set_scene_active(&mut self, active: bool) {
        self.scene_active = active;
    }

    /// Simulate a scene rebuild: every entity vanishes without being
    /// destroyed through the gateway.
    pub fn reload_scene(&mut self) {
        self.entities.clear();
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&HostEntity> {
        self.entities.get(&handle)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// True if any entity is still playing a forced route.
    pub fn any_forcing(&self) -> bool {
        self.entities.values().any(|e| e.forcing)
    }

    /// Run one host frame.
    pub fn advance(&mut self) {
        let handles: Vec<EntityHandle> = self
            .entities
            .iter()
            .filter(|(_, e)| e.forcing)
            .map(|(h, _)| *h)
            .collect();
        for handle in handles {
            self.step_entity(handle);
        }
    }

    fn step_entity(&mut self, handle: EntityHandle) {
        let Some(entity) = self.entities.get_mut(&handle) else {
            return;
        };
        let Some(step) = entity.route.pop_front() else {
            entity.forcing = false;
            return;
        };
        let from = entity.position;
        let through = entity.options.through;
        entity.direction = step.direction();
        let to = step.apply(from);

        if through || self.is_passable(to, handle) {
            if let Some(entity) = self.entities.get_mut(&handle) {
                entity.position = to;
            }
        }
        if let Some(entity) = self.entities.get_mut(&handle) {
            if entity.route.is_empty() {
                entity.forcing = false;
            }
        }
    }

    fn is_passable(&self, pos: TilePos, mover: EntityHandle) -> bool {
        if self.blocked.contains(&pos) {
            return false;
        }
        !self
            .entities
            .iter()
            .any(|(h, e)| *h != mover && !e.options.through && e.position == pos)
    }
}

impl EntityGateway for HeadlessHost {
    fn create_entity(
        &mut self,
        pos: TilePos,
        sprite: &SpriteRef,
        options: EntityOptions,
    ) -> SyncResult<EntityHandle> {
        if !self.scene_active {
            return Err(SyncError::HostCapabilityUnavailable(
                "no active map scene".into(),
            ));
        }
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        self.entities.insert(
            handle,
            HostEntity {
                position: pos,
                sprite: sprite.clone(),
                options,
                direction: Direction::Down,
                move_speed: 3,
                animation: AnimationFlags {
                    walk_anime: true,
                    step_anime: false,
                },
                route: VecDeque::new(),
                forcing: false,
                routes_forced: Vec::new(),
                teleports: 0,
            },
        );
        Ok(handle)
    }

    fn destroy_entity(&mut self, handle: EntityHandle) {
        self.entities.remove(&handle);
    }

    fn force_route(&mut self, handle: EntityHandle, route: &MoveRoute) -> SyncResult<()> {
        let entity = self
            .entities
            .get_mut(&handle)
            .ok_or(SyncError::UnknownHandle(handle))?;
        entity.route = route.steps().collect();
        entity.forcing = !entity.route.is_empty();
        entity.routes_forced.push(route.clone());
        Ok(())
    }

    fn is_route_forcing(&self, handle: EntityHandle) -> bool {
        self.entities.get(&handle).is_some_and(|e| e.forcing)
    }

    fn position(&self, handle: EntityHandle) -> Option<TilePos> {
        self.entities.get(&handle).map(|e| e.position)
    }

    fn teleport(&mut self, handle: EntityHandle, pos: TilePos) -> SyncResult<()> {
        let entity = self
            .entities
            .get_mut(&handle)
            .ok_or(SyncError::UnknownHandle(handle))?;
        entity.position = pos;
        entity.route.clear();
        entity.forcing = false;
        entity.teleports += 1;
        Ok(())
    }

    fn set_direction(&mut self, handle: EntityHandle, direction: Direction) {
        if let Some(entity) = self.entities.get_mut(&handle) {
            entity.direction = direction;
        }
    }

    fn set_move_speed(&mut self, handle: EntityHandle, speed: u8) {
        if let Some(entity) = self.entities.get_mut(&handle) {
            entity.move_speed = speed;
        }
    }

    fn set_animation(&mut self, handle: EntityHandle, flags: AnimationFlags) {
        if let Some(entity) = self.entities.get_mut(&handle) {
            entity.animation = flags;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite() -> SpriteRef {
        SpriteRef::new("Actor1", 0)
    }

    #[test]
    fn route_plays_one_step_per_frame() {
        let mut host = HeadlessHost::new();
        let h = host
            .create_entity(TilePos::new(0, 0), &sprite(), EntityOptions::default())
            .unwrap();
        let route = MoveRoute::forced(&[MoveStep::Down, MoveStep::Right]);
        host.force_route(h, &route).unwrap();

        assert!(host.is_route_forcing(h));
        host.advance();
        assert_eq!(host.position(h), Some(TilePos::new(0, 1)));
        assert!(host.is_route_forcing(h));
        host.advance();
        assert_eq!(host.position(h), Some(TilePos::new(1, 1)));
        assert!(!host.is_route_forcing(h));
        assert_eq!(host.entity(h).unwrap().direction, Direction::Right);
    }

    #[test]
    fn blocked_step_is_consumed_without_moving() {
        let mut host = HeadlessHost::new();
        let h = host
            .create_entity(TilePos::new(0, 0), &sprite(), EntityOptions::default())
            .unwrap();
        host.block(TilePos::new(1, 0));
        host.force_route(h, &MoveRoute::forced(&[MoveStep::Right]))
            .unwrap();
        host.advance();
        assert_eq!(host.position(h), Some(TilePos::new(0, 0)));
        assert!(!host.is_route_forcing(h));
    }

    #[test]
    fn solid_entities_block_but_through_entities_do_not() {
        let mut host = HeadlessHost::new();
        let a = host
            .create_entity(TilePos::new(0, 0), &sprite(), EntityOptions::default())
            .unwrap();
        let ghost = host
            .create_entity(TilePos::new(1, 0), &sprite(), EntityOptions { through: true })
            .unwrap();
        host.force_route(a, &MoveRoute::forced(&[MoveStep::Right]))
            .unwrap();
        host.advance();
        assert_eq!(host.position(a), Some(TilePos::new(1, 0)));

        // The pass-through ghost walks into the solid entity's cell freely.
        host.force_route(ghost, &MoveRoute::forced(&[MoveStep::Up, MoveStep::Down]))
            .unwrap();
        host.advance();
        host.advance();
        assert_eq!(host.position(ghost), Some(TilePos::new(1, 0)));
    }

    #[test]
    fn inactive_scene_refuses_creation() {
        let mut host = HeadlessHost::new();
        host.set_scene_active(false);
        let err = host
            .create_entity(TilePos::new(0, 0), &sprite(), EntityOptions::default())
            .unwrap_err();
        assert!(matches!(err, SyncError::HostCapabilityUnavailable(_)));
        assert_eq!(host.entity_count(), 0);
    }

    #[test]
    fn empty_route_completes_immediately() {
        let mut host = HeadlessHost::new();
        let h = host
            .create_entity(TilePos::new(2, 2), &sprite(), EntityOptions::default())
            .unwrap();
        host.force_route(h, &MoveRoute::forced(&[])).unwrap();
        assert!(!host.is_route_forcing(h));
    }
}
