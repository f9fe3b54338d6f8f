// Remote Entity Registry: remote identity -> host entities.
//
// `RemoteRegistry` is the single source of truth for which remote players
// exist on this client and which host entities (one avatar plus zero or more
// followers) each of them owns. Every host entity the sync engine creates is
// reachable from exactly one `RemotePlayer` here, and every path that
// destroys a player destroys its followers too, so nothing is orphaned.
//
// Pending movement targets live inside the records (`RemoteBody`), not in a
// side table. Removing a record therefore also drops any reconciliation in
// flight for its handles; there is nothing separate to cancel.
//
// Lookups for unknown identities return `SyncError::EntityNotFound`. Callers
// log and drop the update; an update that beats its creation message is lost
// and the next snapshot or move repairs it.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::gateway::{EntityGateway, EntityOptions};
use crate::types::{ActorId, EntityHandle, Identity, SpriteRef, TilePos};

/// Movement state shared by avatars and followers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteBody {
    pub handle: EntityHandle,
    /// Last position announced for this entity: where it truly is remotely.
    pub position: TilePos,
    /// Target still waiting for its route to finish. At most one.
    pub pending_target: Option<TilePos>,
    /// Where the route currently handed to the host is aimed.
    pub(crate) route_goal: Option<TilePos>,
}

impl RemoteBody {
    pub fn new(handle: EntityHandle, position: TilePos) -> Self {
        Self {
            handle,
            position,
            pending_target: None,
            route_goal: None,
        }
    }
}

/// A party member drawn behind a remote avatar.
#[derive(Clone, Debug)]
pub struct RemoteFollower {
    pub body: RemoteBody,
    /// Index into the owning player's roster (1 = first follower).
    pub slot_index: usize,
    pub actor: ActorId,
    pub sprite: SpriteRef,
}

#[derive(Clone, Debug)]
pub struct RemotePlayer {
    pub identity: Identity,
    pub avatar: RemoteBody,
    roster: Vec<ActorId>,
    followers: Vec<RemoteFollower>,
}

impl RemotePlayer {
    pub fn position(&self) -> TilePos {
        self.avatar.position
    }

    /// Last roster applied to this player, leader first.
    pub fn roster(&self) -> &[ActorId] {
        &self.roster
    }

    /// Materialized followers in slot order.
    pub fn followers(&self) -> &[RemoteFollower] {
        &self.followers
    }

    pub(crate) fn followers_mut(&mut self) -> &mut [RemoteFollower] {
        &mut self.followers
    }

    /// Every host handle this player owns, avatar first.
    pub fn handles(&self) -> Vec<EntityHandle> {
        std::iter::once(self.avatar.handle)
            .chain(self.followers.iter().map(|f| f.body.handle))
            .collect()
    }

    pub(crate) fn set_roster(&mut self, roster: Vec<ActorId>) {
        self.roster = roster;
    }

    /// Create one follower entity. Followers are pass-through.
    pub(crate) fn spawn_follower(
        &mut self,
        slot_index: usize,
        actor: ActorId,
        sprite: SpriteRef,
        at: TilePos,
        gateway: &mut dyn EntityGateway,
    ) -> SyncResult<()> {
        let handle = gateway.create_entity(at, &sprite, EntityOptions { through: true })?;
        self.followers.push(RemoteFollower {
            body: RemoteBody::new(handle, at),
            slot_index,
            actor,
            sprite,
        });
        Ok(())
    }

    /// Destroy every follower entity. Their pending targets go with them.
    pub(crate) fn despawn_followers(&mut self, gateway: &mut dyn EntityGateway) {
        for follower in self.followers.drain(..) {
            gateway.destroy_entity(follower.body.handle);
        }
    }

    fn destroy_entities(&mut self, gateway: &mut dyn EntityGateway) {
        self.despawn_followers(gateway);
        gateway.destroy_entity(self.avatar.handle);
    }
}

#[derive(Debug, Default)]
pub struct RemoteRegistry {
    players: BTreeMap<Identity, RemotePlayer>,
    local_identity: Option<Identity>,
}

impl RemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_identity(&self) -> Option<&Identity> {
        self.local_identity.as_ref()
    }

    pub fn set_local_identity(&mut self, identity: Option<Identity>) {
        self.local_identity = identity;
    }

    pub fn is_local(&self, identity: &Identity) -> bool {
        self.local_identity.as_ref() == Some(identity)
    }

    /// Return the player for `identity`, creating its avatar at `pos` first
    /// if it is not known yet. An existing record is returned unchanged.
    /// The local identity is always refused.
    pub fn ensure_created(
        &mut self,
        identity: &Identity,
        pos: TilePos,
        sprite: &SpriteRef,
        gateway: &mut dyn EntityGateway,
    ) -> SyncResult<&mut RemotePlayer> {
        if self.is_local(identity) {
            return Err(SyncError::SelfIdentity);
        }
        if !self.players.contains_key(identity) {
            let handle = gateway.create_entity(pos, sprite, EntityOptions::default())?;
            info!("created remote player {identity} at {pos} as {handle}");
            self.players.insert(
                identity.clone(),
                RemotePlayer {
                    identity: identity.clone(),
                    avatar: RemoteBody::new(handle, pos),
                    roster: Vec::new(),
                    followers: Vec::new(),
                },
            );
        }
        self.players
            .get_mut(identity)
            .ok_or_else(|| SyncError::EntityNotFound(identity.clone()))
    }

    /// Destroy the avatar and all followers of `identity` and drop the
    /// record. Returns false (and does nothing) for an unknown identity.
    pub fn destroy(&mut self, identity: &Identity, gateway: &mut dyn EntityGateway) -> bool {
        match self.players.remove(identity) {
            Some(mut player) => {
                player.destroy_entities(gateway);
                info!("destroyed remote player {identity}");
                true
            }
            None => {
                debug!("destroy for unknown player {identity} ignored");
                false
            }
        }
    }

    /// Destroy every remote player.
    pub fn destroy_all(&mut self, gateway: &mut dyn EntityGateway) {
        for (_, mut player) in std::mem::take(&mut self.players) {
            player.destroy_entities(gateway);
        }
    }

    /// Drop every record without touching the host. For when the host has
    /// already thrown the entities away (scene rebuild).
    pub fn forget_all(&mut self) {
        if !self.players.is_empty() {
            warn!("forgetting {} remote players after scene reload", self.players.len());
        }
        self.players.clear();
    }

    pub fn get(&self, identity: &Identity) -> SyncResult<&RemotePlayer> {
        self.players
            .get(identity)
            .ok_or_else(|| SyncError::EntityNotFound(identity.clone()))
    }

    pub fn get_mut(&mut self, identity: &Identity) -> SyncResult<&mut RemotePlayer> {
        self.players
            .get_mut(identity)
            .ok_or_else(|| SyncError::EntityNotFound(identity.clone()))
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.players.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut RemotePlayer> {
        self.players.values_mut()
    }
}
