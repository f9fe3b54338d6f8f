// Session/Connection Manager.
//
// `SyncSession` owns the relay link, the local identity, the remote entity
// registry, and the reconciliation engine, and is the only thing that
// mutates any of them. Inbound relay messages come in through
// `handle_message` (or `pump`, which drains the link first); local
// movement and party changes come in through `handle_local_event`; the host
// drives reconciliation by calling `tick` once per frame.
//
// Connection states:
//
//     Disconnected --attach_link--> Connecting --on_connected--> Connected
//          ^                                                        |
//          +------------------ on_transport_closed -----------------+
//
// On entering `Connected` the session publishes the local roster and asks
// the relay for a snapshot of everyone already on the map. There is no
// automatic reconnect.
//
// Echo suppression: the relay broadcasts moves and roster changes to
// everyone, the sender included. The local client is authoritative over its
// own avatar, so updates carrying the local identity are dropped before they
// reach the registry.
//
// Publishing while not connected is a logged no-op. Outbound changes are not
// queued for replay; the next step or roster change after connecting carries
// the current state anyway.
//
// Everything here runs on the host's single game thread. Network callbacks
// (`handle_message`) and `tick` interleave but never overlap.

use log::{debug, error, info, warn};
use wayfarer_protocol::link::{LinkError, RelayLink};
use wayfarer_protocol::message::{ClientMessage, PlayerSnapshot, ServerMessage};

use crate::actors::ActorCatalog;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::EntityGateway;
use crate::movement::{Reconciler, TickReport};
use crate::registry::{RemotePlayer, RemoteRegistry};
use crate::roster::{self, RosterOutcome};
use crate::types::{ActorId, Identity, SpriteRef, TilePos};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events raised by the host's local movement and party systems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalEvent {
    /// The local avatar finished a step and now stands here.
    StepCompleted(TilePos),
    /// The local party composition, leader first.
    PartyChanged(Vec<ActorId>),
}

pub struct SyncSession {
    config: SyncConfig,
    catalog: ActorCatalog,
    state: ConnectionState,
    local_roster: Vec<ActorId>,
    local_position: Option<TilePos>,
    registry: RemoteRegistry,
    reconciler: Reconciler,
    link: Option<Box<dyn RelayLink>>,
}

impl SyncSession {
    pub fn new(config: SyncConfig, catalog: ActorCatalog) -> Self {
        let reconciler = Reconciler::new(&config);
        Self {
            config,
            catalog,
            state: ConnectionState::Disconnected,
            local_roster: Vec::new(),
            local_position: None,
            registry: RemoteRegistry::new(),
            reconciler,
            link: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn local_identity(&self) -> Option<&Identity> {
        self.registry.local_identity()
    }

    pub fn local_roster(&self) -> &[ActorId] {
        &self.local_roster
    }

    pub fn local_position(&self) -> Option<TilePos> {
        self.local_position
    }

    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    pub fn remote_player(&self, identity: &Identity) -> Option<&RemotePlayer> {
        self.registry.get(identity).ok()
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Hand the session a transport that is being (or has been) set up.
    pub fn attach_link(&mut self, link: Box<dyn RelayLink>) {
        if self.state != ConnectionState::Disconnected {
            warn!("attach_link while {:?}; replacing the old link", self.state);
            if let Some(mut old) = self.link.take() {
                old.close();
            }
        }
        self.link = Some(link);
        self.state = ConnectionState::Connecting;
    }

    /// The relay assigned us `identity`. Publishes the local roster and
    /// requests a snapshot of the players already connected.
    pub fn on_connected(&mut self, identity: Identity) {
        if self.link.is_none() {
            warn!("connected as {identity} without a link; ignoring");
            return;
        }
        info!("connected to relay as {identity}");
        if self.registry.contains(&identity) {
            warn!("local identity {identity} was registered as remote; it will be ignored");
        }
        self.registry.set_local_identity(Some(identity));
        self.state = ConnectionState::Connected;

        self.send_full_roster();
        self.send(&ClientMessage::RequestCurrentPlayers);
    }

    /// The transport closed or failed. Every remote entity is destroyed and
    /// the local identity is forgotten.
    pub fn on_transport_closed(&mut self, gateway: &mut dyn EntityGateway) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        info!("relay connection closed");
        self.link = None;
        self.registry.destroy_all(gateway);
        self.registry.set_local_identity(None);
        self.state = ConnectionState::Disconnected;
    }

    /// Leave gracefully.
    pub fn disconnect(&mut self, gateway: &mut dyn EntityGateway) {
        if let Some(link) = self.link.as_mut() {
            link.close();
        }
        self.on_transport_closed(gateway);
    }

    /// The host rebuilt its map scene: every entity it had is gone. Forget
    /// them and ask for a fresh snapshot.
    pub fn on_scene_reloaded(&mut self) {
        self.registry.forget_all();
        if self.state == ConnectionState::Connected {
            self.send(&ClientMessage::RequestCurrentPlayers);
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Drain the link and dispatch everything it delivered, in order.
    /// Returns the number of messages handled.
    pub fn pump(&mut self, gateway: &mut dyn EntityGateway) -> usize {
        let Some(link) = self.link.as_mut() else {
            return 0;
        };
        let messages = match link.poll() {
            Ok(messages) => messages,
            Err(LinkError::Closed) => {
                self.on_transport_closed(gateway);
                return 0;
            }
            Err(e) => {
                error!("relay link failed: {e}");
                self.on_transport_closed(gateway);
                return 0;
            }
        };
        let count = messages.len();
        for msg in messages {
            self.handle_message(msg, gateway);
        }
        count
    }

    pub fn handle_message(&mut self, msg: ServerMessage, gateway: &mut dyn EntityGateway) {
        debug!("relay -> {msg:?}");
        match msg {
            ServerMessage::Connected { identity } => self.on_connected(identity),
            ServerMessage::Rejected { reason } => {
                error!("relay rejected us: {reason}");
                self.on_transport_closed(gateway);
            }
            ServerMessage::CurrentPlayers { players } => self.on_remote_snapshot(&players, gateway),
            ServerMessage::PlayerConnected(player) => self.on_player_connected(&player, gateway),
            ServerMessage::PlayerDisconnected { identity } => {
                self.on_player_disconnected(&identity, gateway);
            }
            ServerMessage::PlayerMoved { identity, x, y } => {
                self.on_position_update(&identity, x, y, gateway);
            }
            ServerMessage::PlayerPartyUpdated {
                identity,
                party_members,
            } => {
                self.on_roster_update(&identity, &party_members, gateway);
            }
        }
    }

    pub fn on_remote_snapshot(&mut self, players: &[PlayerSnapshot], gateway: &mut dyn EntityGateway) {
        for player in players {
            if self.registry.is_local(&player.identity) {
                continue;
            }
            self.materialize(player, gateway);
        }
    }

    pub fn on_player_connected(&mut self, player: &PlayerSnapshot, gateway: &mut dyn EntityGateway) {
        if self.registry.is_local(&player.identity) {
            return;
        }
        self.materialize(player, gateway);
    }

    pub fn on_player_disconnected(&mut self, identity: &Identity, gateway: &mut dyn EntityGateway) {
        self.registry.destroy(identity, gateway);
    }

    pub fn on_position_update(
        &mut self,
        identity: &Identity,
        x: i32,
        y: i32,
        gateway: &mut dyn EntityGateway,
    ) {
        if self.registry.is_local(identity) {
            return;
        }
        let player = match self.registry.get_mut(identity) {
            Ok(player) => player,
            Err(e) => {
                warn!("move dropped: {e}");
                return;
            }
        };
        let target = TilePos::new(x, y);
        if let Err(e) = self.reconciler.apply_player_target(player, target, gateway) {
            warn!("move of {identity} to {target} failed: {e}");
        }
    }

    pub fn on_roster_update(
        &mut self,
        identity: &Identity,
        roster: &[ActorId],
        gateway: &mut dyn EntityGateway,
    ) -> Option<RosterOutcome> {
        if self.registry.is_local(identity) {
            return None;
        }
        let player = match self.registry.get_mut(identity) {
            Ok(player) => player,
            Err(e) => {
                warn!("roster dropped: {e}");
                return None;
            }
        };
        Some(roster::apply_roster(
            player,
            roster,
            &self.catalog,
            &self.config,
            gateway,
        ))
    }

    /// Create the avatar for a snapshot entry if needed, then apply its
    /// roster when the snapshot carries one.
    fn materialize(&mut self, snapshot: &PlayerSnapshot, gateway: &mut dyn EntityGateway) {
        let sprite = self.avatar_sprite(snapshot.party_members.as_deref());
        let player = match self.registry.ensure_created(
            &snapshot.identity,
            snapshot.position(),
            &sprite,
            gateway,
        ) {
            Ok(player) => player,
            Err(SyncError::SelfIdentity) => return,
            Err(e) => {
                error!("could not create {}: {e}", snapshot.identity);
                return;
            }
        };
        if let Some(roster) = &snapshot.party_members {
            roster::apply_roster(player, roster, &self.catalog, &self.config, gateway);
        }
    }

    /// The leader's sprite, falling back to the configured default.
    fn avatar_sprite(&self, roster: Option<&[ActorId]>) -> SpriteRef {
        let Some(&leader) = roster.and_then(|r| r.first()) else {
            return self.config.default_sprite.clone();
        };
        self.catalog.sprite_for(leader).unwrap_or_else(|e| {
            warn!("avatar uses default sprite: {e}");
            self.config.default_sprite.clone()
        })
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    pub fn handle_local_event(&mut self, event: LocalEvent) -> bool {
        match event {
            LocalEvent::StepCompleted(pos) => self.publish_local_movement(pos),
            LocalEvent::PartyChanged(roster) => {
                if roster == self.local_roster {
                    return false;
                }
                self.publish_local_roster(roster)
            }
        }
    }

    /// Announce the local avatar's position. Returns whether it was sent.
    pub fn publish_local_movement(&mut self, pos: TilePos) -> bool {
        self.local_position = Some(pos);
        let Some(identity) = self.registry.local_identity().cloned() else {
            warn!("step to {pos} not published: {}", SyncError::TransportUnavailable);
            return false;
        };
        self.send(&ClientMessage::MovePlayer {
            identity,
            x: pos.x,
            y: pos.y,
        })
    }

    /// Record and announce the full local roster. Returns whether it was sent.
    pub fn publish_local_roster(&mut self, roster: Vec<ActorId>) -> bool {
        self.local_roster = roster;
        self.send_full_roster()
    }

    fn send_full_roster(&mut self) -> bool {
        self.send(&ClientMessage::SetPartyMembers {
            party_member_ids: self.local_roster.clone(),
        })
    }

    fn send(&mut self, msg: &ClientMessage) -> bool {
        match self.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!("{msg:?} not sent: {e}");
                false
            }
        }
    }

    fn try_send(&mut self, msg: &ClientMessage) -> SyncResult<()> {
        if self.state != ConnectionState::Connected {
            return Err(SyncError::TransportUnavailable);
        }
        let link = self.link.as_mut().ok_or(SyncError::TransportUnavailable)?;
        debug!("relay <- {msg:?}");
        link.send(msg).map_err(|e| {
            // The reader side notices the dead socket and closes the session.
            error!("relay send failed: {e}");
            SyncError::TransportUnavailable
        })
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance reconciliation by one host frame.
    pub fn tick(&mut self, gateway: &mut dyn EntityGateway) -> TickReport {
        self.reconciler.tick(&mut self.registry, gateway)
    }
}
