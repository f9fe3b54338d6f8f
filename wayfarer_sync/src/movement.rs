// Movement Reconciliation Engine.
//
// Turns "remote entity is now at (x, y)" into something the host can play
// back: a forced route of axis-aligned unit steps from the entity's live
// position to the target, followed, once the host reports the route has
// finished, by a comparison against the target and a hard teleport if the
// walk fell short (blocked step, superseded route). Whatever happens on the
// way, an entity that stops receiving updates ends exactly at the last
// position announced for it.
//
// Path shape: all vertical steps first, then all horizontal ones. The fixed
// order keeps paths reproducible across clients; diagonals are never used.
// Jumps longer than `SyncConfig::max_route_len` tiles (scene transfers,
// garbage coordinates) get no route at all: the entity is teleported onto
// the target at once.
//
// Supersede policy (`SupersedePolicy`, see `config.rs`):
// - `OverwriteFromLive`: every target re-forces a route computed from where
//   the entity stands right now, replacing the route in flight.
// - `WaitForArrival`: a target arriving mid-route only replaces the pending
//   target; when the route ends, a fresh route toward the newest target is
//   issued from wherever the entity stopped. Only a route that was aimed at
//   the pending target and missed it is snapped.
//
// Followers trail their leader: when a leader is given a target, follower
// slot k is given the position the entity in slot k-1 was announced at
// before this update.

use log::{debug, warn};

use crate::config::{SupersedePolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::gateway::{AnimationFlags, EntityGateway};
use crate::registry::{RemoteBody, RemotePlayer, RemoteRegistry};
use crate::types::{MoveRoute, MoveStep, TilePos};

/// Steps from `from` to `to`: `|dy|` vertical steps, then `|dx|` horizontal.
///
/// The route has `from.manhattan_distance(to)` steps; callers bound that
/// before planning.
pub fn plan_steps(from: TilePos, to: TilePos) -> Vec<MoveStep> {
    let dx = i64::from(to.x) - i64::from(from.x);
    let dy = i64::from(to.y) - i64::from(from.y);
    let vertical = if dy > 0 { MoveStep::Down } else { MoveStep::Up };
    let horizontal = if dx > 0 { MoveStep::Right } else { MoveStep::Left };

    let count = |d: i64| usize::try_from(d.unsigned_abs()).unwrap_or(usize::MAX);
    std::iter::repeat_n(vertical, count(dy))
        .chain(std::iter::repeat_n(horizontal, count(dx)))
        .collect()
}

/// Result of polling one entity on a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing pending.
    Idle,
    /// Route still playing.
    Waiting,
    /// Route finished on target.
    Arrived,
    /// Route finished off target; teleported onto it.
    Snapped,
    /// Target changed while the old route played; new route issued.
    Reissued,
}

/// Per-tick counts, mostly for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub waiting: usize,
    pub arrived: usize,
    pub snapped: usize,
    pub reissued: usize,
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, outcome: SyncResult<PollOutcome>) {
        match outcome {
            Ok(PollOutcome::Idle) => {}
            Ok(PollOutcome::Waiting) => self.waiting += 1,
            Ok(PollOutcome::Arrived) => self.arrived += 1,
            Ok(PollOutcome::Snapped) => self.snapped += 1,
            Ok(PollOutcome::Reissued) => self.reissued += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// True once nothing is waiting on the host.
    pub fn settled(&self) -> bool {
        self.waiting == 0 && self.reissued == 0
    }
}

#[derive(Clone, Debug)]
pub struct Reconciler {
    policy: SupersedePolicy,
    move_speed: u8,
    animation: AnimationFlags,
    max_route_len: u32,
}

impl Reconciler {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            policy: config.supersede_policy,
            move_speed: config.remote_move_speed,
            animation: AnimationFlags {
                walk_anime: config.walk_anime,
                step_anime: config.step_anime,
            },
            max_route_len: config.max_route_len,
        }
    }

    pub fn policy(&self) -> SupersedePolicy {
        self.policy
    }

    /// Record `target` as the entity's true position and start moving it
    /// there. Replaces any earlier pending target.
    pub fn apply_target(
        &self,
        body: &mut RemoteBody,
        target: TilePos,
        gateway: &mut dyn EntityGateway,
    ) -> SyncResult<()> {
        body.position = target;
        body.pending_target = Some(target);

        match self.policy {
            SupersedePolicy::OverwriteFromLive => self.issue_route(body, target, gateway),
            SupersedePolicy::WaitForArrival => {
                if gateway.is_route_forcing(body.handle) {
                    debug!("{} busy, target {target} deferred", body.handle);
                    Ok(())
                } else {
                    self.issue_route(body, target, gateway)
                }
            }
        }
    }

    /// Move a remote player's avatar to `target` and pull its followers one
    /// slot along the chain.
    pub fn apply_player_target(
        &self,
        player: &mut RemotePlayer,
        target: TilePos,
        gateway: &mut dyn EntityGateway,
    ) -> SyncResult<()> {
        let mut previous = player.avatar.position;
        let moved = previous != target;
        self.apply_target(&mut player.avatar, target, gateway)?;
        if !moved {
            return Ok(());
        }

        for follower in player.followers_mut() {
            let vacated = follower.body.position;
            if let Err(e) = self.apply_target(&mut follower.body, previous, gateway) {
                warn!("follower slot {} could not trail: {e}", follower.slot_index);
            }
            previous = vacated;
        }
        Ok(())
    }

    /// Check one entity's route and reconcile it if the route is done.
    pub fn poll(
        &self,
        body: &mut RemoteBody,
        gateway: &mut dyn EntityGateway,
    ) -> SyncResult<PollOutcome> {
        let Some(target) = body.pending_target else {
            return Ok(PollOutcome::Idle);
        };
        if gateway.is_route_forcing(body.handle) {
            return Ok(PollOutcome::Waiting);
        }
        let Some(live) = gateway.position(body.handle) else {
            body.pending_target = None;
            body.route_goal = None;
            return Err(SyncError::UnknownHandle(body.handle));
        };

        if live == target {
            body.pending_target = None;
            body.route_goal = None;
            return Ok(PollOutcome::Arrived);
        }
        if body.route_goal != Some(target) {
            self.issue_route(body, target, gateway)?;
            return Ok(PollOutcome::Reissued);
        }

        body.pending_target = None;
        body.route_goal = None;
        debug!("{} stopped at {live}, snapping to {target}", body.handle);
        gateway.teleport(body.handle, target)?;
        Ok(PollOutcome::Snapped)
    }

    /// Poll every avatar and follower in the registry.
    pub fn tick(
        &self,
        registry: &mut RemoteRegistry,
        gateway: &mut dyn EntityGateway,
    ) -> TickReport {
        let mut report = TickReport::default();
        for player in registry.players_mut() {
            let outcome = self.poll(&mut player.avatar, gateway);
            if let Err(e) = &outcome {
                warn!("reconcile {} failed: {e}", player.identity);
            }
            report.record(outcome);

            for follower in player.followers_mut() {
                let outcome = self.poll(&mut follower.body, gateway);
                if let Err(e) = &outcome {
                    warn!("reconcile follower slot {} failed: {e}", follower.slot_index);
                }
                report.record(outcome);
            }
        }
        report
    }

    fn issue_route(
        &self,
        body: &mut RemoteBody,
        target: TilePos,
        gateway: &mut dyn EntityGateway,
    ) -> SyncResult<()> {
        let live = gateway
            .position(body.handle)
            .ok_or(SyncError::UnknownHandle(body.handle))?;
        let distance = live.manhattan_distance(target);
        if distance > u64::from(self.max_route_len) {
            warn!("{} jump of {distance} tiles to {target}; teleporting", body.handle);
            body.pending_target = None;
            body.route_goal = None;
            return gateway.teleport(body.handle, target);
        }
        let steps = plan_steps(live, target);
        if let Some(first) = steps.first() {
            gateway.set_direction(body.handle, first.direction());
        }
        gateway.set_move_speed(body.handle, self.move_speed);
        gateway.set_animation(body.handle, self.animation);
        gateway.force_route(body.handle, &MoveRoute::forced(&steps))?;
        body.route_goal = Some(target);
        Ok(())
    }
}
