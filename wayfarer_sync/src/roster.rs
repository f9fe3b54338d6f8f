// Party Composition Synchronizer.
//
// Keeps a remote player's follower entities matching the last roster it
// announced. The comparison is positional: same length and the same actor in
// every slot, or the whole follower set is rebuilt. There is no per-actor
// diffing; rosters are short and a rebuild is a handful of host calls.
//
// Roster index 0 is the leader and is drawn by the avatar itself. Slot k
// (k >= 1) spawns at `(leader.x, leader.y + k * follower_spacing)`, marked
// pass-through so followers never block anyone.
//
// An actor id with no static sprite data is skipped with a logged error; the
// remaining slots keep their indices and still spawn.

use log::{debug, error};

use crate::actors::ActorCatalog;
use crate::config::SyncConfig;
use crate::gateway::EntityGateway;
use crate::registry::RemotePlayer;
use crate::types::{ActorId, TilePos};

/// What `apply_roster` did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterOutcome {
    /// False when the roster matched and nothing was touched.
    pub rebuilt: bool,
    pub spawned: usize,
    /// Slots left empty, with the actor that could not be drawn.
    pub skipped: Vec<(usize, ActorId)>,
}

/// Whether `roster` differs from what `player` last materialized.
pub fn roster_differs(player: &RemotePlayer, roster: &[ActorId]) -> bool {
    player.roster() != roster
}

/// Bring `player`'s followers in line with `roster`.
pub fn apply_roster(
    player: &mut RemotePlayer,
    roster: &[ActorId],
    catalog: &ActorCatalog,
    config: &SyncConfig,
    gateway: &mut dyn EntityGateway,
) -> RosterOutcome {
    if !roster_differs(player, roster) {
        debug!("roster for {} unchanged", player.identity);
        return RosterOutcome::default();
    }

    player.despawn_followers(gateway);
    let leader = player.position();
    let mut outcome = RosterOutcome {
        rebuilt: true,
        ..RosterOutcome::default()
    };

    for (slot, &actor) in roster.iter().enumerate().skip(1) {
        let sprite = match catalog.sprite_for(actor) {
            Ok(sprite) => sprite,
            Err(e) => {
                error!("{}: follower slot {slot} skipped: {e}", player.identity);
                outcome.skipped.push((slot, actor));
                continue;
            }
        };
        let at = follower_spawn(leader, slot, config.follower_spacing);
        match player.spawn_follower(slot, actor, sprite, at, gateway) {
            Ok(()) => outcome.spawned += 1,
            Err(e) => {
                error!("{}: follower slot {slot} not created: {e}", player.identity);
                outcome.skipped.push((slot, actor));
            }
        }
    }

    player.set_roster(roster.to_vec());
    debug!(
        "roster for {} rebuilt: {} followers, {} skipped",
        player.identity,
        outcome.spawned,
        outcome.skipped.len()
    );
    outcome
}

fn follower_spawn(leader: TilePos, slot: usize, spacing: i32) -> TilePos {
    let offset = i32::try_from(slot).unwrap_or(i32::MAX).saturating_mul(spacing);
    TilePos::new(leader.x, leader.y.saturating_add(offset))
}
