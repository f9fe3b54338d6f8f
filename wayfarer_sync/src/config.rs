// Data-driven sync configuration.
//
// `SyncConfig` holds every tunable the engine reads: the playback speed and
// animation flags used for all remote movement, the fallback avatar sprite,
// follower spacing, the longest route worth walking, and which supersede
// policy the reconciliation engine follows. It is loaded from JSON; missing fields take their defaults so a
// config file only needs to name what it changes.
//
// `ClientConfig` is the connection half: where the relay lives and which
// name to announce in the handshake.
//
// See also: `movement.rs` for how `SupersedePolicy` is applied, `roster.rs`
// for `follower_spacing`.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::types::SpriteRef;

/// What happens when a new target arrives while a forced route is still
/// playing for the same entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedePolicy {
    /// Re-force immediately with a route computed from the live position.
    #[default]
    OverwriteFromLive,
    /// Record the new target and let the in-flight route finish; a fresh
    /// route is issued from wherever it stopped.
    WaitForArrival,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Host move-speed level used for every remote route (1 = slowest).
    pub remote_move_speed: u8,
    /// Animate the walk cycle while moving.
    pub walk_anime: bool,
    /// Animate while standing still.
    pub step_anime: bool,
    /// Avatar sprite when the leader's actor has no static data.
    pub default_sprite: SpriteRef,
    /// Tiles between consecutive followers at spawn.
    pub follower_spacing: i32,
    pub supersede_policy: SupersedePolicy,
    /// Longest route, in tiles, played step by step. Longer jumps teleport.
    pub max_route_len: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_move_speed: 4,
            walk_anime: true,
            step_anime: false,
            default_sprite: SpriteRef::new("Actor1", 0),
            follower_spacing: 1,
            supersede_policy: SupersedePolicy::OverwriteFromLive,
            max_route_len: 256,
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        if !(1..=6).contains(&config.remote_move_speed) {
            return Err(SyncError::Config(format!(
                "remote_move_speed must be 1..=6, got {}",
                config.remote_move_speed
            )));
        }
        if config.max_route_len == 0 {
            return Err(SyncError::Config("max_route_len must be positive".into()));
        }
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub relay_addr: String,
    pub player_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:7878".into(),
            player_name: "wayfarer".into(),
        }
    }
}
