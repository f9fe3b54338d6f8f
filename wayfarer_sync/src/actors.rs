// Static actor data: which character sprite each actor id is drawn with.
//
// The host ships its actor database as a JSON array indexed by id, with a
// `null` placeholder at index 0 and possibly other `null` holes for deleted
// actors:
//
//     [null, {"id":1,"name":"Reid","characterName":"Actor1","characterIndex":0}, ...]
//
// Only the fields the sync engine needs are read; everything else in each
// entry is ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};
use crate::types::{ActorId, SpriteRef};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorData {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub character_name: String,
    pub character_index: u32,
}

/// Read-only lookup from actor id to static data.
#[derive(Clone, Debug, Default)]
pub struct ActorCatalog {
    actors: BTreeMap<ActorId, ActorData>,
}

impl ActorCatalog {
    pub fn new(actors: impl IntoIterator<Item = ActorData>) -> Self {
        Self {
            actors: actors.into_iter().map(|a| (ActorId(a.id), a)).collect(),
        }
    }

    /// Parse the host's actors JSON array.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let entries: Vec<Option<ActorData>> =
            serde_json::from_str(json).map_err(|e| SyncError::Config(format!("actors: {e}")))?;
        Ok(Self::new(entries.into_iter().flatten()))
    }

    pub fn get(&self, id: ActorId) -> Option<&ActorData> {
        self.actors.get(&id)
    }

    /// Sprite for `id`. An empty character name counts as missing data: the
    /// host would draw nothing.
    pub fn sprite_for(&self, id: ActorId) -> SyncResult<SpriteRef> {
        match self.actors.get(&id) {
            Some(actor) if !actor.character_name.is_empty() => Ok(SpriteRef::new(
                actor.character_name.clone(),
                actor.character_index,
            )),
            _ => Err(SyncError::StaticDataMissing(id)),
        }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
