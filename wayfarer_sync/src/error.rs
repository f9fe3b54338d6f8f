// Error kinds for the sync engine.
//
// None of these are fatal: the session logs them and drops the one update or
// entity they concern, then keeps processing later messages. There is no
// retry; a failure is terminal for that single message.

use thiserror::Error;

use crate::types::{ActorId, EntityHandle, Identity};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Update for an identity the registry has not seen (yet).
    #[error("no remote player registered for {0}")]
    EntityNotFound(Identity),
    /// The host no longer knows this entity.
    #[error("host has no entity {0}")]
    UnknownHandle(EntityHandle),
    /// Actor id with no static sprite data.
    #[error("no static data for {0}")]
    StaticDataMissing(ActorId),
    /// Publish attempted before the relay connection was established.
    #[error("relay transport is not connected")]
    TransportUnavailable,
    /// A host precondition failed (e.g. no active map scene).
    #[error("host capability unavailable: {0}")]
    HostCapabilityUnavailable(String),
    /// Attempt to materialize our own connection as a remote player.
    #[error("refusing to create an entity for the local identity")]
    SelfIdentity,
    /// Malformed configuration or static data.
    #[error("invalid configuration: {0}")]
    Config(String),
}
