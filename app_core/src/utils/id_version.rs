//! Identifier + optimistic-locking version pairing.
//!
//! Every aggregate that participates in the optimistic-concurrency
//! contract of `Repository::Update` (tournaments, ...) carries one of
//! these instead of a bare `Uuid`, so "not yet persisted" and
//! "persisted at version N" can never be confused.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an aggregate for storage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdVersion {
    /// Not yet persisted; a fresh id and version 0 are assigned on insert.
    New,
    /// Persisted aggregate at a known version. `Update` must match this
    /// version exactly or fail with `OptimisticLockConflict`.
    Existing { id: Uuid, version: u32 },
}

impl Default for IdVersion {
    fn default() -> Self {
        IdVersion::New
    }
}

impl IdVersion {
    pub fn existing(id: Uuid, version: u32) -> Self {
        IdVersion::Existing { id, version }
    }

    pub fn get_id(&self) -> Option<Uuid> {
        match self {
            IdVersion::New => None,
            IdVersion::Existing { id, .. } => Some(*id),
        }
    }

    pub fn get_version(&self) -> Option<u32> {
        match self {
            IdVersion::New => None,
            IdVersion::Existing { version, .. } => Some(*version),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, IdVersion::New)
    }

    /// The version the *next* successful update is expected to produce.
    pub fn next_version(&self) -> u32 {
        match self {
            IdVersion::New => 0,
            IdVersion::Existing { version, .. } => version + 1,
        }
    }
}
