//! The durable-store contract and an in-memory gateway.

use parking_lot::Mutex;

use crate::errors::{MapError, MapResult};
use crate::snapshot::{Snapshot, VersionToken, VersionedSnapshot};

/// Durable load/save of the whole map as one versioned snapshot.
///
/// Saves have overwrite-whole-document semantics: the stored snapshot is
/// replaced entirely. The caller supplies the version token from its
/// last load or save; a mismatch means another writer got there first
/// and the save fails with [`MapError::VersionConflict`] instead of
/// losing that writer's update.
pub trait PersistenceGateway: Send + Sync {
    /// Loads the current snapshot, or `None` when the store is empty.
    fn load(&self) -> MapResult<Option<VersionedSnapshot>>;

    /// Replaces the stored snapshot, returning the new version token.
    ///
    /// `expected` is `None` only for the very first save into an empty
    /// store.
    fn save(
        &self,
        snapshot: &Snapshot,
        expected: Option<&VersionToken>,
    ) -> MapResult<VersionToken>;
}

/// Checks a caller-supplied token against a store's current numeric
/// revision and hands back the next revision to write.
///
/// Helper for gateway implementations that number their revisions.
pub fn check_revision(
    expected: Option<&VersionToken>,
    current: Option<u64>,
) -> MapResult<u64> {
    let matches = match (expected, current) {
        (None, None) => true,
        (Some(token), Some(rev)) => token.as_str() == rev.to_string(),
        _ => false,
    };
    if !matches {
        return Err(MapError::VersionConflict {
            expected: expected.map_or_else(|| "none".to_string(), |t| t.to_string()),
            actual: current.map_or_else(|| "none".to_string(), |rev| rev.to_string()),
        });
    }
    Ok(current.map_or(1, |rev| rev + 1))
}

/// Gateway keeping the snapshot in process memory.
///
/// Useful for tests and ephemeral deployments; nothing survives the
/// process. Revisions still follow the compare-and-swap contract so
/// callers exercise the same code paths as against a real store.
#[derive(Default)]
pub struct MemoryGateway {
    slot: Mutex<Option<(Snapshot, u64)>>,
}

impl MemoryGateway {
    pub fn new() -> MemoryGateway {
        MemoryGateway::default()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load(&self) -> MapResult<Option<VersionedSnapshot>> {
        let slot = self.slot.lock();
        Ok(slot.as_ref().map(|(snapshot, rev)| VersionedSnapshot {
            snapshot: snapshot.clone(),
            version: VersionToken::new(rev.to_string()),
        }))
    }

    fn save(
        &self,
        snapshot: &Snapshot,
        expected: Option<&VersionToken>,
    ) -> MapResult<VersionToken> {
        let mut slot = self.slot.lock();
        let current = slot.as_ref().map(|(_, rev)| *rev);
        let next = check_revision(expected, current)?;
        *slot = Some((snapshot.clone(), next));
        Ok(VersionToken::new(next.to_string()))
    }
}
