//! # Scenemap File Adapter - file-backed map persistence
//!
//! A [`PersistenceGateway`] that stores the whole asset map as a single
//! JSON document on the local filesystem, wrapped in an envelope carrying
//! a monotonically increasing revision. Saves follow the gateway's
//! compare-and-swap contract: a caller writing with a stale revision
//! token gets a version conflict instead of clobbering another writer's
//! update.
//!
//! Writes go to a sibling temp file first and are renamed into place
//! after an fsync, so a crash mid-save leaves either the old document or
//! the new one, never a torn file.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scenemap::{AssetMap, MapConfig};
//! use scenemap_file_adapter::FileGateway;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(FileGateway::new("/var/lib/scenemap/map.json"));
//! let map = AssetMap::open_or_create(MapConfig::new(), gateway)?;
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::PathBuf;

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use scenemap::{
    check_revision, MapError, MapResult, PersistenceGateway, Snapshot, VersionToken,
    VersionedSnapshot,
};

/// On-disk envelope: the snapshot plus its revision.
#[derive(Serialize, Deserialize)]
struct MapDocument {
    rev: u64,
    snapshot: Snapshot,
}

/// A [`PersistenceGateway`] storing the map as one JSON document.
pub struct FileGateway {
    path: PathBuf,
    /// Serializes the read-check-write cycle of `save` within this
    /// process; cross-process writers are caught by the revision check.
    lock: Mutex<()>,
}

impl FileGateway {
    /// Creates a gateway backed by the document at `path`. The file is
    /// created on the first save.
    pub fn new(path: impl Into<PathBuf>) -> FileGateway {
        FileGateway {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_document(&self) -> MapResult<Option<MapDocument>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(MapError::Io(err)),
        };
        let document = serde_json::from_slice(&bytes).map_err(|err| {
            MapError::CorruptSnapshot(format!(
                "undecodable map document at {}: {err}",
                self.path.display()
            ))
        })?;
        Ok(Some(document))
    }

    fn write_document(&self, document: &MapDocument) -> MapResult<()> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|err| MapError::Persistence(format!("failed to encode map document: {err}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PersistenceGateway for FileGateway {
    fn load(&self) -> MapResult<Option<VersionedSnapshot>> {
        let _guard = self.lock.lock();
        Ok(self.read_document()?.map(|document| VersionedSnapshot {
            snapshot: document.snapshot,
            version: VersionToken::new(document.rev.to_string()),
        }))
    }

    fn save(
        &self,
        snapshot: &Snapshot,
        expected: Option<&VersionToken>,
    ) -> MapResult<VersionToken> {
        let _guard = self.lock.lock();
        let current = self.read_document()?.map(|document| document.rev);
        let next = check_revision(expected, current)?;

        self.write_document(&MapDocument {
            rev: next,
            snapshot: snapshot.clone(),
        })?;
        debug!("saved map document rev {} to {}", next, self.path.display());
        Ok(VersionToken::new(next.to_string()))
    }
}
