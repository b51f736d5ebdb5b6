use platelog_core::MirrorEntry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::state::{MirrorState, TombstoneViolation};

/// File name of the mirror inside the data directory.
pub const MIRROR_FILE: &str = "mirror.json";

/// Errors that can occur loading or flushing the mirror file.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse mirror file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode mirror state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The flat mirror store: an in-memory [`MirrorState`] backed by one JSON
/// file, with the recent list held at no more than `limit` entries.
#[derive(Debug)]
pub struct MirrorStore {
    path: PathBuf,
    limit: usize,
    state: MirrorState,
}

impl MirrorStore {
    /// An empty store that will flush to `path`.
    pub fn new(path: PathBuf, limit: usize) -> Self {
        Self {
            path,
            limit,
            state: MirrorState::default(),
        }
    }

    /// Loads the store from `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// an error, since resetting it would forget tombstones.
    pub fn load(path: PathBuf, limit: usize) -> Result<Self, MirrorError> {
        let state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| MirrorError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => MirrorState::default(),
            Err(source) => return Err(MirrorError::Io { path, source }),
        };

        let mut store = Self { path, limit, state };
        store.state.entries.truncate(store.limit);
        Ok(store)
    }

    /// Writes the state to a sibling temp file and renames it over the
    /// mirror file, so readers never observe a partial write.
    pub fn flush(&self) -> Result<(), MirrorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| MirrorError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let bytes = serde_json::to_vec_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, bytes).map_err(|source| MirrorError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| MirrorError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), entries = self.state.entries.len(), "Flushed mirror");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MirrorState {
        &mut self.state
    }

    pub fn entries(&self) -> &[MirrorEntry] {
        &self.state.entries
    }

    /// Replaces any existing entry for the id and puts the new one first.
    pub fn upsert_front(&mut self, entry: MirrorEntry) -> Result<(), TombstoneViolation> {
        self.refuse_tombstoned(entry.id)?;
        self.state.remove(entry.id);
        self.state.entries.insert(0, entry);
        self.state.entries.truncate(self.limit);
        Ok(())
    }

    /// Inserts the entry at the position its `created_at` dictates.
    pub fn insert_ordered(&mut self, entry: MirrorEntry) -> Result<(), TombstoneViolation> {
        self.refuse_tombstoned(entry.id)?;
        self.state.remove(entry.id);
        let at = self
            .state
            .entries
            .iter()
            .position(|e| e.created_at < entry.created_at)
            .unwrap_or(self.state.entries.len());
        self.state.entries.insert(at, entry);
        self.state.entries.truncate(self.limit);
        Ok(())
    }

    /// Rewrites an existing entry without moving it. Falls back to
    /// [`insert_ordered`](Self::insert_ordered) when the id is not listed.
    pub fn replace_in_place(&mut self, entry: MirrorEntry) -> Result<(), TombstoneViolation> {
        self.refuse_tombstoned(entry.id)?;
        match self.state.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                *existing = entry;
                Ok(())
            }
            None => self.insert_ordered(entry),
        }
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        self.state.remove(id)
    }

    /// Replaces the whole list: newest first, one entry per id, capped.
    /// Tombstoned ids are dropped and returned.
    pub fn rebuild(&mut self, mut entries: Vec<MirrorEntry>) -> Vec<Uuid> {
        let mut refused = Vec::new();
        entries.retain(|e| {
            if self.state.is_tombstoned(e.id) {
                refused.push(e.id);
                false
            } else {
                true
            }
        });

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.id));
        entries.truncate(self.limit);

        self.state.entries = entries;
        refused
    }

    fn refuse_tombstoned(&self, id: Uuid) -> Result<(), TombstoneViolation> {
        if self.state.is_tombstoned(id) {
            Err(TombstoneViolation(id))
        } else {
            Ok(())
        }
    }
}
