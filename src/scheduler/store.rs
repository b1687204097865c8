//! Identifier store.
//!
//! Ordered, durable record of the work identifiers this process submitted.
//! Insertion order defines "latest" for cooldown: the first entry is the
//! oldest recorded submission. Entries are removed only by cooldown; a task
//! that fires naturally keeps its entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{NotifyError, Result};
use crate::scheduler::tasks::WorkId;

/// One recorded submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredWork {
    pub work_id: WorkId,
    pub recorded_at: DateTime<Utc>,
}

impl StoredWork {
    fn now(work_id: WorkId) -> Self {
        Self {
            work_id,
            recorded_at: Utc::now(),
        }
    }
}

/// Durable ordered sequence of work identifiers.
///
/// Implementations serialize every read-modify-write so a concurrent
/// append and clear never lose an update.
pub trait IdentifierStore: Send + Sync {
    /// Append an identifier at the end.
    fn append(&self, work_id: WorkId) -> Result<()>;

    /// Oldest recorded identifier, if any.
    fn first(&self) -> Result<Option<WorkId>>;

    /// Remove an identifier. Returns `true` when it was present.
    fn remove(&self, work_id: &WorkId) -> Result<bool>;

    /// Remove everything. Returns how many entries were dropped.
    fn clear(&self) -> Result<usize>;

    /// All entries in insertion order.
    fn all(&self) -> Result<Vec<StoredWork>>;
}

/// Persisted layout of [`JsonFileStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default = "default_store_version")]
    version: u8,
    #[serde(default)]
    work: Vec<StoredWork>,
}

fn default_store_version() -> u8 {
    1
}

/// File-backed store. The file is created on first append and rewritten
/// atomically (temp file + rename) on every change.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_state<R>(&self, mutate: impl FnOnce(&mut StoreState) -> (R, bool)) -> Result<R> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| NotifyError::Persistence("identifier store lock poisoned".to_owned()))?;
        let mut state = read_state(&self.path)?;
        let (out, dirty) = mutate(&mut state);
        if dirty {
            state.version = default_store_version();
            write_state(&self.path, &state)?;
        }
        Ok(out)
    }
}

impl IdentifierStore for JsonFileStore {
    fn append(&self, work_id: WorkId) -> Result<()> {
        self.with_state(|state| {
            state.work.push(StoredWork::now(work_id));
            ((), true)
        })?;
        debug!("recorded work id {work_id} in {}", self.path.display());
        Ok(())
    }

    fn first(&self) -> Result<Option<WorkId>> {
        self.with_state(|state| (state.work.first().map(|w| w.work_id), false))
    }

    fn remove(&self, work_id: &WorkId) -> Result<bool> {
        self.with_state(|state| {
            let before = state.work.len();
            state.work.retain(|w| w.work_id != *work_id);
            let removed = state.work.len() != before;
            (removed, removed)
        })
    }

    fn clear(&self) -> Result<usize> {
        self.with_state(|state| {
            let count = state.work.len();
            state.work.clear();
            (count, count > 0)
        })
    }

    fn all(&self) -> Result<Vec<StoredWork>> {
        self.with_state(|state| (state.work.clone(), false))
    }
}

fn read_state(path: &Path) -> Result<StoreState> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreState::default()),
        Err(e) => {
            return Err(NotifyError::Persistence(format!(
                "cannot read identifier store {}: {e}",
                path.display()
            )));
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("identifier store at {} is corrupt: {e}", path.display());
        NotifyError::Persistence(format!("cannot parse identifier store: {e}"))
    })
}

fn write_state(path: &Path, state: &StoreState) -> Result<()> {
    let json = serde_json::to_vec_pretty(state)
        .map_err(|e| NotifyError::Persistence(format!("cannot serialize identifier store: {e}")))?;
    write_atomic(path, &json)
}

/// Write `bytes` to `path` through a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            NotifyError::Persistence(format!("cannot create state dir {}: {e}", parent.display()))
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes).map_err(|e| {
        NotifyError::Persistence(format!("cannot write {}: {e}", tmp_path.display()))
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        NotifyError::Persistence(format!("cannot finalize {}: {e}", path.display()))
    })?;
    Ok(())
}

/// Volatile store for hosts that do not need durability, and for tests.
#[derive(Default)]
pub struct MemoryStore {
    work: Mutex<Vec<StoredWork>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredWork>>> {
        self.work
            .lock()
            .map_err(|_| NotifyError::Persistence("identifier store lock poisoned".to_owned()))
    }
}

impl IdentifierStore for MemoryStore {
    fn append(&self, work_id: WorkId) -> Result<()> {
        self.guard()?.push(StoredWork::now(work_id));
        Ok(())
    }

    fn first(&self) -> Result<Option<WorkId>> {
        Ok(self.guard()?.first().map(|w| w.work_id))
    }

    fn remove(&self, work_id: &WorkId) -> Result<bool> {
        let mut work = self.guard()?;
        let before = work.len();
        work.retain(|w| w.work_id != *work_id);
        Ok(work.len() != before)
    }

    fn clear(&self) -> Result<usize> {
        let mut work = self.guard()?;
        let count = work.len();
        work.clear();
        Ok(count)
    }

    fn all(&self) -> Result<Vec<StoredWork>> {
        Ok(self.guard()?.clone())
    }
}
