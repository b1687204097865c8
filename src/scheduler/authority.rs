//! At-most-once dispatch ledger.
//!
//! Every work item the queue hands to the delivery path is first recorded
//! here. The ledger is a JSONL file shared by every process that points at
//! the same state directory, so a work item observed twice (two processes
//! resuming one queue file, or a crash between dispatch and the queue
//! rewrite) is delivered once. [`FireLedger::compact`] keeps the file
//! bounded: records survive while their work is still queued or for
//! [`FIRE_RECORD_RETENTION`] after firing.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::warn;

use crate::error::{NotifyError, Result};
use crate::scheduler::store::write_atomic;
use crate::scheduler::tasks::WorkId;

const LOCK_TIMEOUT: Duration = Duration::from_millis(1500);
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// How long a fire record outlives its work item's queue entry.
pub const FIRE_RECORD_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FireRecord {
    work_id: WorkId,
    fired_at_ms: u64,
}

/// File-backed record of dispatched work identifiers.
///
/// Holds no cache: every call reads the file under the lock, so handles in
/// different threads or processes always agree.
#[derive(Debug, Clone)]
pub struct FireLedger {
    path: PathBuf,
}

impl FireLedger {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a dispatch once. Returns `true` when newly inserted, `false`
    /// when some process already dispatched this work item.
    pub fn record_once(&self, work_id: &WorkId) -> Result<bool> {
        let _lock = LockFile::acquire(self.lock_path())?;
        if self.load()?.contains_key(work_id) {
            return Ok(false);
        }
        self.append(&FireRecord {
            work_id: *work_id,
            fired_at_ms: now_epoch_millis(),
        })?;
        Ok(true)
    }

    /// Whether a work item was already dispatched.
    pub fn contains(&self, work_id: &WorkId) -> Result<bool> {
        Ok(self.load()?.contains_key(work_id))
    }

    /// Drop records whose work is not in `queued` and that fired more than
    /// `retention` ago. Returns how many records were removed.
    pub fn compact(&self, queued: &HashSet<WorkId>, retention: Duration) -> Result<usize> {
        self.compact_at(queued, retention, now_epoch_millis())
    }

    pub(crate) fn compact_at(
        &self,
        queued: &HashSet<WorkId>,
        retention: Duration,
        now_ms: u64,
    ) -> Result<usize> {
        let _lock = LockFile::acquire(self.lock_path())?;
        let records = self.load()?;
        let cutoff = now_ms.saturating_sub(u64::try_from(retention.as_millis()).unwrap_or(u64::MAX));

        let total = records.len();
        let mut kept: Vec<FireRecord> = records
            .into_values()
            .filter(|r| queued.contains(&r.work_id) || r.fired_at_ms >= cutoff)
            .collect();
        let removed = total - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        kept.sort_by_key(|r| r.fired_at_ms);
        let mut body = String::new();
        for record in &kept {
            body.push_str(&encode_record(record)?);
            body.push('\n');
        }
        write_atomic(&self.path, body.as_bytes())?;
        Ok(removed)
    }

    fn load(&self) -> Result<HashMap<WorkId, FireRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(NotifyError::Persistence(format!(
                    "cannot read fire ledger: {e}"
                )));
            }
        };

        let mut records = HashMap::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<FireRecord>(line) {
                Ok(record) => {
                    records.entry(record.work_id).or_insert(record);
                }
                Err(e) => warn!(
                    "ignoring malformed fire ledger line in {}: {e}",
                    self.path.display()
                ),
            }
        }
        Ok(records)
    }

    fn append(&self, record: &FireRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NotifyError::Persistence(format!("cannot create fire ledger directory: {e}"))
            })?;
        }
        let line = encode_record(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| NotifyError::Persistence(format!("cannot open fire ledger: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| NotifyError::Persistence(format!("cannot append fire record: {e}")))
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }
}

fn encode_record(record: &FireRecord) -> Result<String> {
    serde_json::to_string(record)
        .map_err(|e| NotifyError::Persistence(format!("cannot encode fire record: {e}")))
}

/// Exclusive lock held as a `create_new` file, removed on drop. A lock
/// older than [`STALE_LOCK_AGE`] belongs to a dead holder and is evicted.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NotifyError::Persistence(format!("cannot create fire ledger lock directory: {e}"))
            })?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = file.write_all(now_epoch_millis().to_string().as_bytes());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_age(&path).is_some_and(|age| age > STALE_LOCK_AGE) {
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() > LOCK_TIMEOUT {
                        return Err(NotifyError::Persistence(format!(
                            "timed out waiting for fire ledger lock {}",
                            path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(e) => {
                    return Err(NotifyError::Persistence(format!(
                        "cannot create fire ledger lock {}: {e}",
                        path.display()
                    )));
                }
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Current epoch time in milliseconds.
#[must_use]
pub fn now_epoch_millis() -> u64 {
    match SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
