//! Scheduler backend: the delayed-execution facility behind the runner.
//!
//! [`SchedulerBackend`] is the seam the runner talks to. [`LocalWorkQueue`]
//! is the in-crate implementation: pending work is persisted to a JSON file
//! and armed as tokio timers, so work survives a restart once the next
//! process calls [`LocalWorkQueue::resume`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{NotifyError, Result};
use crate::notify_dirs;
use crate::scheduler::authority::{FIRE_RECORD_RETENTION, FireLedger, now_epoch_millis};
use crate::scheduler::store::write_atomic;
use crate::scheduler::tasks::{TaskDescriptor, WorkId};

/// Callback invoked by a backend when a task's delay has elapsed.
///
/// Called on a runtime worker with no guarantee about which thread; the
/// handler must tolerate racing with foreground cancels.
pub trait FireHandler: Send + Sync {
    fn on_fire(&self, work_id: WorkId, descriptor: &TaskDescriptor);
}

/// Delayed single-shot execution with cancel-by-id and cancel-all.
pub trait SchedulerBackend: Send + Sync {
    /// Install the callback that receives fired work.
    fn register_handler(&self, handler: Arc<dyn FireHandler>);

    /// Accept a descriptor and fire it once after at least `delay_secs`.
    fn enqueue(&self, descriptor: &TaskDescriptor) -> Result<WorkId>;

    /// Drop a task if it has not fired. Unknown ids are a no-op.
    fn cancel(&self, work_id: &WorkId) -> Result<()>;

    /// Drop every task this backend owns.
    fn cancel_all(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueuedWork {
    work_id: WorkId,
    due_at_ms: u64,
    descriptor: TaskDescriptor,
}

/// Persisted layout of the queue file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    #[serde(default = "default_queue_version")]
    version: u8,
    #[serde(default)]
    work: Vec<QueuedWork>,
}

fn default_queue_version() -> u8 {
    1
}

#[derive(Default)]
struct QueueState {
    pending: Vec<QueuedWork>,
    timers: HashMap<WorkId, JoinHandle<()>>,
}

struct QueueInner {
    path: Option<PathBuf>,
    runtime: Handle,
    state: Mutex<QueueState>,
    ledger: Option<FireLedger>,
    handler: RwLock<Option<Arc<dyn FireHandler>>>,
}

/// Tokio-timer backend with optional on-disk persistence.
pub struct LocalWorkQueue {
    inner: Arc<QueueInner>,
}

impl LocalWorkQueue {
    /// Durable queue storing its work and fire ledger under `state_dir`.
    #[must_use]
    pub fn open(state_dir: &Path, runtime: Handle) -> Self {
        Self::build(
            Some(notify_dirs::work_queue_file(state_dir)),
            Some(FireLedger::new(notify_dirs::fire_ledger_file(state_dir))),
            runtime,
        )
    }

    /// Queue that keeps pending work in memory only.
    #[must_use]
    pub fn volatile(runtime: Handle) -> Self {
        Self::build(None, None, runtime)
    }

    fn build(path: Option<PathBuf>, ledger: Option<FireLedger>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                path,
                runtime,
                state: Mutex::new(QueueState::default()),
                ledger,
                handler: RwLock::new(None),
            }),
        }
    }

    /// Re-arm work persisted by a previous process. Register the handler
    /// first; returns how many tasks were armed.
    ///
    /// Also compacts the fire ledger down to records for work still in the
    /// queue file plus recent dispatches.
    pub fn resume(&self) -> Result<usize> {
        let Some(path) = self.inner.path.as_deref() else {
            return Ok(0);
        };
        let persisted = read_queue(path)?;
        let queued: HashSet<WorkId> = persisted.work.iter().map(|w| w.work_id).collect();

        let mut state = self.inner.lock_state()?;
        let mut armed = 0;
        for work in persisted.work {
            if state.pending.iter().any(|w| w.work_id == work.work_id) {
                continue;
            }
            if self.inner.already_fired(&work.work_id) {
                debug!("dropping work {} already dispatched before restart", work.work_id);
                continue;
            }
            self.inner.arm(&mut state, &work);
            state.pending.push(work);
            armed += 1;
        }
        self.inner.persist(&state.pending)?;
        drop(state);

        if let Some(ledger) = &self.inner.ledger {
            match ledger.compact(&queued, FIRE_RECORD_RETENTION) {
                Ok(0) => {}
                Ok(removed) => debug!("compacted {removed} expired fire records"),
                Err(e) => warn!("cannot compact fire ledger: {e}"),
            }
        }

        if armed > 0 {
            info!("resumed {armed} pending deferred notifications");
        }
        Ok(armed)
    }

    /// Identifiers still waiting for their delay, in enqueue order.
    pub fn pending(&self) -> Vec<WorkId> {
        match self.inner.lock_state() {
            Ok(state) => state.pending.iter().map(|w| w.work_id).collect(),
            Err(e) => {
                warn!("cannot inspect work queue: {e}");
                Vec::new()
            }
        }
    }

    /// Stop every timer but keep persisted work for the next [`resume`](Self::resume).
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.inner.lock_state() {
            for (_, timer) in state.timers.drain() {
                timer.abort();
            }
            state.pending.clear();
        }
    }
}

impl SchedulerBackend for LocalWorkQueue {
    fn register_handler(&self, handler: Arc<dyn FireHandler>) {
        match self.inner.handler.write() {
            Ok(mut slot) => *slot = Some(handler),
            Err(poisoned) => *poisoned.into_inner() = Some(handler),
        }
    }

    fn enqueue(&self, descriptor: &TaskDescriptor) -> Result<WorkId> {
        let work = QueuedWork {
            work_id: WorkId::new(),
            due_at_ms: now_epoch_millis()
                .saturating_add(descriptor.delay_secs().saturating_mul(1000)),
            descriptor: descriptor.clone(),
        };

        let mut state = self.inner.lock_state()?;
        state.pending.push(work.clone());
        if let Err(e) = self.inner.persist(&state.pending) {
            state.pending.retain(|w| w.work_id != work.work_id);
            return Err(NotifyError::Backend(format!("work queue rejected task: {e}")));
        }
        self.inner.arm(&mut state, &work);

        debug!(
            "enqueued work {} firing in {}s",
            work.work_id,
            descriptor.delay_secs()
        );
        Ok(work.work_id)
    }

    fn cancel(&self, work_id: &WorkId) -> Result<()> {
        let mut state = self.inner.lock_state()?;
        if let Some(timer) = state.timers.remove(work_id) {
            timer.abort();
        }
        let before = state.pending.len();
        state.pending.retain(|w| w.work_id != *work_id);
        if state.pending.len() != before {
            self.inner.persist(&state.pending)?;
            debug!("work {work_id} removed from queue");
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        let mut state = self.inner.lock_state()?;
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        let dropped = state.pending.len();
        state.pending.clear();
        self.inner.persist(&state.pending)?;
        debug!("cleared {dropped} queued work items");
        Ok(())
    }
}

impl QueueInner {
    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| NotifyError::Backend("work queue lock poisoned".to_owned()))
    }

    /// Spawn the timer while the state lock is held so a zero-delay task
    /// cannot dispatch before its handle is registered.
    fn arm(self: &Arc<Self>, state: &mut QueueState, work: &QueuedWork) {
        let remaining = work.due_at_ms.saturating_sub(now_epoch_millis());
        let inner = Arc::clone(self);
        let work_id = work.work_id;
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(remaining)).await;
            inner.dispatch(work_id);
        });
        state.timers.insert(work_id, timer);
    }

    fn dispatch(&self, work_id: WorkId) {
        let work = {
            let mut state = match self.lock_state() {
                Ok(state) => state,
                Err(e) => {
                    error!("cannot dispatch work {work_id}: {e}");
                    return;
                }
            };
            state.timers.remove(&work_id);
            let Some(pos) = state.pending.iter().position(|w| w.work_id == work_id) else {
                debug!("work {work_id} cancelled before dispatch");
                return;
            };
            let work = state.pending.remove(pos);
            if let Err(e) = self.persist(&state.pending) {
                warn!("cannot persist queue after dispatching {work_id}: {e}");
            }
            work
        };

        if let Some(ledger) = &self.ledger {
            match ledger.record_once(&work_id) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("suppressing duplicate dispatch of work {work_id}");
                    return;
                }
                Err(e) => warn!("fire ledger check failed for {work_id}, continuing: {e}"),
            }
        }

        let handler = match self.handler.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match handler {
            Some(handler) => handler.on_fire(work_id, &work.descriptor),
            None => warn!("no fire handler registered; dropping work {work_id}"),
        }
    }

    fn already_fired(&self, work_id: &WorkId) -> bool {
        let Some(ledger) = &self.ledger else {
            return false;
        };
        ledger.contains(work_id).unwrap_or_else(|e| {
            warn!("fire ledger unreadable while resuming {work_id}: {e}");
            false
        })
    }

    fn persist(&self, pending: &[QueuedWork]) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let file = QueueFile {
            version: default_queue_version(),
            work: pending.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| NotifyError::Persistence(format!("cannot serialize work queue: {e}")))?;
        write_atomic(path, &json)
    }
}

fn read_queue(path: &Path) -> Result<QueueFile> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(QueueFile::default()),
        Err(e) => {
            return Err(NotifyError::Persistence(format!(
                "cannot read work queue {}: {e}",
                path.display()
            )));
        }
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| NotifyError::Persistence(format!("cannot parse work queue: {e}")))
}
