//! Deferred task runner.
//!
//! Submits descriptors to a [`SchedulerBackend`], records the returned
//! identifier in the [`IdentifierStore`], and delivers fired work through a
//! [`NotificationRenderer`]. Per-task state lives in a [`TaskLedger`] shared
//! between the foreground (submit/cancel) and the backend's fire callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{NotifyError, Result};
use crate::render::{Notification, NotificationRenderer};
use crate::scheduler::backend::{FireHandler, SchedulerBackend};
use crate::scheduler::store::IdentifierStore;
use crate::scheduler::tasks::{TaskDescriptor, TaskState, WorkId};

/// How long a settled entry stays queryable through [`TaskLedger::state`].
const SETTLED_RETENTION: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: TaskState,
    /// Set once the task can no longer fire: delivered, or cancelled and
    /// confirmed by the backend. Only settled entries are pruned.
    settled_at: Option<Instant>,
}

impl Entry {
    fn new(state: TaskState) -> Self {
        Self {
            state,
            settled_at: None,
        }
    }
}

/// Per-task lifecycle table. Every transition is a check-and-set under one lock.
///
/// A cancelled entry is kept as a tombstone until the backend confirms the
/// cancel and [`SETTLED_RETENTION`] has passed, so a dispatch already in
/// flight still finds it.
#[derive(Default)]
pub struct TaskLedger {
    entries: Mutex<HashMap<WorkId, Entry>>,
}

impl TaskLedger {
    fn entries(&self) -> MutexGuard<'_, HashMap<WorkId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, `None` for ids this process never saw or has pruned.
    pub fn state(&self, work_id: &WorkId) -> Option<TaskState> {
        self.entries().get(work_id).map(|e| e.state)
    }

    /// Track a submitted task unless the backend already fired it.
    fn insert_pending(&self, work_id: WorkId) {
        self.entries()
            .entry(work_id)
            .or_insert(Entry::new(TaskState::Pending));
    }

    /// `Pending → Fired`. Unknown ids (work resumed from a previous
    /// process) count as pending.
    fn begin_fire(&self, work_id: WorkId) -> bool {
        let mut entries = self.entries();
        let entry = entries
            .entry(work_id)
            .or_insert(Entry::new(TaskState::Pending));
        if entry.state == TaskState::Pending {
            entry.state = TaskState::Fired;
            true
        } else {
            false
        }
    }

    /// `Fired → Delivered`. Fails when a cancel landed after `begin_fire`.
    fn commit_delivery(&self, work_id: WorkId) -> bool {
        let mut entries = self.entries();
        match entries.get_mut(&work_id) {
            Some(entry) if entry.state == TaskState::Fired => {
                entry.state = TaskState::Delivered;
                entry.settled_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// `Pending|Fired → Cancelled`; terminal states are left alone.
    /// Returns the state before the call.
    fn cancel(&self, work_id: WorkId) -> Option<TaskState> {
        let mut entries = self.entries();
        let previous = entries.get(&work_id).map(|e| e.state);
        match previous {
            Some(state) if state.is_terminal() => {}
            _ => {
                entries.insert(work_id, Entry::new(TaskState::Cancelled));
            }
        }
        previous
    }

    /// Whether the backend already confirmed this task cannot fire.
    fn is_settled(&self, work_id: &WorkId) -> bool {
        self.entries()
            .get(work_id)
            .is_some_and(|e| e.settled_at.is_some())
    }

    /// Mark a cancelled task as confirmed by the backend.
    fn confirm_cancel(&self, work_id: &WorkId) {
        if let Some(entry) = self.entries().get_mut(work_id) {
            if entry.state == TaskState::Cancelled && entry.settled_at.is_none() {
                entry.settled_at = Some(Instant::now());
            }
        }
    }

    /// Cancel every non-terminal task, plus `recorded` ids this process has
    /// not tracked yet. Returns how many entries changed.
    fn cancel_all(&self, recorded: impl IntoIterator<Item = WorkId>) -> usize {
        let mut entries = self.entries();
        let mut changed = 0;
        for entry in entries.values_mut() {
            if !entry.state.is_terminal() {
                *entry = Entry::new(TaskState::Cancelled);
                changed += 1;
            }
        }
        for work_id in recorded {
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(work_id) {
                slot.insert(Entry::new(TaskState::Cancelled));
                changed += 1;
            }
        }
        changed
    }

    /// Mark every unconfirmed cancel as confirmed.
    fn confirm_cancel_all(&self) {
        let now = Instant::now();
        for entry in self.entries().values_mut() {
            if entry.state == TaskState::Cancelled && entry.settled_at.is_none() {
                entry.settled_at = Some(now);
            }
        }
    }

    /// Forget entries settled more than [`SETTLED_RETENTION`] before `now`.
    /// Returns how many were dropped.
    fn prune_settled_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| match entry.settled_at {
            Some(at) => now.saturating_duration_since(at) < SETTLED_RETENTION,
            None => true,
        });
        before - entries.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Fire callback registered with the backend.
struct Delivery {
    ledger: Arc<TaskLedger>,
    renderer: Arc<dyn NotificationRenderer>,
}

impl FireHandler for Delivery {
    fn on_fire(&self, work_id: WorkId, descriptor: &TaskDescriptor) {
        if !self.ledger.begin_fire(work_id) {
            debug!("work {work_id} is no longer pending; skipping delivery");
            return;
        }

        let notification = Notification::from_descriptor(work_id, descriptor);

        if !self.ledger.commit_delivery(work_id) {
            info!("work {work_id} cancelled while firing; not delivered");
            return;
        }

        match self.renderer.show(&notification) {
            Ok(()) => info!(%work_id, "deferred notification delivered"),
            Err(e) => error!(%work_id, "renderer failed to show notification: {e}"),
        }
    }
}

/// Schedules, tracks and cancels deferred notifications.
pub struct DeferredTaskRunner {
    backend: Arc<dyn SchedulerBackend>,
    store: Arc<dyn IdentifierStore>,
    ledger: Arc<TaskLedger>,
    delivery: Arc<Delivery>,
    triggered: AtomicBool,
    submissions: Mutex<()>,
}

impl DeferredTaskRunner {
    /// Wire the runner and register its delivery callback with `backend`.
    pub fn new(
        backend: Arc<dyn SchedulerBackend>,
        store: Arc<dyn IdentifierStore>,
        renderer: Arc<dyn NotificationRenderer>,
    ) -> Self {
        let ledger = Arc::new(TaskLedger::default());
        let delivery = Arc::new(Delivery {
            ledger: Arc::clone(&ledger),
            renderer,
        });
        backend.register_handler(delivery.clone());

        Self {
            backend,
            store,
            ledger,
            delivery,
            triggered: AtomicBool::new(false),
            submissions: Mutex::new(()),
        }
    }

    /// Schedule `descriptor` and record its identifier.
    ///
    /// A [`NotifyError::Persistence`] here means the backend accepted the
    /// task but the identifier was not recorded: the task will still fire
    /// and cannot be cooled down.
    pub fn submit(&self, descriptor: &TaskDescriptor) -> Result<WorkId> {
        let _guard = self.lock_submissions();
        self.triggered.store(true, Ordering::SeqCst);

        let work_id = self.backend.enqueue(descriptor)?;
        self.ledger.insert_pending(work_id);
        let pruned = self.ledger.prune_settled_at(Instant::now());
        if pruned > 0 {
            debug!("pruned {pruned} settled task entries");
        }
        info!(
            %work_id,
            delay_secs = descriptor.delay_secs(),
            "deferred notification scheduled"
        );

        if let Err(e) = self.store.append(work_id) {
            warn!("work {work_id} is scheduled but was not recorded, so it cannot be cooled down: {e}");
            return Err(match e {
                NotifyError::Persistence(msg) => NotifyError::Persistence(msg),
                other => NotifyError::Persistence(other.to_string()),
            });
        }
        Ok(work_id)
    }

    /// Deliver a fired task. Called by the backend; exposed for hosts that
    /// drive their own scheduler and invoke delivery themselves.
    pub fn on_fire(&self, work_id: WorkId, descriptor: &TaskDescriptor) {
        self.delivery.on_fire(work_id, descriptor);
    }

    /// Stop a task that has not been delivered. Delivered tasks are left as is.
    ///
    /// A cancel the backend failed to confirm is retried on the next call.
    pub fn cancel(&self, work_id: &WorkId) -> Result<()> {
        match self.ledger.cancel(*work_id) {
            Some(TaskState::Delivered) => {
                debug!("work {work_id} already delivered; cancel is a no-op");
                return Ok(());
            }
            Some(TaskState::Cancelled) if self.ledger.is_settled(work_id) => return Ok(()),
            _ => {}
        }
        self.backend.cancel(work_id)?;
        self.ledger.confirm_cancel(work_id);
        info!(%work_id, "deferred notification cancelled");
        Ok(())
    }

    /// Cancel everything this runner's backend owns.
    ///
    /// Ids in the identifier store are marked cancelled too, which covers
    /// work resumed from a previous process that is already mid-dispatch.
    pub fn cancel_all(&self) -> Result<()> {
        let recorded = match self.store.all() {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!("cannot read recorded work before cancel-all: {e}");
                Vec::new()
            }
        };
        let changed = self
            .ledger
            .cancel_all(recorded.into_iter().map(|w| w.work_id));
        self.backend.cancel_all()?;
        self.ledger.confirm_cancel_all();
        info!("cancelled all deferred notifications ({changed} marked)");
        Ok(())
    }

    /// Lifecycle state of a task submitted or fired in this process.
    pub fn state(&self, work_id: &WorkId) -> Option<TaskState> {
        self.ledger.state(work_id)
    }

    /// Whether `submit` has been called since this runner was created.
    pub fn has_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<dyn IdentifierStore> {
        &self.store
    }

    /// Serializes submission against cooldown so an append cannot slip
    /// between a bulk cancel and the store clear.
    pub(crate) fn lock_submissions(&self) -> MutexGuard<'_, ()> {
        self.submissions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
