//! Per-process notification service.
//!
//! [`NotifyService`] owns one runner and one cooldown controller. Create it
//! once at startup and pass it by reference; collaborators are injected
//! through [`NotifyService::new`] or built from config by
//! [`NotifyService::open`].

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::notify_dirs;
use crate::render::NotificationRenderer;
use crate::scheduler::{
    CooldownController, DeferredTaskRunner, IdentifierStore, JsonFileStore, LocalWorkQueue,
    SchedulerBackend, StoredWork, TaskDescriptor, TaskState, TriggerBuilder, TriggerDefaults,
    WorkId,
};

pub struct NotifyService {
    defaults: TriggerDefaults,
    runner: Arc<DeferredTaskRunner>,
    cooldown: CooldownController,
    queue: Option<Arc<LocalWorkQueue>>,
}

impl NotifyService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        config: &NotifyConfig,
        backend: Arc<dyn SchedulerBackend>,
        store: Arc<dyn IdentifierStore>,
        renderer: Arc<dyn NotificationRenderer>,
    ) -> Self {
        let runner = Arc::new(DeferredTaskRunner::new(backend, store, renderer));
        Self {
            defaults: TriggerDefaults::from(config),
            cooldown: CooldownController::new(Arc::clone(&runner)),
            runner,
            queue: None,
        }
    }

    /// Durable service backed by files in the configured state directory.
    ///
    /// Must be called from within a tokio runtime. Work left pending by a
    /// previous process is re-armed before this returns.
    pub fn open(config: &NotifyConfig, renderer: Arc<dyn NotificationRenderer>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| NotifyError::Backend(format!("no tokio runtime available: {e}")))?;
        let state_dir = config.scheduler.resolved_state_dir();

        let queue = Arc::new(LocalWorkQueue::open(&state_dir, runtime));
        let store = Arc::new(JsonFileStore::new(notify_dirs::work_ids_file(&state_dir)));

        let mut service = Self::new(config, queue.clone(), store, renderer);
        let resumed = queue.resume()?;
        info!(
            "notification service ready at {} ({resumed} resumed)",
            state_dir.display()
        );
        service.queue = Some(queue);
        Ok(service)
    }

    /// Build `request` with the configured defaults and submit it.
    pub fn trigger(&self, request: TriggerBuilder) -> Result<WorkId> {
        let descriptor = request.build_with(&self.defaults)?;
        self.runner.submit(&descriptor)
    }

    /// Submit an already-built descriptor.
    pub fn submit(&self, descriptor: &TaskDescriptor) -> Result<WorkId> {
        self.runner.submit(descriptor)
    }

    /// See [`CooldownController::cool_down_latest`].
    pub fn cool_down_latest(&self) -> Result<Option<WorkId>> {
        self.cooldown.cool_down_latest()
    }

    /// See [`CooldownController::cool_down_all`].
    pub fn cool_down_all(&self) -> Result<usize> {
        self.cooldown.cool_down_all()
    }

    /// Identifiers currently recorded for cooldown, oldest first.
    pub fn recorded_work(&self) -> Result<Vec<StoredWork>> {
        self.runner.store().all()
    }

    /// Identifiers still waiting in the local queue, if this service owns one.
    pub fn pending_work(&self) -> Vec<WorkId> {
        self.queue
            .as_ref()
            .map(|queue| queue.pending())
            .unwrap_or_default()
    }

    pub fn state(&self, work_id: &WorkId) -> Option<TaskState> {
        self.runner.state(work_id)
    }

    pub fn runner(&self) -> &Arc<DeferredTaskRunner> {
        &self.runner
    }

    pub fn defaults(&self) -> &TriggerDefaults {
        &self.defaults
    }

    /// Stop local timers. Pending work stays on disk for the next `open`.
    pub fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.shutdown();
        }
    }
}
