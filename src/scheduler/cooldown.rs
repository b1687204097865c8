//! Cooldown: cancel previously triggered notifications.
//!
//! "Latest" is the oldest identifier still recorded in the store (FIFO on
//! submission order), which may belong to a task that has already fired.
//! Backend cancels are best-effort; store updates are not.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, Result};
use crate::scheduler::runner::DeferredTaskRunner;
use crate::scheduler::tasks::WorkId;

pub struct CooldownController {
    runner: Arc<DeferredTaskRunner>,
}

impl CooldownController {
    #[must_use]
    pub fn new(runner: Arc<DeferredTaskRunner>) -> Self {
        Self { runner }
    }

    /// Cancel and forget the oldest recorded identifier.
    ///
    /// Returns the identifier that was removed, or `None` when the store is
    /// empty.
    ///
    /// # Errors
    ///
    /// [`NotifyError::NotTriggered`] if nothing was submitted in this
    /// process; [`NotifyError::Persistence`] if the store cannot be updated.
    pub fn cool_down_latest(&self) -> Result<Option<WorkId>> {
        self.ensure_triggered()?;
        let _guard = self.runner.lock_submissions();
        let store = self.runner.store();

        let Some(work_id) = store.first()? else {
            debug!("cool down latest: no recorded work");
            return Ok(None);
        };

        if let Err(e) = self.runner.cancel(&work_id) {
            warn!("backend cancel failed for {work_id}, forgetting it anyway: {e}");
        }
        store.remove(&work_id)?;
        info!(%work_id, "cooled down latest notification");
        Ok(Some(work_id))
    }

    /// Cancel everything and clear the store.
    ///
    /// Returns how many recorded identifiers were cleared. The store is
    /// cleared even when the backend cancel fails.
    ///
    /// # Errors
    ///
    /// [`NotifyError::NotTriggered`] if nothing was submitted in this
    /// process; [`NotifyError::Persistence`] if the store cannot be cleared.
    pub fn cool_down_all(&self) -> Result<usize> {
        self.ensure_triggered()?;
        let _guard = self.runner.lock_submissions();

        if let Err(e) = self.runner.cancel_all() {
            warn!("backend cancel-all failed, clearing recorded work anyway: {e}");
        }
        let cleared = self.runner.store().clear()?;
        info!("cooled down all notifications ({cleared} recorded)");
        Ok(cleared)
    }

    fn ensure_triggered(&self) -> Result<()> {
        if self.runner.has_triggered() {
            Ok(())
        } else {
            Err(NotifyError::NotTriggered)
        }
    }
}
