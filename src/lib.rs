//! Deferred local notifications.
//!
//! A host builds a request with [`TriggerBuilder`], submits it through a
//! [`NotifyService`], and the notification is shown after the requested delay
//! unless it is cooled down first.
//!
//! # Architecture
//!
//! - **Trigger builder**: validates a request into an immutable [`TaskDescriptor`]
//! - **Payload codec**: turns an optional structured payload into a string and back
//! - **Runner**: hands descriptors to a [`SchedulerBackend`] and delivers fired work
//! - **Identifier store**: remembers submitted work ids for later cancellation
//! - **Cooldown**: cancels the oldest recorded id, or everything
//!
//! [`LocalWorkQueue`] is the bundled backend: a JSON work queue armed with
//! tokio timers, resumed on the next start and deduplicated through a fire
//! ledger so each task is delivered at most once.

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify_dirs;
pub mod render;
pub mod scheduler;
pub mod service;

pub use config::NotifyConfig;
pub use error::{NotifyError, Result};
pub use render::{Notification, NotificationRenderer, ResumeIntent};
pub use scheduler::{
    CooldownController, DeferredTaskRunner, LocalWorkQueue, ResumeKind, SchedulerBackend,
    TaskDescriptor, TaskState, TriggerBuilder, WorkId,
};
pub use service::NotifyService;
