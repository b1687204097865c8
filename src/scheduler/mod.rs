//! Deferred notification scheduling.
//!
//! [`trigger`] validates requests into descriptors, [`runner`] submits and
//! delivers them through a [`backend`], [`store`] remembers what was
//! submitted and [`cooldown`] cancels it again.

pub mod authority;
pub mod backend;
pub mod cooldown;
pub mod runner;
pub mod store;
pub mod tasks;
pub mod trigger;

pub use backend::{FireHandler, LocalWorkQueue, SchedulerBackend};
pub use cooldown::CooldownController;
pub use runner::DeferredTaskRunner;
pub use store::{IdentifierStore, JsonFileStore, MemoryStore, StoredWork};
pub use tasks::{
    ChannelConfig, Importance, NotificationType, ResumeKind, TaskDescriptor, TaskState, WorkId,
};
pub use trigger::{ChannelSettings, TriggerBuilder, TriggerDefaults};
