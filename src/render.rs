//! Notification rendering contract.
//!
//! Rendering is owned by the host platform. The scheduler builds a
//! [`Notification`] when a task fires and hands it to a
//! [`NotificationRenderer`]. When the user taps it, the host receives the
//! [`ResumeIntent`] back and decides how to present the payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::codec;
use crate::error::{NotifyError, Result};
use crate::scheduler::tasks::{
    ChannelConfig, NotificationType, ResumeKind, TaskDescriptor, WorkId,
};

/// What the host gets back when a delivered notification is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeIntent {
    /// Destination identifier given at trigger time.
    pub resume_target: String,
    /// `true` to resume into a sub-target, `false` for the main target.
    pub fragment_target: bool,
    /// Serialized caller payload, untouched by the scheduler.
    pub payload: Option<String>,
}

impl ResumeIntent {
    /// Rebuild the caller's record. `Ok(None)` when no payload was attached.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.payload.as_deref().map(codec::decode).transpose()
    }
}

/// A fully built notification ready to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub work_id: WorkId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub notification_type: NotificationType,
    pub channel: ChannelConfig,
    pub tap: ResumeIntent,
}

impl Notification {
    /// Build the notification for a fired task.
    #[must_use]
    pub fn from_descriptor(work_id: WorkId, descriptor: &TaskDescriptor) -> Self {
        Self {
            work_id,
            title: descriptor.title().map(str::to_owned),
            description: descriptor.description().map(str::to_owned),
            thumbnail: descriptor.thumbnail().map(str::to_owned),
            notification_type: descriptor.notification_type(),
            channel: descriptor.channel().clone(),
            tap: ResumeIntent {
                resume_target: descriptor.resume_target().to_owned(),
                fragment_target: descriptor.resume_kind() == ResumeKind::Fragment,
                payload: descriptor.payload().map(str::to_owned),
            },
        }
    }
}

/// Displays notifications on the host platform.
pub trait NotificationRenderer: Send + Sync {
    fn show(&self, notification: &Notification) -> Result<()>;
}

/// Renderer that only logs. Useful for headless hosts and the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl NotificationRenderer for LogRenderer {
    fn show(&self, notification: &Notification) -> Result<()> {
        info!(
            work_id = %notification.work_id,
            channel = %notification.channel.channel_id,
            importance = notification.channel.importance.level(),
            target = %notification.tap.resume_target,
            fragment = notification.tap.fragment_target,
            "notification: {} | {}",
            notification.title.as_deref().unwrap_or(""),
            notification.description.as_deref().unwrap_or("")
        );
        Ok(())
    }
}

/// Forwards notifications to the host over a channel.
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelRenderer {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Renderer plus the receiving end the host reads from.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl NotificationRenderer for ChannelRenderer {
    fn show(&self, notification: &Notification) -> Result<()> {
        self.tx
            .send(notification.clone())
            .map_err(|_| NotifyError::Backend("notification receiver closed".to_owned()))
    }
}
