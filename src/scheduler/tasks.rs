//! Task descriptor and related value types.
//!
//! A [`TaskDescriptor`] is produced by the trigger builder and is immutable
//! afterwards; the backend persists it verbatim until the task fires.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifyError;

/// Delay applied when the caller does not set one.
pub const DEFAULT_DELAY_SECS: u64 = 5;

/// Opaque handle minted by the backend on enqueue. The only way to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(uuid::Uuid);

impl WorkId {
    /// Mint a fresh, globally unique identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WorkId {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| NotifyError::Configuration(format!("invalid work id '{s}': {e}")))
    }
}

/// How a tapped notification routes back into the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeKind {
    /// Resume into the main target.
    Activity,
    /// Resume into a sub-target of the main target.
    Fragment,
}

impl FromStr for ResumeKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "activity" => Ok(Self::Activity),
            "fragment" => Ok(Self::Fragment),
            other => Err(NotifyError::Configuration(format!(
                "unknown resume kind '{other}' (expected 'activity' or 'fragment')"
            ))),
        }
    }
}

/// Visual style of the notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Title and description only.
    #[default]
    Text,
    /// Text plus the thumbnail rendered as a large image.
    Image,
}

/// Channel importance level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Default,
    High,
}

impl Importance {
    /// Numeric level handed to renderers (`Low=0`, `Default=1`, `High=2`).
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Default => 1,
            Self::High => 2,
        }
    }
}

/// Notification channel settings attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_id: String,
    pub channel_name: String,
    pub importance: Importance,
    pub show_badge: bool,
}

/// Immutable description of one deferred notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub(crate) resume_target: String,
    pub(crate) resume_kind: ResumeKind,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) thumbnail: Option<String>,
    pub(crate) delay_secs: u64,
    pub(crate) notification_type: NotificationType,
    pub(crate) channel: ChannelConfig,
    pub(crate) payload: Option<String>,
}

impl TaskDescriptor {
    pub fn resume_target(&self) -> &str {
        &self.resume_target
    }

    pub fn resume_kind(&self) -> ResumeKind {
        self.resume_kind
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// Minimum delay before the task may fire.
    pub fn delay_secs(&self) -> u64 {
        self.delay_secs
    }

    pub fn notification_type(&self) -> NotificationType {
        self.notification_type
    }

    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    /// Pre-serialized caller payload, never parsed by the scheduler.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

/// Lifecycle of a submitted task as seen by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Submitted, delay not yet elapsed.
    Pending,
    /// Backend dispatched it; the notification is being built.
    Fired,
    /// Handed to the renderer. Terminal.
    Delivered,
    /// Cancelled before delivery. Terminal.
    Cancelled,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn work_ids_are_unique() {
        let a = WorkId::new();
        let b = WorkId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn work_id_parses_its_display_form() {
        let id = WorkId::new();
        let parsed: WorkId = id.to_string().parse().expect("parse");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<WorkId>().is_err());
    }

    #[test]
    fn resume_kind_parses_case_insensitively() {
        assert_eq!("Fragment".parse::<ResumeKind>().unwrap(), ResumeKind::Fragment);
        assert_eq!(" activity ".parse::<ResumeKind>().unwrap(), ResumeKind::Activity);
        assert!(matches!(
            "dialog".parse::<ResumeKind>(),
            Err(NotifyError::Configuration(_))
        ));
    }

    #[test]
    fn importance_levels_match_channel_numbering() {
        assert_eq!(Importance::Low.level(), 0);
        assert_eq!(Importance::default().level(), 1);
        assert_eq!(Importance::High.level(), 2);
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Delivered.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Fired.is_terminal());
    }
}
