//! Trigger builder.
//!
//! Collects a scheduling request and validates it into an immutable
//! [`TaskDescriptor`]. Channel fields left unset (or blank) are filled from
//! [`TriggerDefaults`].

use serde::Serialize;

use crate::codec;
use crate::config::{ChannelDefaults, NotifyConfig};
use crate::error::{NotifyError, Result};
use crate::scheduler::tasks::{
    ChannelConfig, DEFAULT_DELAY_SECS, Importance, NotificationType, ResumeKind, TaskDescriptor,
};

/// Caller-side channel settings. `None` or blank values take the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub importance: Option<Importance>,
    pub show_badge: Option<bool>,
}

impl ChannelSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel_id(mut self, id: impl Into<String>) -> Self {
        self.channel_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    #[must_use]
    pub fn with_show_badge(mut self, show: bool) -> Self {
        self.show_badge = Some(show);
        self
    }

    fn resolve(&self, defaults: &ChannelDefaults) -> ChannelConfig {
        ChannelConfig {
            channel_id: non_blank(self.channel_id.as_deref())
                .unwrap_or(defaults.default_channel_id.as_str())
                .to_owned(),
            channel_name: non_blank(self.channel_name.as_deref())
                .unwrap_or(defaults.default_channel_name.as_str())
                .to_owned(),
            importance: self.importance.unwrap_or(defaults.importance),
            show_badge: self.show_badge.unwrap_or(defaults.show_badge),
        }
    }
}

/// Values applied to fields the caller left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDefaults {
    pub delay_secs: u64,
    pub channel: ChannelDefaults,
}

impl Default for TriggerDefaults {
    fn default() -> Self {
        Self {
            delay_secs: DEFAULT_DELAY_SECS,
            channel: ChannelDefaults::default(),
        }
    }
}

impl From<&NotifyConfig> for TriggerDefaults {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            delay_secs: config.scheduler.default_delay_secs,
            channel: config.channel.clone(),
        }
    }
}

/// Fluent request builder; [`build`](Self::build) validates and freezes it.
#[derive(Debug, Clone, Default)]
pub struct TriggerBuilder {
    resume_target: Option<String>,
    resume_kind: Option<ResumeKind>,
    title: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    delay_secs: Option<i64>,
    notification_type: Option<NotificationType>,
    channel: Option<ChannelSettings>,
    payload: Option<String>,
}

impl TriggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opaque destination opened when the notification is tapped. Required.
    #[must_use]
    pub fn resume_target(mut self, target: impl Into<String>) -> Self {
        self.resume_target = Some(target.into());
        self
    }

    /// Routing mode for the tap. Required.
    #[must_use]
    pub fn resume_kind(mut self, kind: ResumeKind) -> Self {
        self.resume_kind = Some(kind);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Minimum delay in seconds. Negative values are rejected by `build`.
    #[must_use]
    pub fn delay_secs(mut self, secs: i64) -> Self {
        self.delay_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn notification_type(mut self, kind: NotificationType) -> Self {
        self.notification_type = Some(kind);
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: ChannelSettings) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Attach an already-serialized payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Serialize a caller record through the payload codec and attach it.
    pub fn payload_object<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(codec::encode(payload)?);
        Ok(self)
    }

    /// Validate with built-in defaults.
    pub fn build(self) -> Result<TaskDescriptor> {
        self.build_with(&TriggerDefaults::default())
    }

    /// Validate, apply `defaults` and freeze into a descriptor.
    pub fn build_with(self, defaults: &TriggerDefaults) -> Result<TaskDescriptor> {
        let resume_target = match self.resume_target {
            Some(target) if !target.trim().is_empty() => target,
            _ => {
                return Err(NotifyError::Configuration(
                    "resume target is required".to_owned(),
                ));
            }
        };
        let Some(resume_kind) = self.resume_kind else {
            return Err(NotifyError::Configuration(
                "resume kind is required".to_owned(),
            ));
        };

        let delay_secs = match self.delay_secs {
            None => defaults.delay_secs,
            Some(secs) => u64::try_from(secs).map_err(|_| {
                NotifyError::Configuration(format!("delay must not be negative, got {secs}s"))
            })?,
        };

        let notification_type = self.notification_type.unwrap_or_default();
        if notification_type == NotificationType::Image
            && non_blank(self.thumbnail.as_deref()).is_none()
        {
            return Err(NotifyError::Configuration(
                "image notifications need a thumbnail".to_owned(),
            ));
        }

        let channel = self
            .channel
            .unwrap_or_default()
            .resolve(&defaults.channel);

        Ok(TaskDescriptor {
            resume_target,
            resume_kind,
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail,
            delay_secs,
            notification_type,
            channel,
            payload: self.payload,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
