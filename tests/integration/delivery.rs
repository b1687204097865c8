use crate::helpers::{config_in, drain, request, settle};
use deferred_notify::render::{ChannelRenderer, Notification, NotificationRenderer};
use deferred_notify::scheduler::{
    ChannelSettings, Importance, LocalWorkQueue, MemoryStore, NotificationType,
};
use deferred_notify::{NotifyError, NotifyService, ResumeKind, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Hymn {
    title: String,
    lyrics: String,
    author: String,
}

fn volatile_service(
    config: &deferred_notify::NotifyConfig,
) -> (
    NotifyService,
    tokio::sync::mpsc::UnboundedReceiver<Notification>,
) {
    let (renderer, delivered) = ChannelRenderer::channel();
    let service = NotifyService::new(
        config,
        Arc::new(LocalWorkQueue::volatile(Handle::current())),
        Arc::new(MemoryStore::new()),
        Arc::new(renderer),
    );
    (service, delivered)
}

#[tokio::test(start_paused = true)]
async fn tapped_notification_returns_the_original_payload() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = volatile_service(&config_in(temp.path()));

    let hymn = Hymn {
        title: "Notification Man".to_owned(),
        lyrics: "la".to_owned(),
        author: "X".to_owned(),
    };
    let work_id = service
        .trigger(
            request("Match update", 5)
                .description("Arsenal 2-1")
                .payload_object(&hymn)
                .expect("payload"),
        )
        .expect("trigger");

    settle(4).await;
    assert!(drain(&mut delivered).is_empty());
    settle(2).await;

    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    let notification = &shown[0];
    assert_eq!(notification.work_id, work_id);
    assert_eq!(notification.title.as_deref(), Some("Match update"));
    assert_eq!(notification.description.as_deref(), Some("Arsenal 2-1"));
    assert_eq!(notification.tap.resume_target, "app.MatchActivity");
    assert!(!notification.tap.fragment_target);

    let decoded: Hymn = notification
        .tap
        .decode_payload()
        .expect("decode")
        .expect("payload present");
    assert_eq!(decoded, hymn);
    assert_eq!(service.state(&work_id), Some(TaskState::Delivered));

    // Natural firing leaves the identifier recorded until cooldown.
    assert_eq!(service.recorded_work().expect("recorded").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn map_payload_and_fragment_target_reach_the_renderer() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = volatile_service(&config_in(temp.path()));

    let mut score = BTreeMap::new();
    score.insert("home".to_owned(), "Arsenal".to_owned());
    score.insert("away".to_owned(), "Spurs".to_owned());

    service
        .trigger(
            request("Score", 1)
                .resume_kind(ResumeKind::Fragment)
                .payload_object(&score)
                .expect("payload"),
        )
        .expect("trigger");
    settle(2).await;

    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    assert!(shown[0].tap.fragment_target);
    assert_eq!(
        shown[0].tap.payload.as_deref(),
        Some(r#"{"away":"Spurs","home":"Arsenal"}"#)
    );
    let decoded: BTreeMap<String, String> = shown[0]
        .tap
        .decode_payload()
        .expect("decode")
        .expect("payload present");
    assert_eq!(decoded, score);
}

#[tokio::test(start_paused = true)]
async fn configured_channel_and_delay_fill_unset_fields() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(temp.path());
    config.scheduler.default_delay_secs = 7;
    config.channel.default_channel_id = "matches".to_owned();
    config.channel.importance = Importance::High;
    let (service, mut delivered) = volatile_service(&config);

    let request = deferred_notify::TriggerBuilder::new()
        .resume_target("app.MatchActivity")
        .resume_kind(ResumeKind::Activity)
        .channel(ChannelSettings::new().with_channel_name("Live scores"));
    service.trigger(request).expect("trigger");

    settle(6).await;
    assert!(drain(&mut delivered).is_empty());
    settle(2).await;

    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].channel.channel_id, "matches");
    assert_eq!(shown[0].channel.channel_name, "Live scores");
    assert_eq!(shown[0].channel.importance, Importance::High);
    assert_eq!(shown[0].notification_type, NotificationType::Text);
}

#[tokio::test(start_paused = true)]
async fn image_notifications_carry_their_thumbnail() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = volatile_service(&config_in(temp.path()));

    let rejected = service.trigger(request("Goal", 1).notification_type(NotificationType::Image));
    assert!(matches!(rejected, Err(NotifyError::Configuration(_))));

    service
        .trigger(
            request("Goal", 1)
                .notification_type(NotificationType::Image)
                .thumbnail("https://example.invalid/goal.png"),
        )
        .expect("trigger");
    settle(2).await;

    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].notification_type, NotificationType::Image);
    assert_eq!(
        shown[0].thumbnail.as_deref(),
        Some("https://example.invalid/goal.png")
    );
}

struct FailingRenderer;

impl NotificationRenderer for FailingRenderer {
    fn show(&self, _notification: &Notification) -> deferred_notify::Result<()> {
        Err(NotifyError::Backend("display unavailable".to_owned()))
    }
}

#[tokio::test(start_paused = true)]
async fn renderer_failure_does_not_stop_later_deliveries() {
    let temp = tempfile::tempdir().expect("tempdir");
    let service = NotifyService::new(
        &config_in(temp.path()),
        Arc::new(LocalWorkQueue::volatile(Handle::current())),
        Arc::new(MemoryStore::new()),
        Arc::new(FailingRenderer),
    );

    let first = service.trigger(request("One", 1)).expect("trigger");
    let second = service.trigger(request("Two", 2)).expect("trigger");
    settle(3).await;

    assert_eq!(service.state(&first), Some(TaskState::Delivered));
    assert_eq!(service.state(&second), Some(TaskState::Delivered));
}
