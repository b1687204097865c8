//! Shared helpers for integration tests.

use deferred_notify::render::{ChannelRenderer, Notification};
use deferred_notify::{NotifyConfig, NotifyService, ResumeKind, TriggerBuilder};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Default config with state kept under `dir`.
pub(crate) fn config_in(dir: &Path) -> NotifyConfig {
    let mut config = NotifyConfig::default();
    config.scheduler.state_dir = Some(dir.to_path_buf());
    config
}

/// Durable service rooted at `dir` plus the stream of delivered notifications.
/// Must run inside a tokio runtime.
pub(crate) fn open_service(dir: &Path) -> (NotifyService, UnboundedReceiver<Notification>) {
    let (renderer, delivered) = ChannelRenderer::channel();
    let service = NotifyService::open(&config_in(dir), Arc::new(renderer)).expect("open service");
    (service, delivered)
}

/// Minimal valid request with the given title and delay.
pub(crate) fn request(title: &str, delay_secs: i64) -> TriggerBuilder {
    TriggerBuilder::new()
        .resume_target("app.MatchActivity")
        .resume_kind(ResumeKind::Activity)
        .title(title)
        .delay_secs(delay_secs)
}

/// Advance paused time and let fired timers run.
pub(crate) async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    tokio::task::yield_now().await;
}

/// Everything delivered so far.
pub(crate) fn drain(delivered: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = delivered.try_recv() {
        out.push(notification);
    }
    out
}
