use crate::helpers::{drain, settle};
use deferred_notify::notify_dirs;
use deferred_notify::render::ChannelRenderer;
use deferred_notify::scheduler::Importance;
use deferred_notify::{NotifyConfig, NotifyService, ResumeKind, TriggerBuilder};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn service_opened_from_a_config_file_uses_its_state_dir_and_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state_dir = temp.path().join("custom-state");
    let config_path = temp.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[scheduler]\ndefault_delay_secs = 8\nstate_dir = {:?}\n\n\
             [channel]\ndefault_channel_id = \"matches\"\nimportance = \"high\"\n",
            state_dir.display().to_string()
        ),
    )
    .expect("write config");

    let config = NotifyConfig::from_file(&config_path).expect("load config");
    let (renderer, mut delivered) = ChannelRenderer::channel();
    let service = NotifyService::open(&config, Arc::new(renderer)).expect("open service");

    let work_id = service
        .trigger(
            TriggerBuilder::new()
                .resume_target("app.MatchActivity")
                .resume_kind(ResumeKind::Activity)
                .title("Kick-off"),
        )
        .expect("trigger");

    assert!(notify_dirs::work_ids_file(&state_dir).exists());
    assert!(notify_dirs::work_queue_file(&state_dir).exists());
    assert!(!notify_dirs::work_ids_file(temp.path()).exists());

    settle(7).await;
    assert!(drain(&mut delivered).is_empty());
    settle(2).await;

    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].work_id, work_id);
    assert_eq!(shown[0].channel.channel_id, "matches");
    assert_eq!(shown[0].channel.channel_name, "Deferred notifications");
    assert_eq!(shown[0].channel.importance, Importance::High);
    assert!(notify_dirs::fire_ledger_file(&state_dir).exists());
}
