use crate::helpers::{drain, open_service, request, settle};
use deferred_notify::{NotifyError, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Hymn {
    title: String,
    lyrics: String,
    author: String,
}

#[tokio::test(start_paused = true)]
async fn cooling_down_before_the_delay_suppresses_delivery() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = open_service(temp.path());

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

    assert_eq!(
        service.cool_down_latest().expect("cool down"),
        Some(work_id)
    );
    settle(10).await;

    assert!(drain(&mut delivered).is_empty());
    assert!(service.recorded_work().expect("recorded").is_empty());
    assert!(service.pending_work().is_empty());
    assert_eq!(service.state(&work_id), Some(TaskState::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn latest_is_the_oldest_recorded_submission() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = open_service(temp.path());

    let a = service.trigger(request("A", 10)).expect("trigger a");
    let b = service.trigger(request("B", 2)).expect("trigger b");

    settle(3).await;
    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].work_id, b);

    // A is still first in the store even though B fired.
    assert_eq!(service.cool_down_latest().expect("cool down"), Some(a));
    settle(10).await;
    assert!(drain(&mut delivered).is_empty());

    let recorded: Vec<_> = service
        .recorded_work()
        .expect("recorded")
        .into_iter()
        .map(|w| w.work_id)
        .collect();
    assert_eq!(recorded, vec![b]);
    assert_eq!(service.state(&a), Some(TaskState::Cancelled));
    assert_eq!(service.state(&b), Some(TaskState::Delivered));
}

#[tokio::test(start_paused = true)]
async fn immediate_cooldown_of_a_zero_delay_task_never_delivers() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = open_service(temp.path());

    let work_id = service.trigger(request("Now", 0)).expect("trigger");
    service.cool_down_latest().expect("cool down");
    settle(1).await;

    assert!(drain(&mut delivered).is_empty());
    assert_eq!(service.state(&work_id), Some(TaskState::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn cooling_down_all_twice_is_harmless() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mut delivered) = open_service(temp.path());

    for delay in [3, 4, 5] {
        service.trigger(request("Batch", delay)).expect("trigger");
    }

    assert_eq!(service.cool_down_all().expect("first"), 3);
    assert_eq!(service.cool_down_all().expect("second"), 0);
    assert_eq!(service.cool_down_latest().expect("latest"), None);

    settle(10).await;
    assert!(drain(&mut delivered).is_empty());
    assert!(service.pending_work().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cooldown_requires_a_prior_trigger() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, _delivered) = open_service(temp.path());

    assert!(matches!(
        service.cool_down_latest(),
        Err(NotifyError::NotTriggered)
    ));
    assert!(matches!(
        service.cool_down_all(),
        Err(NotifyError::NotTriggered)
    ));
}

#[tokio::test(start_paused = true)]
async fn rejected_request_does_not_reach_the_backend() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, _delivered) = open_service(temp.path());

    let result = service.trigger(request("Bad", -1));
    assert!(matches!(result, Err(NotifyError::Configuration(_))));
    assert!(service.pending_work().is_empty());
    assert!(service.recorded_work().expect("recorded").is_empty());
    assert!(matches!(
        service.cool_down_latest(),
        Err(NotifyError::NotTriggered)
    ));
}

#[tokio::test(start_paused = true)]
async fn every_trigger_gets_a_distinct_identifier() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, _delivered) = open_service(temp.path());

    let ids: Vec<_> = (0..25)
        .map(|i| service.trigger(request("Burst", 60 + i)).expect("trigger"))
        .collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(service.pending_work(), ids);

    service.cool_down_all().expect("clean up");
}
