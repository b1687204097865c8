use crate::helpers::{drain, open_service, request, settle};
use deferred_notify::notify_dirs;
use deferred_notify::scheduler::{IdentifierStore, JsonFileStore};

#[tokio::test(start_paused = true)]
async fn queued_work_fires_after_a_restart() {
    let temp = tempfile::tempdir().expect("tempdir");

    let work_id = {
        let (service, _delivered) = open_service(temp.path());
        let work_id = service.trigger(request("Later", 10)).expect("trigger");
        service.shutdown();
        work_id
    };

    let (service, mut delivered) = open_service(temp.path());
    assert_eq!(service.pending_work(), vec![work_id]);

    settle(11).await;
    let shown = drain(&mut delivered);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].work_id, work_id);
    assert!(service.pending_work().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delivered_work_is_not_replayed_by_the_next_process() {
    let temp = tempfile::tempdir().expect("tempdir");

    {
        let (service, mut delivered) = open_service(temp.path());
        service.trigger(request("Once", 1)).expect("trigger");
        settle(2).await;
        assert_eq!(drain(&mut delivered).len(), 1);
        service.shutdown();
    }

    let (service, mut delivered) = open_service(temp.path());
    assert!(service.pending_work().is_empty());
    settle(5).await;
    assert!(drain(&mut delivered).is_empty());
}

#[tokio::test(start_paused = true)]
async fn recorded_identifiers_survive_a_restart() {
    let temp = tempfile::tempdir().expect("tempdir");

    let (first, second) = {
        let (service, _delivered) = open_service(temp.path());
        let first = service.trigger(request("A", 30)).expect("trigger");
        let second = service.trigger(request("B", 30)).expect("trigger");
        service.shutdown();
        (first, second)
    };

    let store = JsonFileStore::new(notify_dirs::work_ids_file(temp.path()));
    let recorded: Vec<_> = store
        .all()
        .expect("all")
        .into_iter()
        .map(|w| w.work_id)
        .collect();
    assert_eq!(recorded, vec![first, second]);

    // A new process must trigger before it may cool down, then sees the
    // identifiers left by the previous one.
    let (service, mut delivered) = open_service(temp.path());
    let third = service.trigger(request("C", 30)).expect("trigger");
    assert_eq!(service.cool_down_latest().expect("latest"), Some(first));
    assert_eq!(service.cool_down_all().expect("all"), 2);

    settle(40).await;
    assert!(drain(&mut delivered).is_empty());
    assert!(service.pending_work().is_empty());
    assert_eq!(
        service.state(&third),
        Some(deferred_notify::TaskState::Cancelled)
    );
}
