mod common;

use chrono::{Duration, Utc};
use common::{fast_config, shared, ScriptedMicrophone};
use tokio::sync::Mutex;
use void_lib::{
    audio::AudioSampler,
    db::{Database, FocusSession, SessionRepository},
    focus::FocusController,
    timeline::TimelineItem,
};

// Only one controller may exist per process, so these tests take turns.
static SERIAL: Mutex<()> = Mutex::const_new(());

fn repository(dir: &tempfile::TempDir) -> SessionRepository {
    SessionRepository::new(Database::new(dir.path().join("void.sqlite3")).unwrap())
}

#[tokio::test]
async fn test_enter_and_exit_persist_session() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let mic = shared(ScriptedMicrophone::new(-20.0));
    let controller = FocusController::new(
        repository(&dir),
        AudioSampler::new(mic.clone(), fast_config()),
    )
    .unwrap();

    let session = controller.enter().await.unwrap();
    assert!(session.is_active);
    assert_eq!(controller.current().await, Some(session.clone()));
    assert_eq!(controller.permission_granted().await, Some(true));
    assert_eq!(mic.active(), 1);

    let stored = controller.repository().get_all().await;
    assert_eq!(stored, vec![session.clone()]);

    let ended = controller.exit().await.unwrap().unwrap();
    assert_eq!(ended.id, session.id);
    assert!(!ended.is_active);
    assert!(ended.end_time.unwrap() >= session.start_time);
    assert_eq!(mic.active(), 0);
    assert!(controller.current().await.is_none());

    let stored = controller.repository().get_all().await;
    assert_eq!(stored, vec![ended.clone()]);
    assert_eq!(controller.sessions(), stored);

    let timeline = controller.timeline();
    assert_eq!(timeline.len(), 1);
    assert!(matches!(&timeline[0], TimelineItem::Session(entry) if entry.id == ended.id));

    controller.wait_for_fade().await;
}

#[tokio::test]
async fn test_enter_while_focusing_returns_current() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let mic = shared(ScriptedMicrophone::new(-20.0));
    let controller = FocusController::new(
        repository(&dir),
        AudioSampler::new(mic.clone(), fast_config()),
    )
    .unwrap();

    let first = controller.enter().await.unwrap();
    let second = controller.enter().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(controller.repository().get_all().await.len(), 1);
    assert_eq!(mic.started(), 1);

    controller.exit().await.unwrap();
    assert!(controller.exit().await.unwrap().is_none());
}

#[tokio::test]
async fn test_second_controller_is_refused() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let repo = repository(&dir);
    let mic = shared(ScriptedMicrophone::new(-20.0));

    let controller =
        FocusController::new(repo.clone(), AudioSampler::new(mic.clone(), fast_config())).unwrap();
    let clone = controller.clone();

    assert!(
        FocusController::new(repo.clone(), AudioSampler::new(mic.clone(), fast_config())).is_err()
    );

    drop(controller);
    assert!(
        FocusController::new(repo.clone(), AudioSampler::new(mic.clone(), fast_config())).is_err()
    );

    drop(clone);
    assert!(FocusController::new(repo, AudioSampler::new(mic, fast_config())).is_ok());
}

#[tokio::test]
async fn test_denied_permission_still_records_session() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let mic = shared(ScriptedMicrophone::denying());
    let controller = FocusController::new(
        repository(&dir),
        AudioSampler::new(mic.clone(), fast_config()),
    )
    .unwrap();

    let session = controller.enter().await.unwrap();
    assert_eq!(controller.permission_granted().await, Some(false));
    assert_eq!(mic.started(), 0);

    let ended = controller.exit().await.unwrap().unwrap();
    assert_eq!(ended.id, session.id);
    assert!(ended.is_completed());
}

#[tokio::test]
async fn test_delete_removes_only_that_session() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let repo = repository(&dir);
    let now = Utc::now().timestamp_millis();

    for (id, offset_h) in [("a", 3), ("b", 2), ("c", 1)] {
        let start = now - Duration::hours(offset_h).num_milliseconds();
        let mut session = FocusSession::begin(id.to_string(), start);
        session.completion(start + 60_000).apply(&mut session);
        repo.add(session).await;
    }

    let controller = FocusController::new(
        repo,
        AudioSampler::new(shared(ScriptedMicrophone::new(-20.0)), fast_config()),
    )
    .unwrap();
    controller.refresh().await;

    let remaining = controller.delete("b").await;
    let ids: Vec<&str> = remaining.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"]);
    assert_eq!(controller.sessions(), remaining);

    let unchanged = controller.delete("missing").await;
    assert_eq!(unchanged, remaining);
}

#[tokio::test]
async fn test_recover_abandoned_closes_stale_sessions() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let repo = repository(&dir);
    let start = Utc::now().timestamp_millis() - 3_600_000;
    repo.add(FocusSession::begin("stale".into(), start)).await;

    let controller = FocusController::new(
        repo,
        AudioSampler::new(shared(ScriptedMicrophone::new(-20.0)), fast_config()),
    )
    .unwrap();

    assert_eq!(controller.recover_abandoned().await, 1);

    let stale = controller
        .sessions()
        .into_iter()
        .find(|s| s.id == "stale")
        .unwrap();
    assert!(!stale.is_active);
    assert_eq!(stale.end_time, Some(start));
    assert_eq!(stale.duration, 0);

    // The running session is never treated as abandoned.
    let live = controller.enter().await.unwrap();
    assert_eq!(controller.recover_abandoned().await, 0);
    assert_eq!(controller.current().await.map(|s| s.id), Some(live.id));
    controller.exit().await.unwrap();
}

#[tokio::test]
async fn test_exit_racing_enter_releases_microphone() {
    let _guard = SERIAL.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let mic = shared(ScriptedMicrophone::new(-20.0));
    let controller = FocusController::new(
        repository(&dir),
        AudioSampler::new(mic.clone(), fast_config()),
    )
    .unwrap();

    let entering = tokio::spawn({
        let controller = controller.clone();
        async move { controller.enter().await }
    });
    tokio::task::yield_now().await;
    let exited = controller.exit().await.unwrap();
    let entered = entering.await.unwrap().unwrap();

    // Whichever ran first, the microphone is held exactly while a session is
    // current.
    let current = controller.current().await;
    assert_eq!(current.is_some(), mic.active() == 1);
    match exited {
        Some(ended) => {
            assert_eq!(ended.id, entered.id);
            assert!(current.is_none());
        }
        None => assert_eq!(current.map(|s| s.id), Some(entered.id.clone())),
    }

    controller.exit().await.unwrap();
    assert_eq!(mic.active(), 0);
    assert!(controller.current().await.is_none());

    let stored = controller.repository().get_all().await;
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_completed());
    controller.wait_for_fade().await;
}
