use eventcache_core::{
    BookmarkObserver, EntityId, Event, EventDataRepository, RepoError, Session, SpeakerOrder,
    StoreContext, Track,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[test]
fn background_write_reports_completion_and_commits() {
    let (_dir, repo) = open_repo();

    repo.save_tracks(vec![Track::new(1, "Android")])
        .start()
        .wait()
        .unwrap();

    let tracks = repo.get_tracks_sync().unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].name, "Android");
}

#[test]
fn failed_background_batch_rolls_back_and_reports_failure() {
    let (_dir, repo) = open_repo();

    let result = repo
        .save_sessions(vec![Session::new(1, "First"), Session::new(2, "   ")])
        .start()
        .wait();
    assert!(matches!(result, Err(RepoError::Validation(_))));
    assert!(repo.get_session_sync(1).unwrap().is_none());

    // The failed worker's handle is gone; the store accepts new writes
    // and maintenance immediately.
    repo.save_sessions(vec![Session::new(1, "First")])
        .start()
        .wait()
        .unwrap();
    repo.compact_database().unwrap();
}

#[test]
fn unstarted_save_performs_no_work() {
    let (_dir, repo) = open_repo();

    let deferred = repo.save_tracks(vec![Track::new(1, "Android")]);
    drop(deferred);

    assert!(repo.get_tracks_sync().unwrap().is_empty());
}

#[test]
fn independent_saves_may_run_concurrently() {
    let (_dir, repo) = open_repo();

    let first = repo.save_tracks(vec![Track::new(1, "Android")]).start();
    let second = repo.save_tracks(vec![Track::new(2, "Web")]).start();
    first.wait().unwrap();
    second.wait().unwrap();

    assert_eq!(repo.get_tracks_sync().unwrap().len(), 2);
}

#[test]
fn live_tracks_follow_committed_writes() {
    let (_dir, repo) = open_repo();

    let mut live = repo.get_tracks().unwrap();
    assert!(live.current().is_empty());
    assert!(!live.refresh().unwrap(), "no change, no re-read");

    repo.save_tracks(vec![Track::new(1, "Android")])
        .run_blocking()
        .unwrap();

    assert!(live.refresh().unwrap());
    assert_eq!(live.current().len(), 1);
    assert_eq!(live.current()[0].name, "Android");
}

#[test]
fn live_result_blocks_until_relevant_change() {
    let (_dir, repo) = open_repo();

    let mut live = repo.get_speakers(SpeakerOrder::Name).unwrap();
    let completion = repo
        .save_speakers(vec![eventcache_core::Speaker::new(1, "Ada")])
        .start();

    assert!(live.wait_for_change().unwrap());
    assert_eq!(live.current().len(), 1);
    completion.wait().unwrap();
}

#[test]
fn bookmark_signal_fires_after_commit_only() {
    let (_dir, repo) = open_repo();
    let observer = Arc::new(RecordingObserver::default());
    let repo = repo.with_bookmark_observer(observer.clone());

    repo.save_sessions(vec![Session::new(1, "Keynote")])
        .run_blocking()
        .unwrap();
    repo.set_bookmark(1, true).start().wait().unwrap();
    assert_eq!(observer.events(), vec![(1, true)]);

    let missing = repo.set_bookmark(4242, true).start().wait();
    assert!(matches!(missing, Err(RepoError::NotFound { .. })));
    assert_eq!(
        observer.events(),
        vec![(1, true)],
        "failed toggles must not signal"
    );
}

#[test]
fn event_singleton_is_replaced_not_duplicated() {
    let (_dir, repo) = open_repo();

    repo.save_event(Event::new(7, "RustConf"))
        .run_blocking()
        .unwrap();
    let mut updated = Event::new(7, "RustConf 2026");
    updated.location_name = Some("Berlin".to_string());
    repo.save_event(updated).run_blocking().unwrap();

    let stored = repo.get_event_sync().unwrap().unwrap();
    assert_eq!(stored.name, "RustConf 2026");
    assert_eq!(stored.location_name.as_deref(), Some("Berlin"));

    let handle = repo.context().open_handle().unwrap();
    let count: i64 = handle
        .connection()
        .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn version_ids_are_readable_when_fetch_layer_wrote_them() {
    let (_dir, repo) = open_repo();
    assert!(repo.get_version_ids_sync().unwrap().is_none());

    let handle = repo.context().open_handle().unwrap();
    handle
        .connection()
        .execute(
            "INSERT INTO versions (slot, event_ver, tracks_ver, sessions_ver,
                                   speakers_ver, sponsors_ver, microlocations_ver)
             VALUES (1, 3, 1, 4, 1, 5, 9);",
            [],
        )
        .unwrap();

    let version = repo.get_version_ids_sync().unwrap().unwrap();
    assert_eq!(version.event_ver, 3);
    assert_eq!(version.microlocations_ver, 9);
}

#[derive(Default)]
struct RecordingObserver {
    seen: Mutex<Vec<(EntityId, bool)>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<(EntityId, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

impl BookmarkObserver for RecordingObserver {
    fn bookmark_changed(&self, session_id: EntityId, bookmarked: bool) {
        self.seen.lock().unwrap().push((session_id, bookmarked));
    }
}

fn open_repo() -> (TempDir, EventDataRepository) {
    let dir = tempfile::tempdir().unwrap();
    let context = StoreContext::init(dir.path().join("eventcache.db")).unwrap();
    let repo = EventDataRepository::new(context).unwrap();
    (dir, repo)
}
