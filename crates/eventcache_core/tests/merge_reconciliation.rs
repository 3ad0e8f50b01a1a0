use eventcache_core::{
    EventDataRepository, RepoError, Session, Speaker, StoreContext, Track,
};
use tempfile::TempDir;

#[test]
fn bookmark_survives_remote_overwrite() {
    let (_dir, repo) = open_repo();

    repo.save_sessions(vec![talk(1, "Opening Keynote")])
        .run_blocking()
        .unwrap();
    repo.set_bookmark(1, true).run_blocking().unwrap();

    // Remote refresh of the same session arrives with the flag unset and a
    // changed title.
    let mut refreshed = talk(1, "Opening Keynote (updated)");
    refreshed.bookmarked = false;
    repo.save_sessions(vec![refreshed]).run_blocking().unwrap();

    let stored = repo.get_session_sync(1).unwrap().unwrap();
    assert!(stored.bookmarked, "bookmark must survive remote overwrite");
    assert_eq!(stored.title, "Opening Keynote (updated)");
}

#[test]
fn explicit_unbookmark_clears_the_flag() {
    let (_dir, repo) = open_repo();

    repo.save_sessions(vec![talk(1, "Opening Keynote")])
        .run_blocking()
        .unwrap();
    repo.set_bookmark(1, true).run_blocking().unwrap();
    repo.set_bookmark(1, false).run_blocking().unwrap();

    let stored = repo.get_session_sync(1).unwrap().unwrap();
    assert!(!stored.bookmarked);
}

#[test]
fn track_save_reuses_stored_session_instance() {
    let (_dir, repo) = open_repo();

    // Fully populated session saved through its own path first.
    let mut original = talk(10, "Deep Dive into Storage");
    original.speakers = vec![Speaker::new(5, "Ada")];
    repo.save_sessions(vec![original]).run_blocking().unwrap();

    // A later track batch carries a bare copy of the same session.
    let mut track = Track::new(1, "Systems");
    track.sessions = vec![Session::new(10, "stale copy")];
    repo.save_tracks(vec![track]).run_blocking().unwrap();

    let stored = repo.get_session_sync(10).unwrap().unwrap();
    assert_eq!(stored.title, "Deep Dive into Storage");
    assert_eq!(stored.speakers.len(), 1, "speaker list must not be detached");
    assert_eq!(stored.speakers[0].id, 5);

    let track = repo.get_track_sync(1).unwrap().unwrap();
    assert_eq!(track.sessions.len(), 1);
    assert_eq!(track.sessions[0].title, "Deep Dive into Storage");
}

#[test]
fn shared_children_are_not_duplicated() {
    let (_dir, repo) = open_repo();

    let mut first = Track::new(1, "Track A");
    first.sessions = vec![talk(10, "Shared Session")];
    let mut second = Track::new(2, "Track B");
    second.sessions = vec![talk(10, "Shared Session")];
    repo.save_tracks(vec![first, second]).run_blocking().unwrap();
    repo.save_tracks(vec![{
        let mut again = Track::new(1, "Track A");
        again.sessions = vec![talk(10, "Shared Session")];
        again
    }])
    .run_blocking()
    .unwrap();

    let handle = repo.context().open_handle().unwrap();
    let count: i64 = handle
        .connection()
        .query_row("SELECT COUNT(*) FROM sessions WHERE id = 10;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(count, 1, "exactly one row per identity key");

    assert_eq!(repo.get_track_sync(1).unwrap().unwrap().sessions.len(), 1);
    assert_eq!(repo.get_track_sync(2).unwrap().unwrap().sessions.len(), 1);
}

#[test]
fn session_track_reference_resolves_to_stored_row() {
    let (_dir, repo) = open_repo();

    let mut track = Track::new(1, "Rust");
    track.description = Some("low-level track".to_string());
    repo.save_tracks(vec![track]).run_blocking().unwrap();

    // The incoming session embeds an outdated copy of the track.
    let mut session = talk(20, "Borrow Checker Clinic");
    session.track = Some(Box::new(Track::new(1, "stale name")));
    repo.save_sessions(vec![session]).run_blocking().unwrap();

    let stored_track = repo.get_track_sync(1).unwrap().unwrap();
    assert_eq!(stored_track.name, "Rust");
    assert_eq!(stored_track.description.as_deref(), Some("low-level track"));

    let stored_session = repo.get_session_sync(20).unwrap().unwrap();
    assert_eq!(stored_session.track.as_ref().unwrap().name, "Rust");
}

#[test]
fn missing_track_reference_inserts_embedded_copy() {
    let (_dir, repo) = open_repo();

    let mut session = talk(30, "Lightning Talks");
    session.track = Some(Box::new(Track::new(99, "Community")));
    repo.save_sessions(vec![session]).run_blocking().unwrap();

    let inserted = repo.get_track_sync(99).unwrap().unwrap();
    assert_eq!(inserted.name, "Community");

    let stored = repo.get_session_sync(30).unwrap().unwrap();
    assert_eq!(stored.track.as_ref().unwrap().id, 99);
}

#[test]
fn net_new_session_in_track_batch_carries_its_graph() {
    let (_dir, repo) = open_repo();

    let mut session = talk(40, "Panel Discussion");
    session.speakers = vec![Speaker::new(7, "Grace")];
    let mut track = Track::new(3, "Plenary");
    track.sessions = vec![session];
    repo.save_tracks(vec![track]).run_blocking().unwrap();

    let stored = repo.get_session_sync(40).unwrap().unwrap();
    assert_eq!(stored.speakers.len(), 1);
    assert_eq!(stored.speakers[0].name, "Grace");
}

#[test]
fn net_new_child_graph_is_not_reconciled() {
    let (_dir, repo) = open_repo();

    repo.save_speakers(vec![Speaker::new(7, "Grace Hopper")])
        .run_blocking()
        .unwrap();

    // Net-new session carried by a track batch embeds a conflicting copy
    // of speaker 7; the one-level merge writes it through as-is.
    let mut session = talk(41, "Compilers Reunion");
    session.speakers = vec![Speaker::new(7, "G. Hopper")];
    let mut track = Track::new(4, "History");
    track.sessions = vec![session];
    repo.save_tracks(vec![track]).run_blocking().unwrap();

    let overwritten = repo.get_speaker_by_name_sync("G. Hopper").unwrap();
    assert!(overwritten.is_some(), "grandchild copies are written as-is");
}

#[test]
fn speaker_save_reuses_stored_sessions() {
    let (_dir, repo) = open_repo();

    repo.save_sessions(vec![talk(10, "Deep Dive into Storage")])
        .run_blocking()
        .unwrap();

    let mut speaker = Speaker::new(5, "Ada");
    speaker.sessions = vec![Session::new(10, "stale copy")];
    repo.save_speakers(vec![speaker]).run_blocking().unwrap();

    let stored = repo.get_speaker_by_name_sync("Ada").unwrap().unwrap();
    assert_eq!(stored.sessions.len(), 1);
    assert_eq!(stored.sessions[0].title, "Deep Dive into Storage");

    // The session's own row was left untouched by the speaker batch.
    let session = repo.get_session_sync(10).unwrap().unwrap();
    assert_eq!(session.title, "Deep Dive into Storage");
}

#[test]
fn batch_with_invalid_entity_commits_nothing() {
    let (_dir, repo) = open_repo();

    let result = repo
        .save_sessions(vec![talk(50, "First"), talk(51, "  ")])
        .run_blocking();
    assert!(matches!(result, Err(RepoError::Validation(_))));

    assert!(
        repo.get_session_sync(50).unwrap().is_none(),
        "no entity of a failed batch may be visible"
    );
}

#[test]
fn remote_json_payload_round_trips_through_save() {
    let (_dir, repo) = open_repo();

    let sessions: Vec<Session> = serde_json::from_str(
        r#"[
            {
                "id": 60,
                "title": "Opening Keynote",
                "start_time_ms": 1754550000000,
                "end_time_ms": 1754553600000,
                "start_date": "2026-08-07",
                "location_name": "Main Hall",
                "track": {"id": 1, "name": "Plenary"},
                "speakers": [{"id": 5, "name": "Ada"}]
            }
        ]"#,
    )
    .unwrap();
    repo.save_sessions(sessions).run_blocking().unwrap();

    let stored = repo.get_session_sync(60).unwrap().unwrap();
    assert!(!stored.bookmarked, "payload without flag defaults to false");
    assert_eq!(stored.location_name.as_deref(), Some("Main Hall"));
    assert_eq!(stored.track.as_ref().unwrap().name, "Plenary");
    assert_eq!(stored.speakers[0].name, "Ada");
}

fn talk(id: i64, title: &str) -> Session {
    let mut session = Session::new(id, title);
    session.start_time_ms = Some(1_754_550_000_000 + id * 3_600_000);
    session.end_time_ms = session.start_time_ms.map(|start| start + 3_600_000);
    session.start_date = Some("2026-08-07".to_string());
    session
}

fn open_repo() -> (TempDir, EventDataRepository) {
    let dir = tempfile::tempdir().unwrap();
    let context = StoreContext::init(dir.path().join("eventcache.db")).unwrap();
    let repo = EventDataRepository::new(context).unwrap();
    (dir, repo)
}
