use chrono::NaiveDate;
use eventcache_core::{EventDataRepository, StoreContext};
use tempfile::TempDir;

#[test]
fn half_open_range_materializes_one_row_per_day() {
    let (_dir, repo) = open_repo();

    repo.save_event_dates(day(2026, 8, 7), day(2026, 8, 10))
        .run_blocking()
        .unwrap();

    assert_eq!(
        stored_dates(&repo),
        ["2026-08-07", "2026-08-08", "2026-08-09"]
    );
}

#[test]
fn resave_fully_replaces_prior_range() {
    let (_dir, repo) = open_repo();

    repo.save_event_dates(day(2026, 8, 7), day(2026, 8, 10))
        .run_blocking()
        .unwrap();
    repo.save_event_dates(day(2026, 9, 1), day(2026, 9, 3))
        .run_blocking()
        .unwrap();

    assert_eq!(stored_dates(&repo), ["2026-09-01", "2026-09-02"]);
}

#[test]
fn empty_and_inverted_ranges_clear_the_table() {
    let (_dir, repo) = open_repo();

    repo.save_event_dates(day(2026, 8, 7), day(2026, 8, 10))
        .run_blocking()
        .unwrap();

    repo.save_event_dates(day(2026, 8, 7), day(2026, 8, 7))
        .run_blocking()
        .unwrap();
    assert!(stored_dates(&repo).is_empty());

    repo.save_event_dates(day(2026, 8, 10), day(2026, 8, 7))
        .run_blocking()
        .unwrap();
    assert!(stored_dates(&repo).is_empty());
}

#[test]
fn range_spans_month_boundaries() {
    let (_dir, repo) = open_repo();

    repo.save_event_dates(day(2026, 8, 30), day(2026, 9, 2))
        .run_blocking()
        .unwrap();

    assert_eq!(
        stored_dates(&repo),
        ["2026-08-30", "2026-08-31", "2026-09-01"]
    );
}

#[test]
fn live_event_dates_follow_commits() {
    let (_dir, repo) = open_repo();

    let mut live = repo.get_event_dates().unwrap();
    assert!(live.current().is_empty());

    repo.save_event_dates(day(2026, 8, 7), day(2026, 8, 9))
        .run_blocking()
        .unwrap();

    assert!(live.refresh().unwrap());
    assert_eq!(live.current().len(), 2);
}

fn day(year: i32, month: u32, day_of_month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day_of_month).unwrap()
}

fn stored_dates(repo: &EventDataRepository) -> Vec<String> {
    repo.get_event_dates_sync()
        .unwrap()
        .into_iter()
        .map(|record| record.date)
        .collect()
}

fn open_repo() -> (TempDir, EventDataRepository) {
    let dir = tempfile::tempdir().unwrap();
    let context = StoreContext::init(dir.path().join("eventcache.db")).unwrap();
    let repo = EventDataRepository::new(context).unwrap();
    (dir, repo)
}
