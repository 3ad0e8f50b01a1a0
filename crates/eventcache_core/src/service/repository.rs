//! Repository façade over the cached conference-event dataset.
//!
//! # Responsibility
//! - Expose every write as a cold deferred action that runs its whole
//!   batch in one transaction on its own handle.
//! - Expose reads synchronously on the caller's handle and as live results
//!   that follow committed changes.
//!
//! # Invariants
//! - Background writes never touch the façade's default handle; each opens
//!   its own from the context inside the worker and releases it by scope
//!   exit on every path.
//! - Change topics and the bookmark signal are published only after the
//!   transaction committed.

use crate::db::{DbResult, StoreContext, StoreHandle};
use crate::model::event::Event;
use crate::model::extras::{EventDates, Sponsor, Version};
use crate::model::schedule::{Microlocation, Session, Speaker, Track};
use crate::model::EntityId;
use crate::repo::catalog_repo::{self, CatalogRepository};
use crate::repo::schedule_repo::{self, ScheduleRepository, SessionOrder, SpeakerOrder};
use crate::repo::{merge, write_txn, RepoResult};
use crate::task::Deferred;
use crate::watch::{BookmarkObserver, ChangeBus, LiveResults, Topic};
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::Transaction;
use std::sync::Arc;
use std::time::Instant;

// A schedule save may cascade net-new embedded children of the other two
// kinds, so all three topics fire together.
const SCHEDULE_TOPICS: &[Topic] = &[Topic::Tracks, Topic::Sessions, Topic::Speakers];

/// Device-local repository for one conference event dataset.
///
/// The façade itself is confined to the thread that created it (it owns
/// the default read handle); it hands cloneable pieces (context, bus) to
/// the background workers its deferred actions run on.
pub struct EventDataRepository {
    context: StoreContext,
    bus: ChangeBus,
    default_handle: StoreHandle,
    bookmark_observer: Option<Arc<dyn BookmarkObserver>>,
}

impl EventDataRepository {
    /// Builds the façade on an initialized store context.
    pub fn new(context: StoreContext) -> DbResult<Self> {
        let default_handle = context.open_handle()?;
        Ok(Self {
            context,
            bus: ChangeBus::new(),
            default_handle,
            bookmark_observer: None,
        })
    }

    /// Registers the collaborator notified after bookmark commits.
    pub fn with_bookmark_observer(mut self, observer: Arc<dyn BookmarkObserver>) -> Self {
        self.bookmark_observer = Some(observer);
        self
    }

    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    // Write surface. Every save returns a cold action; nothing happens
    // until the caller starts or runs it.

    pub fn save_event(&self, event: Event) -> Deferred {
        self.deferred_write("save_event", &[Topic::Event], move |tx| {
            catalog_repo::upsert_event(tx, &event)?;
            Ok(1)
        })
    }

    /// Saves tracks, merging each one's session list with stored rows.
    pub fn save_tracks(&self, tracks: Vec<Track>) -> Deferred {
        self.deferred_write("save_tracks", SCHEDULE_TOPICS, move |tx| {
            for track in &tracks {
                merge::save_track(tx, track)?;
            }
            Ok(tracks.len())
        })
    }

    /// Saves sessions, merging speaker lists and track references, with
    /// bookmark stickiness applied per session.
    pub fn save_sessions(&self, sessions: Vec<Session>) -> Deferred {
        self.deferred_write("save_sessions", SCHEDULE_TOPICS, move |tx| {
            for session in &sessions {
                merge::save_session(tx, session)?;
            }
            Ok(sessions.len())
        })
    }

    /// Saves speakers, merging each one's session list with stored rows.
    pub fn save_speakers(&self, speakers: Vec<Speaker>) -> Deferred {
        self.deferred_write("save_speakers", SCHEDULE_TOPICS, move |tx| {
            for speaker in &speakers {
                merge::save_speaker(tx, speaker)?;
            }
            Ok(speakers.len())
        })
    }

    pub fn save_sponsors(&self, sponsors: Vec<Sponsor>) -> Deferred {
        self.deferred_write("save_sponsors", &[Topic::Sponsors], move |tx| {
            for sponsor in &sponsors {
                catalog_repo::upsert_sponsor(tx, sponsor)?;
            }
            Ok(sponsors.len())
        })
    }

    pub fn save_locations(&self, locations: Vec<Microlocation>) -> Deferred {
        self.deferred_write("save_locations", &[Topic::Locations], move |tx| {
            for location in &locations {
                catalog_repo::upsert_microlocation(tx, location)?;
            }
            Ok(locations.len())
        })
    }

    /// Replaces the stored day range with `[start, end)`.
    pub fn save_event_dates(&self, start: NaiveDate, end: NaiveDate) -> Deferred {
        self.deferred_write("save_event_dates", &[Topic::EventDates], move |tx| {
            let count = catalog_repo::replace_event_dates(tx, start, end)?;
            Ok(count as usize)
        })
    }

    /// Sets the user-local bookmark flag of one session.
    ///
    /// The registered [`BookmarkObserver`] is signalled after the
    /// transaction commits, never on failure.
    pub fn set_bookmark(&self, session_id: EntityId, bookmarked: bool) -> Deferred {
        let context = self.context.clone();
        let bus = self.bus.clone();
        let observer = self.bookmark_observer.clone();
        Deferred::new("set_bookmark", move || {
            let started_at = Instant::now();
            let mut handle = context.open_handle()?;
            match write_txn(&mut handle, |tx| {
                schedule_repo::set_bookmark(tx, session_id, bookmarked)
            }) {
                Ok(()) => {
                    bus.publish(Topic::Sessions);
                    if let Some(observer) = &observer {
                        observer.bookmark_changed(session_id, bookmarked);
                    }
                    info!(
                        "event=set_bookmark module=repo status=ok session_id={session_id} bookmarked={bookmarked} duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    Ok(())
                }
                Err(err) => {
                    error!(
                        "event=set_bookmark module=repo status=error session_id={session_id} duration_ms={} error={err}",
                        started_at.elapsed().as_millis()
                    );
                    Err(err)
                }
            }
        })
    }

    /// Reclaims storage space.
    ///
    /// All other handles to this store must be closed before calling;
    /// behavior is undefined while secondary handles are open.
    pub fn compact_database(&self) -> RepoResult<()> {
        self.default_handle.compact()?;
        Ok(())
    }

    // Synchronous reads on the façade's default handle.

    pub fn get_event_sync(&self) -> RepoResult<Option<Event>> {
        self.catalog().get_event()
    }

    pub fn get_version_ids_sync(&self) -> RepoResult<Option<Version>> {
        self.catalog().get_version_ids()
    }

    pub fn get_tracks_sync(&self) -> RepoResult<Vec<Track>> {
        self.schedule().get_tracks()
    }

    pub fn get_tracks_filtered(&self, query: &str) -> RepoResult<Vec<Track>> {
        self.schedule().get_tracks_filtered(query)
    }

    pub fn get_track_sync(&self, track_id: EntityId) -> RepoResult<Option<Track>> {
        self.schedule().get_track(track_id)
    }

    pub fn get_session_sync(&self, session_id: EntityId) -> RepoResult<Option<Session>> {
        self.schedule().get_session(session_id)
    }

    pub fn get_session_by_title_sync(&self, title: &str) -> RepoResult<Option<Session>> {
        self.schedule().get_session_by_title(title)
    }

    pub fn get_sessions_filtered(
        &self,
        track_id: EntityId,
        query: &str,
    ) -> RepoResult<Vec<Session>> {
        self.schedule().get_sessions_filtered(track_id, query)
    }

    pub fn get_sessions_by_location_sync(&self, location: &str) -> RepoResult<Vec<Session>> {
        self.schedule().get_sessions_by_location(location)
    }

    pub fn get_sessions_by_date_sync(
        &self,
        date: &str,
        order: SessionOrder,
    ) -> RepoResult<Vec<Session>> {
        self.schedule().get_sessions_by_date(date, order)
    }

    pub fn get_sessions_by_date_filtered(
        &self,
        date: &str,
        query: &str,
        order: SessionOrder,
    ) -> RepoResult<Vec<Session>> {
        self.schedule()
            .get_sessions_by_date_filtered(date, query, order)
    }

    pub fn get_bookmarked_sessions_sync(&self) -> RepoResult<Vec<Session>> {
        self.schedule().get_bookmarked_sessions()
    }

    pub fn get_speaker_by_name_sync(&self, name: &str) -> RepoResult<Option<Speaker>> {
        self.schedule().get_speaker_by_name(name)
    }

    pub fn get_speakers_sync(&self, order: SpeakerOrder) -> RepoResult<Vec<Speaker>> {
        self.schedule().get_speakers(order)
    }

    pub fn get_speakers_filtered(
        &self,
        query: &str,
        order: SpeakerOrder,
    ) -> RepoResult<Vec<Speaker>> {
        self.schedule().get_speakers_filtered(query, order)
    }

    pub fn get_sponsors_sync(&self) -> RepoResult<Vec<Sponsor>> {
        self.catalog().get_sponsors()
    }

    pub fn get_locations_sync(&self) -> RepoResult<Vec<Microlocation>> {
        self.catalog().get_locations()
    }

    pub fn get_event_dates_sync(&self) -> RepoResult<Vec<EventDates>> {
        self.catalog().get_event_dates()
    }

    // Live reads. Each owns its own handle and follows committed changes.

    pub fn get_event(&self) -> RepoResult<LiveResults<Option<Event>>> {
        self.live(&[Topic::Event], |handle| {
            CatalogRepository::new(handle.connection()).get_event()
        })
    }

    pub fn get_tracks(&self) -> RepoResult<LiveResults<Vec<Track>>> {
        self.live(SCHEDULE_TOPICS, |handle| {
            ScheduleRepository::new(handle.connection()).get_tracks()
        })
    }

    pub fn get_track(&self, track_id: EntityId) -> RepoResult<LiveResults<Option<Track>>> {
        self.live(SCHEDULE_TOPICS, move |handle| {
            ScheduleRepository::new(handle.connection()).get_track(track_id)
        })
    }

    pub fn get_session(&self, session_id: EntityId) -> RepoResult<LiveResults<Option<Session>>> {
        self.live(SCHEDULE_TOPICS, move |handle| {
            ScheduleRepository::new(handle.connection()).get_session(session_id)
        })
    }

    pub fn get_session_by_title(
        &self,
        title: impl Into<String>,
    ) -> RepoResult<LiveResults<Option<Session>>> {
        let title = title.into();
        self.live(SCHEDULE_TOPICS, move |handle| {
            ScheduleRepository::new(handle.connection()).get_session_by_title(&title)
        })
    }

    pub fn get_sessions_by_location(
        &self,
        location: impl Into<String>,
    ) -> RepoResult<LiveResults<Vec<Session>>> {
        let location = location.into();
        self.live(SCHEDULE_TOPICS, move |handle| {
            ScheduleRepository::new(handle.connection()).get_sessions_by_location(&location)
        })
    }

    pub fn get_sessions_by_date(
        &self,
        date: impl Into<String>,
        order: SessionOrder,
    ) -> RepoResult<LiveResults<Vec<Session>>> {
        let date = date.into();
        self.live(SCHEDULE_TOPICS, move |handle| {
            ScheduleRepository::new(handle.connection()).get_sessions_by_date(&date, order)
        })
    }

    pub fn get_bookmarked_sessions(&self) -> RepoResult<LiveResults<Vec<Session>>> {
        self.live(SCHEDULE_TOPICS, |handle| {
            ScheduleRepository::new(handle.connection()).get_bookmarked_sessions()
        })
    }

    pub fn get_speakers(&self, order: SpeakerOrder) -> RepoResult<LiveResults<Vec<Speaker>>> {
        self.live(SCHEDULE_TOPICS, move |handle| {
            ScheduleRepository::new(handle.connection()).get_speakers(order)
        })
    }

    pub fn get_sponsors(&self) -> RepoResult<LiveResults<Vec<Sponsor>>> {
        self.live(&[Topic::Sponsors], |handle| {
            CatalogRepository::new(handle.connection()).get_sponsors()
        })
    }

    pub fn get_locations(&self) -> RepoResult<LiveResults<Vec<Microlocation>>> {
        self.live(&[Topic::Locations], |handle| {
            CatalogRepository::new(handle.connection()).get_locations()
        })
    }

    pub fn get_event_dates(&self) -> RepoResult<LiveResults<Vec<EventDates>>> {
        self.live(&[Topic::EventDates], |handle| {
            CatalogRepository::new(handle.connection()).get_event_dates()
        })
    }

    fn schedule(&self) -> ScheduleRepository<'_> {
        ScheduleRepository::new(self.default_handle.connection())
    }

    fn catalog(&self) -> CatalogRepository<'_> {
        CatalogRepository::new(self.default_handle.connection())
    }

    fn live<T>(
        &self,
        topics: &'static [Topic],
        query: impl Fn(&StoreHandle) -> RepoResult<T> + 'static,
    ) -> RepoResult<LiveResults<T>> {
        LiveResults::open(&self.context, &self.bus, topics, query)
    }

    fn deferred_write(
        &self,
        label: &'static str,
        topics: &'static [Topic],
        job: impl FnOnce(&Transaction<'_>) -> RepoResult<usize> + Send + 'static,
    ) -> Deferred {
        let context = self.context.clone();
        let bus = self.bus.clone();
        Deferred::new(label, move || {
            let started_at = Instant::now();
            let mut handle = context.open_handle()?;
            match write_txn(&mut handle, job) {
                Ok(count) => {
                    for topic in topics {
                        bus.publish(*topic);
                    }
                    info!(
                        "event={label} module=repo status=ok count={count} duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    Ok(())
                }
                Err(err) => {
                    error!(
                        "event={label} module=repo status=error duration_ms={} error={err}",
                        started_at.elapsed().as_millis()
                    );
                    Err(err)
                }
            }
        })
    }
}
