//! Schedule read surface and targeted session updates.
//!
//! # Responsibility
//! - Query tracks, sessions and speakers with the filter/sort semantics the
//!   UI layers rely on.
//! - Apply the explicit bookmark update, the one field remote saves must
//!   not own.
//!
//! # Invariants
//! - Substring filters are case-insensitive and match anywhere in the
//!   target field.
//! - Hydration is one relationship level deep: returned parents carry
//!   scalar child records whose own collections are empty.

use super::{RepoError, RepoResult};
use crate::model::schedule::{Session, Speaker, Track};
use crate::model::EntityId;
use rusqlite::{params, Connection, Row, Transaction};

const TRACK_SELECT_SQL: &str = "SELECT id, name, description, color FROM tracks";

// Columns stay table-qualified so the link-table joins below cannot clash
// on `track_id`.
const SESSION_SELECT_SQL: &str = "SELECT
    sessions.id,
    sessions.title,
    sessions.subtitle,
    sessions.start_time_ms,
    sessions.end_time_ms,
    sessions.start_date,
    sessions.is_bookmarked,
    sessions.track_id,
    sessions.location_name
FROM sessions";

const SPEAKER_SELECT_SQL: &str = "SELECT id, name, organisation, photo_url FROM speakers";

/// Sort order for session list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionOrder {
    #[default]
    StartTime,
    Title,
}

impl SessionOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::StartTime => "start_time_ms ASC, id ASC",
            Self::Title => "title COLLATE NOCASE ASC, id ASC",
        }
    }
}

/// Sort order for speaker list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerOrder {
    #[default]
    Name,
    Organisation,
}

impl SpeakerOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::Name => "name COLLATE NOCASE ASC, id ASC",
            Self::Organisation => "organisation COLLATE NOCASE ASC, name COLLATE NOCASE ASC",
        }
    }
}

/// Read-side repository over the schedule graph.
pub struct ScheduleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ScheduleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn get_track(&self, id: EntityId) -> RepoResult<Option<Track>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRACK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            let mut track = parse_track_row(row)?;
            track.sessions = self.load_track_sessions(track.id)?;
            return Ok(Some(track));
        }
        Ok(None)
    }

    pub fn get_tracks(&self) -> RepoResult<Vec<Track>> {
        self.track_list(
            &format!("{TRACK_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC, id ASC;"),
            params![],
        )
    }

    /// Tracks whose name contains `query`, case-insensitively.
    pub fn get_tracks_filtered(&self, query: &str) -> RepoResult<Vec<Track>> {
        self.track_list(
            &format!(
                "{TRACK_SELECT_SQL}
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY name COLLATE NOCASE ASC, id ASC;"
            ),
            params![contains_pattern(query)],
        )
    }

    pub fn get_session(&self, id: EntityId) -> RepoResult<Option<Session>> {
        self.session_first(&format!("{SESSION_SELECT_SQL} WHERE id = ?1;"), params![id])
    }

    pub fn get_session_by_title(&self, title: &str) -> RepoResult<Option<Session>> {
        self.session_first(
            &format!("{SESSION_SELECT_SQL} WHERE title = ?1;"),
            params![title],
        )
    }

    /// Sessions of one track whose title contains `query`, by start time.
    pub fn get_sessions_filtered(
        &self,
        track_id: EntityId,
        query: &str,
    ) -> RepoResult<Vec<Session>> {
        self.session_list(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE track_id = ?1 AND title LIKE ?2 ESCAPE '\\'
                 ORDER BY start_time_ms ASC, id ASC;"
            ),
            params![track_id, contains_pattern(query)],
        )
    }

    pub fn get_sessions_by_location(&self, location: &str) -> RepoResult<Vec<Session>> {
        self.session_list(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE location_name = ?1
                 ORDER BY start_time_ms ASC, id ASC;"
            ),
            params![location],
        )
    }

    pub fn get_sessions_by_date(
        &self,
        date: &str,
        order: SessionOrder,
    ) -> RepoResult<Vec<Session>> {
        self.session_list(
            &format!(
                "{SESSION_SELECT_SQL} WHERE start_date = ?1 ORDER BY {};",
                order.sql()
            ),
            params![date],
        )
    }

    pub fn get_sessions_by_date_filtered(
        &self,
        date: &str,
        query: &str,
        order: SessionOrder,
    ) -> RepoResult<Vec<Session>> {
        self.session_list(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE start_date = ?1 AND title LIKE ?2 ESCAPE '\\'
                 ORDER BY {};",
                order.sql()
            ),
            params![date, contains_pattern(query)],
        )
    }

    pub fn get_bookmarked_sessions(&self) -> RepoResult<Vec<Session>> {
        self.session_list(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE is_bookmarked = 1
                 ORDER BY start_time_ms ASC, id ASC;"
            ),
            params![],
        )
    }

    pub fn get_speaker_by_name(&self, name: &str) -> RepoResult<Option<Speaker>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SPEAKER_SELECT_SQL} WHERE name = ?1;"))?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            let mut speaker = parse_speaker_row(row)?;
            speaker.sessions = self.load_speaker_sessions(speaker.id)?;
            return Ok(Some(speaker));
        }
        Ok(None)
    }

    pub fn get_speakers(&self, order: SpeakerOrder) -> RepoResult<Vec<Speaker>> {
        self.speaker_list(
            &format!("{SPEAKER_SELECT_SQL} ORDER BY {};", order.sql()),
            params![],
        )
    }

    /// Speakers whose name contains `query`, case-insensitively.
    pub fn get_speakers_filtered(
        &self,
        query: &str,
        order: SpeakerOrder,
    ) -> RepoResult<Vec<Speaker>> {
        self.speaker_list(
            &format!(
                "{SPEAKER_SELECT_SQL} WHERE name LIKE ?1 ESCAPE '\\' ORDER BY {};",
                order.sql()
            ),
            params![contains_pattern(query)],
        )
    }

    fn track_list(&self, sql: &str, binds: impl rusqlite::Params) -> RepoResult<Vec<Track>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(binds)?;
        let mut tracks = Vec::new();
        while let Some(row) = rows.next()? {
            tracks.push(parse_track_row(row)?);
        }
        for track in &mut tracks {
            track.sessions = self.load_track_sessions(track.id)?;
        }
        Ok(tracks)
    }

    fn session_first(
        &self,
        sql: &str,
        binds: impl rusqlite::Params,
    ) -> RepoResult<Option<Session>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(binds)?;
        if let Some(row) = rows.next()? {
            let (session, track_id) = parse_session_row(row)?;
            return Ok(Some(self.hydrate_session(session, track_id)?));
        }
        Ok(None)
    }

    fn session_list(&self, sql: &str, binds: impl rusqlite::Params) -> RepoResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(binds)?;
        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(parse_session_row(row)?);
        }
        let mut sessions = Vec::with_capacity(parsed.len());
        for (session, track_id) in parsed {
            sessions.push(self.hydrate_session(session, track_id)?);
        }
        Ok(sessions)
    }

    fn speaker_list(&self, sql: &str, binds: impl rusqlite::Params) -> RepoResult<Vec<Speaker>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(binds)?;
        let mut speakers = Vec::new();
        while let Some(row) = rows.next()? {
            speakers.push(parse_speaker_row(row)?);
        }
        for speaker in &mut speakers {
            speaker.sessions = self.load_speaker_sessions(speaker.id)?;
        }
        Ok(speakers)
    }

    fn hydrate_session(
        &self,
        mut session: Session,
        track_id: Option<EntityId>,
    ) -> RepoResult<Session> {
        if let Some(track_id) = track_id {
            let mut stmt = self
                .conn
                .prepare(&format!("{TRACK_SELECT_SQL} WHERE id = ?1;"))?;
            let mut rows = stmt.query([track_id])?;
            if let Some(row) = rows.next()? {
                session.track = Some(Box::new(parse_track_row(row)?));
            }
        }

        let mut stmt = self.conn.prepare(&format!(
            "{SPEAKER_SELECT_SQL}
             WHERE id IN (
                SELECT speaker_id FROM session_speakers WHERE session_id = ?1
             )
             ORDER BY (
                SELECT position FROM session_speakers
                WHERE session_id = ?1 AND speaker_id = speakers.id
             ) ASC;"
        ))?;
        let mut rows = stmt.query([session.id])?;
        while let Some(row) = rows.next()? {
            session.speakers.push(parse_speaker_row(row)?);
        }

        Ok(session)
    }

    fn load_track_sessions(&self, track_id: EntityId) -> RepoResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             INNER JOIN track_sessions ts ON ts.session_id = sessions.id
             WHERE ts.track_id = ?1
             ORDER BY ts.position ASC;"
        ))?;
        let mut rows = stmt.query([track_id])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            let (session, _) = parse_session_row(row)?;
            sessions.push(session);
        }
        Ok(sessions)
    }

    fn load_speaker_sessions(&self, speaker_id: EntityId) -> RepoResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             INNER JOIN speaker_sessions ss ON ss.session_id = sessions.id
             WHERE ss.speaker_id = ?1
             ORDER BY ss.position ASC;"
        ))?;
        let mut rows = stmt.query([speaker_id])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            let (session, _) = parse_session_row(row)?;
            sessions.push(session);
        }
        Ok(sessions)
    }
}

/// Sets the user-local bookmark flag of one stored session.
///
/// The only write path allowed to change the flag; merge saves may keep it
/// true but never author it.
pub(crate) fn set_bookmark(
    tx: &Transaction<'_>,
    session_id: EntityId,
    bookmarked: bool,
) -> RepoResult<()> {
    let changed = tx.execute(
        "UPDATE sessions SET is_bookmarked = ?2 WHERE id = ?1;",
        params![session_id, i64::from(bookmarked)],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "session",
            id: session_id,
        });
    }
    Ok(())
}

/// Wildcard-wraps `query` into a contains pattern, escaping LIKE
/// metacharacters so user input matches literally.
fn contains_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn parse_track_row(row: &Row<'_>) -> RepoResult<Track> {
    Ok(Track {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        color: row.get("color")?,
        sessions: Vec::new(),
    })
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<(Session, Option<EntityId>)> {
    let is_bookmarked = match row.get::<_, i64>("is_bookmarked")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_bookmarked value `{other}` in sessions.is_bookmarked"
            )));
        }
    };

    let session = Session {
        id: row.get("id")?,
        title: row.get("title")?,
        subtitle: row.get("subtitle")?,
        start_time_ms: row.get("start_time_ms")?,
        end_time_ms: row.get("end_time_ms")?,
        start_date: row.get("start_date")?,
        bookmarked: is_bookmarked,
        track: None,
        location_name: row.get("location_name")?,
        speakers: Vec::new(),
    };
    let track_id = row.get("track_id")?;
    Ok((session, track_id))
}

fn parse_speaker_row(row: &Row<'_>) -> RepoResult<Speaker> {
    Ok(Speaker {
        id: row.get("id")?,
        name: row.get("name")?,
        organisation: row.get("organisation")?,
        photo_url: row.get("photo_url")?,
        sessions: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn contains_pattern_escapes_like_metacharacters() {
        assert_eq!(contains_pattern("abc"), "%abc%");
        assert_eq!(contains_pattern("50%"), "%50\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
    }
}
