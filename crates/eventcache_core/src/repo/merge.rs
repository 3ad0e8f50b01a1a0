//! Merge reconciliation for incoming schedule batches.
//!
//! # Responsibility
//! - Resolve nested relationship references of an incoming entity against
//!   rows already stored, inside the caller's transaction.
//! - Preserve user-local session state (the bookmark flag) across remote
//!   overwrites.
//!
//! # Invariants
//! - A nested child whose id is already stored is linked to the stored row;
//!   the stored row's fields are never touched by the parent's save.
//! - A nested child absent from the store is trusted as net-new and written
//!   as carried, including its direct references (one level, no deeper
//!   reconciliation).
//! - A stored `bookmarked = true` survives any remote copy of the session.
//!
//! Remote batches arrive with fully populated nested copies. Writing those
//! copies through unconditionally would overwrite sibling relationships
//! that are not part of the batch (a track save carrying bare session
//! copies would detach their speaker lists) and would duplicate children
//! referenced from several parents. Resolving every reference to the
//! canonical stored row first keeps one row per identity key.

use super::RepoResult;
use crate::model::schedule::{Session, Speaker, Track};
use crate::model::EntityId;
use rusqlite::{params, Connection, Transaction};

/// Persists one track and its owned, ordered session list.
///
/// Track scalar fields are overwritten from the incoming copy; each listed
/// session is reconciled per the module contract.
pub fn save_track(tx: &Transaction<'_>, track: &Track) -> RepoResult<()> {
    track.validate()?;
    upsert_track_row(tx, track)?;

    tx.execute("DELETE FROM track_sessions WHERE track_id = ?1;", [track.id])?;
    for (position, session) in track.sessions.iter().enumerate() {
        if !session_exists(tx, session.id)? {
            insert_new_session(tx, session)?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO track_sessions (track_id, session_id, position)
             VALUES (?1, ?2, ?3);",
            params![track.id, session.id, position as i64],
        )?;
    }

    Ok(())
}

/// Persists one session, reconciling its speaker list and track reference.
///
/// Bookmark stickiness is applied before anything else: a stored
/// `bookmarked = true` forces the incoming flag to true regardless of what
/// the remote copy says.
pub fn save_session(tx: &Transaction<'_>, session: &Session) -> RepoResult<()> {
    session.validate()?;

    let bookmarked =
        session.bookmarked || stored_session_bookmarked(tx, session.id)?.unwrap_or(false);

    // Singular reference: a stored track stays authoritative, only the id
    // is linked; a missing track is inserted as carried.
    let track_id = match session.track.as_deref() {
        None => None,
        Some(track) => {
            if !track_exists(tx, track.id)? {
                track.validate()?;
                upsert_track_row(tx, track)?;
            }
            Some(track.id)
        }
    };

    upsert_session_row(tx, session, bookmarked, track_id)?;

    tx.execute(
        "DELETE FROM session_speakers WHERE session_id = ?1;",
        [session.id],
    )?;
    for (position, speaker) in session.speakers.iter().enumerate() {
        if !speaker_exists(tx, speaker.id)? {
            insert_new_speaker(tx, speaker)?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO session_speakers (session_id, speaker_id, position)
             VALUES (?1, ?2, ?3);",
            params![session.id, speaker.id, position as i64],
        )?;
    }

    Ok(())
}

/// Persists one speaker and its owned session list.
pub fn save_speaker(tx: &Transaction<'_>, speaker: &Speaker) -> RepoResult<()> {
    speaker.validate()?;
    upsert_speaker_row(tx, speaker)?;

    tx.execute(
        "DELETE FROM speaker_sessions WHERE speaker_id = ?1;",
        [speaker.id],
    )?;
    for (position, session) in speaker.sessions.iter().enumerate() {
        if !session_exists(tx, session.id)? {
            insert_new_session(tx, session)?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO speaker_sessions (speaker_id, session_id, position)
             VALUES (?1, ?2, ?3);",
            params![speaker.id, session.id, position as i64],
        )?;
    }

    Ok(())
}

/// Writes a session the store has never seen, as carried.
///
/// The embedded graph cascades exactly one level: the track reference and
/// the speaker list are written scalar-for-scalar (overwriting same-id
/// rows, the accepted shallow-merge limit), their own collections are not
/// followed, so the cyclic graph cannot recurse.
fn insert_new_session(tx: &Transaction<'_>, session: &Session) -> RepoResult<()> {
    session.validate()?;

    let track_id = match session.track.as_deref() {
        None => None,
        Some(track) => {
            track.validate()?;
            upsert_track_row(tx, track)?;
            Some(track.id)
        }
    };

    upsert_session_row(tx, session, session.bookmarked, track_id)?;

    for (position, speaker) in session.speakers.iter().enumerate() {
        speaker.validate()?;
        upsert_speaker_row(tx, speaker)?;
        tx.execute(
            "INSERT OR IGNORE INTO session_speakers (session_id, speaker_id, position)
             VALUES (?1, ?2, ?3);",
            params![session.id, speaker.id, position as i64],
        )?;
    }

    Ok(())
}

/// Writes a speaker the store has never seen, as carried.
fn insert_new_speaker(tx: &Transaction<'_>, speaker: &Speaker) -> RepoResult<()> {
    speaker.validate()?;
    upsert_speaker_row(tx, speaker)?;

    for (position, session) in speaker.sessions.iter().enumerate() {
        if !session_exists(tx, session.id)? {
            insert_new_session(tx, session)?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO speaker_sessions (speaker_id, session_id, position)
             VALUES (?1, ?2, ?3);",
            params![speaker.id, session.id, position as i64],
        )?;
    }

    Ok(())
}

fn upsert_track_row(conn: &Connection, track: &Track) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO tracks (id, name, description, color)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            color = excluded.color;",
        params![
            track.id,
            track.name.as_str(),
            track.description.as_deref(),
            track.color.as_deref(),
        ],
    )?;
    Ok(())
}

fn upsert_session_row(
    conn: &Connection,
    session: &Session,
    bookmarked: bool,
    track_id: Option<EntityId>,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO sessions (
            id,
            title,
            subtitle,
            start_time_ms,
            end_time_ms,
            start_date,
            is_bookmarked,
            track_id,
            location_name
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (id) DO UPDATE SET
            title = excluded.title,
            subtitle = excluded.subtitle,
            start_time_ms = excluded.start_time_ms,
            end_time_ms = excluded.end_time_ms,
            start_date = excluded.start_date,
            is_bookmarked = excluded.is_bookmarked,
            track_id = excluded.track_id,
            location_name = excluded.location_name;",
        params![
            session.id,
            session.title.as_str(),
            session.subtitle.as_deref(),
            session.start_time_ms,
            session.end_time_ms,
            session.start_date.as_deref(),
            i64::from(bookmarked),
            track_id,
            session.location_name.as_deref(),
        ],
    )?;
    Ok(())
}

fn upsert_speaker_row(conn: &Connection, speaker: &Speaker) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO speakers (id, name, organisation, photo_url)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            organisation = excluded.organisation,
            photo_url = excluded.photo_url;",
        params![
            speaker.id,
            speaker.name.as_str(),
            speaker.organisation.as_deref(),
            speaker.photo_url.as_deref(),
        ],
    )?;
    Ok(())
}

fn stored_session_bookmarked(conn: &Connection, id: EntityId) -> RepoResult<Option<bool>> {
    let mut stmt = conn.prepare("SELECT is_bookmarked FROM sessions WHERE id = ?1;")?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(row.get::<_, i64>(0)? != 0));
    }
    Ok(None)
}

pub(crate) fn track_exists(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    row_exists(conn, "SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?1);", id)
}

pub(crate) fn session_exists(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1);",
        id,
    )
}

pub(crate) fn speaker_exists(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM speakers WHERE id = ?1);",
        id,
    )
}

fn row_exists(conn: &Connection, sql: &str, id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(exists == 1)
}
