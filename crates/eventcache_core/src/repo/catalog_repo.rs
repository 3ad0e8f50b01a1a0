//! Catalog records: event metadata, sponsors, locations, dates, versions.
//!
//! # Responsibility
//! - Persist and read the entity kinds that carry no nested relationships.
//! - Materialize the derived day range the schedule UI pages over.
//!
//! # Invariants
//! - `events` and `versions` hold at most one row each.
//! - `event_dates` always equals the half-open day range `[start, end)` of
//!   the most recent save; stale rows never survive a save.

use super::{RepoError, RepoResult};
use crate::model::event::Event;
use crate::model::extras::{EventDates, Sponsor, Version};
use crate::model::schedule::Microlocation;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};

/// Read-side repository over the catalog tables.
pub struct CatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> CatalogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn get_event(&self) -> RepoResult<Option<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                name,
                description,
                email,
                logo_url,
                start_time_ms,
                end_time_ms,
                timezone,
                location_name
             FROM events
             WHERE slot = 1;",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Event {
                id: row.get("id")?,
                name: row.get("name")?,
                description: row.get("description")?,
                email: row.get("email")?,
                logo_url: row.get("logo_url")?,
                start_time_ms: row.get("start_time_ms")?,
                end_time_ms: row.get("end_time_ms")?,
                timezone: row.get("timezone")?,
                location_name: row.get("location_name")?,
            }));
        }
        Ok(None)
    }

    pub fn get_version_ids(&self) -> RepoResult<Option<Version>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                event_ver,
                tracks_ver,
                sessions_ver,
                speakers_ver,
                sponsors_ver,
                microlocations_ver
             FROM versions
             WHERE slot = 1;",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Version {
                event_ver: row.get("event_ver")?,
                tracks_ver: row.get("tracks_ver")?,
                sessions_ver: row.get("sessions_ver")?,
                speakers_ver: row.get("speakers_ver")?,
                sponsors_ver: row.get("sponsors_ver")?,
                microlocations_ver: row.get("microlocations_ver")?,
            }));
        }
        Ok(None)
    }

    /// Sponsors by descending tier, then name.
    pub fn get_sponsors(&self) -> RepoResult<Vec<Sponsor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, level, logo_url
             FROM sponsors
             ORDER BY level DESC, name COLLATE NOCASE ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut sponsors = Vec::new();
        while let Some(row) = rows.next()? {
            sponsors.push(Sponsor {
                id: row.get("id")?,
                name: row.get("name")?,
                level: row.get("level")?,
                logo_url: row.get("logo_url")?,
            });
        }
        Ok(sponsors)
    }

    pub fn get_locations(&self) -> RepoResult<Vec<Microlocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, floor
             FROM microlocations
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut locations = Vec::new();
        while let Some(row) = rows.next()? {
            locations.push(Microlocation {
                id: row.get("id")?,
                name: row.get("name")?,
                floor: row.get("floor")?,
            });
        }
        Ok(locations)
    }

    pub fn get_event_dates(&self) -> RepoResult<Vec<EventDates>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date FROM event_dates ORDER BY date ASC;")?;
        let mut rows = stmt.query([])?;
        let mut dates = Vec::new();
        while let Some(row) = rows.next()? {
            dates.push(EventDates {
                date: row.get("date")?,
            });
        }
        Ok(dates)
    }
}

/// Replaces the singleton event record.
pub(crate) fn upsert_event(tx: &Transaction<'_>, event: &Event) -> RepoResult<()> {
    event.validate()?;
    tx.execute(
        "INSERT INTO events (
            slot,
            id,
            name,
            description,
            email,
            logo_url,
            start_time_ms,
            end_time_ms,
            timezone,
            location_name
         ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (slot) DO UPDATE SET
            id = excluded.id,
            name = excluded.name,
            description = excluded.description,
            email = excluded.email,
            logo_url = excluded.logo_url,
            start_time_ms = excluded.start_time_ms,
            end_time_ms = excluded.end_time_ms,
            timezone = excluded.timezone,
            location_name = excluded.location_name;",
        params![
            event.id,
            event.name.as_str(),
            event.description.as_deref(),
            event.email.as_deref(),
            event.logo_url.as_deref(),
            event.start_time_ms,
            event.end_time_ms,
            event.timezone.as_deref(),
            event.location_name.as_deref(),
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_sponsor(tx: &Transaction<'_>, sponsor: &Sponsor) -> RepoResult<()> {
    sponsor.validate()?;
    tx.execute(
        "INSERT INTO sponsors (id, name, level, logo_url)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            level = excluded.level,
            logo_url = excluded.logo_url;",
        params![
            sponsor.id,
            sponsor.name.as_str(),
            sponsor.level,
            sponsor.logo_url.as_deref(),
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_microlocation(
    tx: &Transaction<'_>,
    location: &Microlocation,
) -> RepoResult<()> {
    location.validate()?;
    tx.execute(
        "INSERT INTO microlocations (id, name, floor)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            floor = excluded.floor;",
        params![location.id, location.name.as_str(), location.floor],
    )?;
    Ok(())
}

/// Rebuilds `event_dates` as the half-open day range `[start, end)`.
///
/// Prior rows are deleted first; an empty or inverted range therefore
/// leaves the table empty. Returns the number of day rows written.
pub(crate) fn replace_event_dates(
    tx: &Transaction<'_>,
    start: NaiveDate,
    end: NaiveDate,
) -> RepoResult<u32> {
    tx.execute("DELETE FROM event_dates;", [])?;

    let mut day = start;
    let mut count = 0u32;
    while day < end {
        tx.execute(
            "INSERT INTO event_dates (date) VALUES (?1);",
            [day.format("%Y-%m-%d").to_string()],
        )?;
        day = day
            .succ_opt()
            .ok_or_else(|| RepoError::InvalidData(format!("calendar overflow after {day}")))?;
        count += 1;
    }

    Ok(count)
}
