//! Schedule graph entities: tracks, sessions, speakers, microlocations.
//!
//! # Responsibility
//! - Define the relational records remote batches arrive as.
//! - Keep relationship fields explicit so merge reconciliation can resolve
//!   them against stored rows.
//!
//! # Invariants
//! - `Session.bookmarked` is user-local state; remote payloads default it
//!   to `false` and must never be able to clear a stored `true`.
//! - The graph is cyclic (Session↔Track, Session↔Speaker); collections on
//!   freshly fetched entities are plain owned copies, identity is carried
//!   by `id` alone.

use super::{require_name, require_ordered_times, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// A themed group of sessions.
///
/// `sessions` is the track's owned, ordered list; it is resolved against
/// stored rows before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display color as `#rrggbb`.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Track {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            color: None,
            sessions: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("track", self.id, &self.name)
    }
}

/// One scheduled talk/workshop slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub start_time_ms: Option<i64>,
    /// Unix epoch milliseconds. Should be >= `start_time_ms` when both set.
    #[serde(default)]
    pub end_time_ms: Option<i64>,
    /// Calendar day of `start_time_ms` as `YYYY-MM-DD`, used for day-wise
    /// schedule queries.
    #[serde(default)]
    pub start_date: Option<String>,
    /// User-local bookmark flag; sticky across remote overwrites.
    #[serde(default)]
    pub bookmarked: bool,
    /// Singular owning-track reference.
    #[serde(default)]
    pub track: Option<Box<Track>>,
    /// Microlocation reference by name.
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub speakers: Vec<Speaker>,
}

impl Session {
    pub fn new(id: EntityId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            subtitle: None,
            start_time_ms: None,
            end_time_ms: None,
            start_date: None,
            bookmarked: false,
            track: None,
            location_name: None,
            speakers: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("session", self.id, &self.title)?;
        require_ordered_times("session", self.id, self.start_time_ms, self.end_time_ms)?;
        Ok(())
    }
}

/// A person giving one or more sessions.
///
/// `sessions` mirrors Session→Speaker from the other side but is a
/// separately saved list, not a derived back-link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub organisation: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Speaker {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            organisation: None,
            photo_url: None,
            sessions: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("speaker", self.id, &self.name)
    }
}

/// A named venue room/area sessions take place in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Microlocation {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub floor: Option<i64>,
}

impl Microlocation {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            floor: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("microlocation", self.id, &self.name)
    }
}
