//! Supporting records: sponsors, derived event dates, component versions.

use super::{require_name, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// A sponsoring organisation with its sponsorship tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsor {
    pub id: EntityId,
    pub name: String,
    /// Sponsorship tier; higher means more prominent.
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl Sponsor {
    pub fn new(id: EntityId, name: impl Into<String>, level: i64) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            logo_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("sponsor", self.id, &self.name)
    }
}

/// One calendar day the event spans, as `YYYY-MM-DD`.
///
/// Derived data: the stored set always equals the half-open day range of
/// the last saved event date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDates {
    pub date: String,
}

/// Per-component dataset versions reported by the remote side.
///
/// Read-only for this core; the fetch layer writes it when it compares
/// remote and local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Version {
    pub event_ver: i64,
    pub tracks_ver: i64,
    pub sessions_ver: i64,
    pub speakers_ver: i64,
    pub sponsors_ver: i64,
    pub microlocations_ver: i64,
}
