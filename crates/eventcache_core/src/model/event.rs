//! Singleton event metadata record.

use super::{require_name, require_ordered_times, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// Metadata of the one conference event this device caches.
///
/// Exactly one row is expected in the store; saving replaces it. The `id`
/// is remote metadata, not the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub start_time_ms: Option<i64>,
    /// Unix epoch milliseconds. Should be >= `start_time_ms` when both set.
    #[serde(default)]
    pub end_time_ms: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
}

impl Event {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            email: None,
            logo_url: None,
            start_time_ms: None,
            end_time_ms: None,
            timezone: None,
            location_name: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("event", self.id, &self.name)?;
        require_ordered_times("event", self.id, self.start_time_ms, self.end_time_ms)?;
        Ok(())
    }
}
