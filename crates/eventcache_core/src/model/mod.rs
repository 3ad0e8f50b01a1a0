//! Domain model for the cached conference-event dataset.
//!
//! # Responsibility
//! - Define the canonical entity records persisted by this core.
//! - Provide pre-write validation shared by all save paths.
//!
//! # Invariants
//! - Every entity except the singleton `Event` is identified by a stable
//!   remote-assigned `EntityId`; two records sharing an id are the same
//!   logical entity at different points in time.
//! - Validation failures abort the whole batch they occur in.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod event;
pub mod extras;
pub mod schedule;

/// Remote-assigned numeric identity shared by all keyed entities.
pub type EntityId = i64;

/// Pre-write validation failure for any entity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyName { entity: &'static str, id: EntityId },
    EndsBeforeStart { entity: &'static str, id: EntityId },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName { entity, id } => {
                write!(f, "{entity} {id} has an empty name")
            }
            Self::EndsBeforeStart { entity, id } => {
                write!(f, "{entity} {id} ends before it starts")
            }
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_name(
    entity: &'static str,
    id: EntityId,
    name: &str,
) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName { entity, id });
    }
    Ok(())
}

pub(crate) fn require_ordered_times(
    entity: &'static str,
    id: EntityId,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (start_ms, end_ms) {
        if end < start {
            return Err(ValidationError::EndsBeforeStart { entity, id });
        }
    }
    Ok(())
}
