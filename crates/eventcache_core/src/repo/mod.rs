//! Persistence layer: errors, transaction scoping, merge and queries.
//!
//! # Responsibility
//! - Define the repository error contract shared by all persistence APIs.
//! - Scope every batch write to one transaction on one owned handle.
//!
//! # Invariants
//! - A batch either commits as a whole or leaves the store unmodified.
//! - Lookup misses during merge are an insert path, not an error.

use crate::db::{DbError, StoreHandle};
use crate::model::{EntityId, ValidationError};
use rusqlite::Transaction;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog_repo;
pub mod merge;
pub mod schedule_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: EntityId },
    InvalidData(String),
    Worker(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Worker(label) => write!(
                f,
                "background write `{label}` terminated without reporting a result"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
            Self::Worker(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Runs `f` inside one IMMEDIATE transaction on `handle`.
///
/// Commits only when `f` returns `Ok`; any error drops the transaction,
/// rolling back every statement of the batch.
pub fn write_txn<T>(
    handle: &mut StoreHandle,
    f: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
) -> RepoResult<T> {
    let tx = handle.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
