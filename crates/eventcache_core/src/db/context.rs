//! Process-wide store context and thread-confined handles.
//!
//! # Responsibility
//! - Hold the store location with an explicit init-at-startup lifecycle.
//! - Open per-operation handles that never outlive or leave their thread.
//!
//! # Invariants
//! - `StoreContext::init` has applied all migrations before it returns.
//! - `StoreHandle` is not `Send`/`Sync`; every execution context opens its
//!   own handle and releases it by scope exit.

use super::open::open_db;
use super::DbResult;
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Shareable description of the device-local store.
///
/// Cheap to clone and safe to move across threads; actual connections are
/// only ever opened through [`StoreContext::open_handle`] on the thread
/// that will use them.
#[derive(Debug, Clone)]
pub struct StoreContext {
    db_path: Arc<PathBuf>,
}

impl StoreContext {
    /// Initializes the store at `path`, applying pending migrations.
    ///
    /// Must be called once at startup before any repository operation; the
    /// bootstrap connection is closed again before this returns.
    pub fn init(path: impl AsRef<Path>) -> DbResult<Self> {
        let bootstrap = open_db(path.as_ref())?;
        drop(bootstrap);

        Ok(Self {
            db_path: Arc::new(path.as_ref().to_path_buf()),
        })
    }

    /// Opens a fresh handle owned by the calling thread.
    pub fn open_handle(&self) -> DbResult<StoreHandle> {
        let conn = open_db(self.db_path.as_path())?;
        Ok(StoreHandle::from_connection(conn))
    }

    /// Returns the store file location.
    pub fn db_path(&self) -> &Path {
        self.db_path.as_path()
    }
}

/// A thread-confined connection to the store.
///
/// The raw-pointer marker keeps this type out of `Send`/`Sync`, so handing
/// a handle to another thread is a compile error rather than a runtime
/// crash. Handles are released by dropping them; there is no manual close.
#[derive(Debug)]
pub struct StoreHandle {
    conn: Connection,
    _confined: PhantomData<*const ()>,
}

impl StoreHandle {
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            _confined: PhantomData,
        }
    }

    /// Read access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begins an IMMEDIATE write transaction scoped to this handle.
    ///
    /// Dropping the returned transaction without committing rolls back
    /// every statement executed inside it.
    pub fn transaction(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
    }

    /// Reclaims storage space with `VACUUM`.
    ///
    /// Callers must ensure no other handle to the same store is open; the
    /// operation is undefined while secondary handles hold transactions.
    pub fn compact(&self) -> DbResult<()> {
        let started_at = Instant::now();
        self.conn.execute_batch("VACUUM;")?;
        info!(
            "event=db_compact module=db status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}
