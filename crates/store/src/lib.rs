//! `taxgraph-store`: the trading graph in a single SQLite file.
//!
//! [`SqliteGraphStore`] implements both the reconciliation engine's
//! [`InvoiceStore`](taxgraph_recon::InvoiceStore) and the detectors'
//! [`PatternSource`](taxgraph_patterns::PatternSource). Every query is scoped
//! to a tenant.

mod graph;
mod ingest;
mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use taxgraph_recon::StoreError;

pub use ingest::{FilingKind, NewFiling, NewInvoice, NewPayment, NewTaxpayer};

/// SQLite-backed graph store.
///
/// The connection sits behind a mutex so one store can be shared by every
/// batch worker. After [`close`](Self::close) all calls fail with
/// [`StoreError::Unavailable`].
pub struct SqliteGraphStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteGraphStore {
    /// Open (or create) a store file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        log::debug!("opened graph store at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(schema::SCHEMA)
            .map_err(|e| StoreError::Unavailable(format!("schema setup failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| StoreError::Unavailable(format!("close failed: {e}")))?;
            log::debug!("graph store closed");
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    /// Run `f` against the open connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let guard = self.lock()?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(StoreError::Unavailable("store is closed".into())),
        }
    }
}

pub(crate) fn query_err(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

pub(crate) fn write_err(e: rusqlite::Error) -> StoreError {
    StoreError::Write(e.to_string())
}
