//! The data-access seam between the reconciliation engine and whatever holds
//! the trading graph.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::{BatchFilter, InvoiceContext, Verdict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or has been closed.
    Unavailable(String),
    /// A read failed.
    Query(String),
    /// A write failed; nothing was persisted.
    Write(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            Self::Query(msg) => write!(f, "query failed: {msg}"),
            Self::Write(msg) => write!(f, "write failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Reads invoice context and writes verdicts back.
///
/// Shared across batch worker threads, so implementations must be `Sync`.
pub trait InvoiceStore: Send + Sync {
    /// `Ok(None)` when the record does not exist for this tenant.
    fn fetch_context(
        &self,
        record_id: &str,
        tenant: &str,
    ) -> Result<Option<InvoiceContext>, StoreError>;

    /// Replace the record's status, risk level, explanation and timestamp in
    /// one atomic write.
    fn write_verdict(
        &self,
        record_id: &str,
        tenant: &str,
        verdict: &Verdict,
        reconciled_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Record ids matching `filter`, capped at `filter.limit`.
    fn list_record_ids(&self, tenant: &str, filter: &BatchFilter)
        -> Result<Vec<String>, StoreError>;
}
