//! `taxgraph-recon`: per-invoice reconciliation of tax filing records.
//!
//! Pure checks (paths, values, timeliness) feed a deterministic verdict
//! composer. The engine pulls context from an [`InvoiceStore`] and writes the
//! verdict back; the store itself lives outside this crate.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod paths;
pub mod store;
pub mod timing;
pub mod values;
pub mod verdict;

pub use config::ReconConfig;
pub use engine::{reconcile_all, reconcile_invoice, BatchOptions, CancelToken};
pub use error::ReconError;
pub use model::{BatchFilter, InvoiceContext, Reconciled, ReconSummary, RiskLevel, Status, Verdict};
pub use store::{InvoiceStore, StoreError};
