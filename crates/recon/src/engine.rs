use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{
    BatchFilter, InvoiceContext, PathCheckResult, ReconSummary, Reconciled, Status, StatusCounts,
    TimeCheckResult, ValueCheckResult, Verdict,
};
use crate::paths::check_paths;
use crate::store::InvoiceStore;
use crate::timing::check_timing;
use crate::values::check_values;
use crate::verdict::compose;

/// Set to `true` to stop a batch from picking up further records.
pub type CancelToken = Arc<AtomicBool>;

/// The three check results and the verdict composed from them.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub path: PathCheckResult,
    pub value: ValueCheckResult,
    pub time: TimeCheckResult,
    pub verdict: Verdict,
}

/// Run all checks against a context and compose the verdict. No I/O.
pub fn assess(ctx: &InvoiceContext, config: &ReconConfig, as_of: NaiveDate) -> Assessment {
    let path = check_paths(&ctx.links);
    let value = check_values(ctx, config.tolerance.value_percent);
    let time = check_timing(ctx, &config.timeliness, as_of);
    let verdict = compose(&path, &value, &time, &config.verdict);
    Assessment {
        path,
        value,
        time,
        verdict,
    }
}

/// Reconcile one record: fetch, check, compose, persist.
///
/// Returns [`ReconError::NotFound`] without writing anything when the record
/// is absent. Store failures propagate.
pub fn reconcile_invoice<S: InvoiceStore + ?Sized>(
    store: &S,
    config: &ReconConfig,
    tenant: &str,
    record_id: &str,
    as_of: NaiveDate,
) -> Result<Reconciled, ReconError> {
    let ctx = match store.fetch_context(record_id, tenant)? {
        Some(ctx) => ctx,
        None => {
            log::warn!("record not found: {record_id}");
            return Err(ReconError::NotFound {
                record_id: record_id.to_string(),
            });
        }
    };

    let Assessment {
        path,
        value,
        time,
        verdict,
    } = assess(&ctx, config, as_of);

    let reconciled_at = Utc::now();
    store.write_verdict(record_id, tenant, &verdict, reconciled_at)?;
    log::debug!(
        "reconciled {record_id} -> status={} risk={}",
        verdict.status,
        verdict.risk_level
    );

    Ok(Reconciled {
        record_id: record_id.to_string(),
        verdict,
        reconciled_at,
        path,
        value,
        time,
    })
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads; clamped to at least 1 and at most the record count.
    pub workers: usize,
    /// Stop dispatching once this instant passes.
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelToken>,
    /// Reference date for unpaid invoices. Defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            deadline: None,
            cancel: None,
            as_of: None,
        }
    }
}

impl BatchOptions {
    /// Options taken from the `[batch]` config section.
    pub fn from_config(config: &ReconConfig) -> Self {
        Self {
            workers: config.batch.workers,
            deadline: config
                .batch
                .deadline_secs
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
            ..Self::default()
        }
    }

    fn should_stop(&self) -> bool {
        if let Some(ref cancel) = self.cancel {
            if cancel.load(Ordering::SeqCst) {
                return true;
            }
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

enum Outcome {
    Done(Status),
    NotFound,
    Failed,
}

/// Reconcile every record matching `filter` on a bounded worker pool.
///
/// Records are independent, so the final stored state does not depend on the
/// worker count or processing order. A failing record is logged and counted
/// as pending; it never aborts the batch. After cancellation, records not yet
/// started keep whatever verdict they had and are reported as skipped.
pub fn reconcile_all<S: InvoiceStore + ?Sized>(
    store: &S,
    config: &ReconConfig,
    tenant: &str,
    filter: &BatchFilter,
    options: &BatchOptions,
) -> Result<ReconSummary, ReconError> {
    let started = Instant::now();
    let run_at = Utc::now();
    let as_of = options.as_of.unwrap_or_else(|| run_at.date_naive());

    let ids = store.list_record_ids(tenant, filter)?;
    log::info!(
        "starting reconciliation: {} records | counterparty={} | period={} | workers={}",
        ids.len(),
        filter.counterparty.as_deref().unwrap_or("*"),
        filter.period.as_deref().unwrap_or("*"),
        options.workers,
    );

    let mut counts = StatusCounts::default();
    let mut failed = 0;
    let mut processed = 0;

    if !ids.is_empty() {
        let workers = options.workers.clamp(1, ids.len());
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<Outcome>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let ids = &ids;
                scope.spawn(move || loop {
                    if options.should_stop() {
                        break;
                    }
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    let Some(record_id) = ids.get(idx) else {
                        break;
                    };
                    let outcome = run_one(store, config, tenant, record_id, as_of);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                processed += 1;
                match outcome {
                    Outcome::Done(status) => counts.record(status),
                    Outcome::NotFound => counts.record(Status::Pending),
                    Outcome::Failed => {
                        failed += 1;
                        counts.record(Status::Pending);
                    }
                }
            }
        });
    }

    let skipped = ids.len() - processed;
    let duration_ms = (started.elapsed().as_secs_f64() * 1000.0 * 10.0).round() / 10.0;
    if skipped > 0 {
        log::warn!("reconciliation stopped early: {skipped} of {} records skipped", ids.len());
    }
    log::info!(
        "reconciliation complete: {processed} processed in {duration_ms:.1} ms | \
         valid={} warning={} high_risk={} pending={} failed={failed}",
        counts.valid,
        counts.warning,
        counts.high_risk,
        counts.pending,
    );

    Ok(ReconSummary {
        total: ids.len(),
        counts,
        failed,
        skipped,
        cancelled: skipped > 0,
        duration_ms,
        run_at,
    })
}

/// One record's pipeline, with errors and panics folded into an outcome.
fn run_one<S: InvoiceStore + ?Sized>(
    store: &S,
    config: &ReconConfig,
    tenant: &str,
    record_id: &str,
    as_of: NaiveDate,
) -> Outcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        reconcile_invoice(store, config, tenant, record_id, as_of)
    }));
    match result {
        Ok(Ok(reconciled)) => Outcome::Done(reconciled.verdict.status),
        Ok(Err(ReconError::NotFound { .. })) => Outcome::NotFound,
        Ok(Err(err)) => {
            log::error!("reconciliation failed for record {record_id}: {err}");
            Outcome::Failed
        }
        Err(_) => {
            log::error!("reconciliation panicked for record {record_id}");
            Outcome::Failed
        }
    }
}
