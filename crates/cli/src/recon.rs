//! `tgraph reconcile`, `reconcile-all` and `stats`.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use taxgraph_recon::engine::{reconcile_all, reconcile_invoice, BatchOptions};
use taxgraph_recon::model::{BatchFilter, StatusCounts};
use taxgraph_recon::Status;

use crate::exit_codes::EXIT_HIGH_RISK;
use crate::{print_json, CliError, Global};

pub struct BatchArgs {
    pub gstin: Option<String>,
    pub period: Option<String>,
    pub limit: Option<usize>,
    pub workers: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub strict: bool,
    pub as_of: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn cmd_reconcile(
    global: &Global,
    record_id: &str,
    strict: bool,
    as_of: Option<NaiveDate>,
) -> Result<(), CliError> {
    let config = global.load_config()?;
    let store = global.open_store()?;

    let result = reconcile_invoice(
        &store,
        &config,
        &global.tenant,
        record_id,
        as_of.unwrap_or_else(today),
    )?;
    store.close()?;

    if global.json {
        print_json(&result)?;
    } else {
        let v = &result.verdict;
        eprintln!("{}: {} (risk {})", result.record_id, v.status, v.risk_level);
        eprintln!(
            "links: {}/5{}",
            result.path.coverage_score,
            if result.path.missing.is_empty() {
                String::new()
            } else {
                format!(", missing {}", result.path.missing.join(", "))
            }
        );
        for finding in &v.findings {
            eprintln!("  - {}", finding.message);
        }
    }

    if strict && result.verdict.status == Status::HighRisk {
        return Err(CliError::new(EXIT_HIGH_RISK, "verdict is HIGH_RISK"));
    }
    Ok(())
}

pub fn cmd_reconcile_all(global: &Global, args: BatchArgs) -> Result<(), CliError> {
    let mut config = global.load_config()?;
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError::args("--workers must be at least 1"));
        }
        config.batch.workers = workers;
    }
    if args.deadline_secs.is_some() {
        config.batch.deadline_secs = args.deadline_secs;
    }

    let filter = BatchFilter {
        counterparty: args.gstin,
        period: args.period,
        limit: args.limit,
    };
    let options = BatchOptions {
        as_of: Some(args.as_of.unwrap_or_else(today)),
        ..BatchOptions::from_config(&config)
    };

    let store = global.open_store()?;
    let summary = reconcile_all(&store, &config, &global.tenant, &filter, &options)?;
    store.close()?;

    if global.json {
        print_json(&summary)?;
    } else {
        let c = &summary.counts;
        eprintln!(
            "{} invoices in {:.1} ms: {} valid, {} warning, {} high risk, {} pending",
            summary.total, summary.duration_ms, c.valid, c.warning, c.high_risk, c.pending,
        );
        if summary.failed > 0 {
            eprintln!("{} invoices failed and were counted as pending", summary.failed);
        }
        if summary.cancelled {
            eprintln!("deadline reached: {} invoices not processed", summary.skipped);
        }
    }

    if args.strict && summary.counts.high_risk > 0 {
        return Err(CliError::new(
            EXIT_HIGH_RISK,
            format!("{} invoices are HIGH_RISK", summary.counts.high_risk),
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    tenant: &'a str,
    total: usize,
    counts: StatusCounts,
}

pub fn cmd_stats(global: &Global) -> Result<(), CliError> {
    let store = global.open_store()?;
    let counts = store.status_counts(&global.tenant)?;
    store.close()?;

    let out = StatsOutput {
        tenant: &global.tenant,
        total: counts.total(),
        counts,
    };
    if global.json {
        print_json(&out)?;
    } else {
        let c = &out.counts;
        eprintln!("tenant {}: {} invoices", out.tenant, out.total);
        eprintln!("  VALID      {}", c.valid);
        eprintln!("  WARNING    {}", c.warning);
        eprintln!("  HIGH_RISK  {}", c.high_risk);
        eprintln!("  PENDING    {}", c.pending);
    }
    Ok(())
}
