//! `tgraph patterns`: fraud pattern detectors over the whole tenant graph.

use chrono::{NaiveDate, Utc};
use clap::ValueEnum;
use serde::Serialize;

use taxgraph_patterns::{amendment, circular, delay, detect_all, network};
use taxgraph_patterns::{
    AmendmentChain, CircularTrade, DetectorReport, DetectorStatus, PaymentDelay, RiskNetwork,
};

use crate::{print_json, CliError, Global};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PatternKind {
    /// Two- and three-party invoicing loops
    Circular,
    /// Taxpayers paid well past the grace period
    Delay,
    /// Invoices amended again and again
    Amendment,
    /// Taxpayers trading mostly with high-risk partners
    Network,
}

pub fn cmd_patterns(
    global: &Global,
    kind: Option<PatternKind>,
    min_delayed: Option<usize>,
    as_of: Option<NaiveDate>,
) -> Result<(), CliError> {
    let mut config = global.load_config()?;
    if let Some(min) = min_delayed {
        if min == 0 {
            return Err(CliError::args("--min-delayed must be at least 1"));
        }
        config.patterns.min_delayed_transactions = min;
    }
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let tenant = global.tenant.as_str();

    let store = global.open_store()?;
    let result = match kind {
        None => {
            let summary = detect_all(&store, &config, tenant, as_of);
            if global.json {
                print_json(&summary)?;
            } else {
                report("circular trades", &summary.circular_trades, |f: &CircularTrade| {
                    format!(
                        "{} {} ({} invoices)",
                        f.cycle_id,
                        f.participants.join(" -> "),
                        f.transaction_ids.len()
                    )
                });
                report("payment delays", &summary.payment_delays, delay_line);
                report("amendment chains", &summary.amendment_chains, amendment_line);
                report("risk networks", &summary.risk_networks, network_line);
                eprintln!("{} patterns total", summary.total_patterns);
            }
            let failed = [
                &summary.circular_trades.status,
                &summary.payment_delays.status,
                &summary.amendment_chains.status,
                &summary.risk_networks.status,
            ]
            .into_iter()
            .filter(|s| matches!(s, DetectorStatus::Unavailable { .. }))
            .count();
            if failed > 0 {
                Err(CliError::store(format!("{failed} of 4 detectors could not read the store")))
            } else {
                Ok(())
            }
        }
        Some(PatternKind::Circular) => {
            let r = circular::detect(&store, tenant);
            emit(global, "circular trades", &r, |f: &CircularTrade| {
                format!("{} {}", f.cycle_id, f.participants.join(" -> "))
            })
        }
        Some(PatternKind::Delay) => {
            let r = delay::detect(&store, tenant, &config.timeliness, &config.patterns, as_of);
            emit(global, "payment delays", &r, delay_line)
        }
        Some(PatternKind::Amendment) => {
            let r = amendment::detect(&store, tenant, &config.patterns);
            emit(global, "amendment chains", &r, amendment_line)
        }
        Some(PatternKind::Network) => {
            let r = network::detect(&store, tenant, &config.patterns);
            emit(global, "risk networks", &r, network_line)
        }
    };
    store.close()?;
    result
}

fn delay_line(f: &PaymentDelay) -> String {
    format!(
        "{} avg {:.1}d, max {:.1}d over {} invoices [{}]",
        f.entity, f.avg_delay_days, f.max_delay_days, f.affected_transactions, f.risk_level
    )
}

fn amendment_line(f: &AmendmentChain) -> String {
    format!(
        "{} {} chains, depth {}{} [{}]",
        f.entity,
        f.chain_count,
        f.max_depth,
        if f.depth_capped { "+" } else { "" },
        f.risk_level
    )
}

fn network_line(f: &RiskNetwork) -> String {
    format!(
        "{} {}/{} risky partners ({:.1}%) [{}]",
        f.entity,
        f.risky_partners,
        f.total_partners,
        f.ratio * 100.0,
        f.risk_level
    )
}

/// Single-detector output. A detector that couldn't read the store fails the
/// command; `NotReady` is reported but is not an error.
fn emit<T: Serialize>(
    global: &Global,
    title: &str,
    detector: &DetectorReport<T>,
    line: impl Fn(&T) -> String,
) -> Result<(), CliError> {
    if global.json {
        print_json(detector)?;
    } else {
        report(title, detector, line);
    }
    if let DetectorStatus::Unavailable { error } = &detector.status {
        return Err(CliError::store(format!("{title} detector failed: {error}")));
    }
    Ok(())
}

fn report<T>(title: &str, report: &DetectorReport<T>, line: impl Fn(&T) -> String) {
    match &report.status {
        DetectorStatus::Complete => {
            eprintln!("{title}: {}", report.findings.len());
            for f in &report.findings {
                eprintln!("  {}", line(f));
            }
        }
        DetectorStatus::NotReady { reason } => eprintln!("{title}: not ready ({reason})"),
        DetectorStatus::Unavailable { error } => eprintln!("{title}: unavailable ({error})"),
    }
}
