//! Payment delay: taxpayers whose invoices sit unpaid well past the grace
//! period.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use taxgraph_recon::config::{PatternConfig, TimelinessConfig};
use taxgraph_recon::timing::{days_between, parse_date};
use taxgraph_recon::RiskLevel;

use crate::model::{round_to, DetectorReport, PaymentDelay, SettlementRow};
use crate::source::PatternSource;

pub fn detect(
    source: &dyn PatternSource,
    tenant: &str,
    timeliness: &TimelinessConfig,
    patterns: &PatternConfig,
    as_of: NaiveDate,
) -> DetectorReport<PaymentDelay> {
    match source.settlement_rows(tenant) {
        Ok(rows) => {
            let findings = find_delays(&rows, timeliness, patterns.min_delayed_transactions, as_of);
            log::info!(
                "payment delay scan: {} invoices, {} flagged taxpayers",
                rows.len(),
                findings.len()
            );
            DetectorReport::complete(findings)
        }
        Err(err) => {
            log::error!("payment delay scan failed: {err}");
            DetectorReport::unavailable(err)
        }
    }
}

/// Group positive delays by issuer and flag those beyond the grace period.
///
/// Unpaid invoices count their delay up to `as_of`. Rows with an unparseable
/// date are skipped. Sorted by average delay, worst first.
pub fn find_delays(
    rows: &[SettlementRow],
    timeliness: &TimelinessConfig,
    min_delayed: usize,
    as_of: NaiveDate,
) -> Vec<PaymentDelay> {
    let mut by_issuer: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for row in rows {
        let Some(invoiced) = row.invoice_date.as_deref().and_then(parse_date) else {
            continue;
        };
        let settled = match row.payment_date.as_deref() {
            Some(raw) => match parse_date(raw) {
                Some(d) => d,
                None => continue,
            },
            None => as_of,
        };
        let delay = days_between(invoiced, settled);
        if delay > 0 {
            by_issuer.entry(row.issuer.as_str()).or_default().push(delay);
        }
    }

    let grace = f64::from(timeliness.grace_days);
    let chronic = f64::from(timeliness.chronic_days);

    let mut findings: Vec<PaymentDelay> = by_issuer
        .into_iter()
        .filter(|(_, delays)| delays.len() >= min_delayed.max(1))
        .filter_map(|(entity, delays)| {
            let count = delays.len();
            let max = delays.iter().copied().max().unwrap_or(0) as f64;
            let avg = delays.iter().sum::<i64>() as f64 / count as f64;
            if avg <= grace && max <= grace {
                return None;
            }
            let risk_level = if avg > chronic || max > chronic {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            Some(PaymentDelay {
                entity: entity.to_string(),
                avg_delay_days: round_to(avg, 1),
                max_delay_days: round_to(max, 1),
                affected_transactions: count,
                risk_level,
            })
        })
        .collect();

    findings.sort_by(|a, b| {
        b.avg_delay_days
            .total_cmp(&a.avg_delay_days)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tx: &str, issuer: &str, invoiced: &str, paid: Option<&str>) -> SettlementRow {
        SettlementRow {
            transaction_id: tx.into(),
            issuer: issuer.into(),
            invoice_date: Some(invoiced.into()),
            payment_date: paid.map(Into::into),
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[test]
    fn prompt_payer_is_not_flagged() {
        let rows = vec![
            row("T1", "S1", "2024-01-01", Some("2024-01-20")),
            row("T2", "S1", "2024-02-01", Some("2024-02-10")),
        ];
        assert!(find_delays(&rows, &TimelinessConfig::default(), 1, as_of()).is_empty());
    }

    #[test]
    fn slow_payer_is_flagged_high() {
        let rows = vec![
            row("T1", "S1", "2024-01-01", Some("2024-04-01")),
            row("T2", "S1", "2024-02-01", Some("2024-02-11")),
        ];
        let found = find_delays(&rows, &TimelinessConfig::default(), 1, as_of());
        assert_eq!(found.len(), 1);
        let f = &found[0];
        assert_eq!(f.entity, "S1");
        assert_eq!(f.max_delay_days, 91.0);
        assert_eq!(f.avg_delay_days, 50.5);
        assert_eq!(f.affected_transactions, 2);
        assert_eq!(f.risk_level, RiskLevel::High);
    }

    #[test]
    fn unpaid_invoice_accrues_until_as_of() {
        let rows = vec![row("T1", "S1", "2024-10-01", None)];
        let found = find_delays(&rows, &TimelinessConfig::default(), 1, as_of());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].max_delay_days, 91.0);
    }

    #[test]
    fn medium_when_over_grace_but_under_chronic() {
        let timeliness = TimelinessConfig {
            grace_days: 30,
            chronic_days: 90,
            ..TimelinessConfig::default()
        };
        let rows = vec![row("T1", "S1", "2024-01-01", Some("2024-02-15"))];
        let found = find_delays(&rows, &timeliness, 1, as_of());
        assert_eq!(found[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn minimum_count_applies() {
        let rows = vec![row("T1", "S1", "2024-01-01", Some("2024-06-01"))];
        assert!(find_delays(&rows, &TimelinessConfig::default(), 2, as_of()).is_empty());
    }

    #[test]
    fn bad_dates_and_prepayments_are_ignored() {
        let rows = vec![
            row("T1", "S1", "not-a-date", Some("2024-06-01")),
            row("T2", "S1", "2024-06-01", Some("2024-05-01")),
            row("T3", "S1", "2024-01-01", Some("garbage")),
        ];
        assert!(find_delays(&rows, &TimelinessConfig::default(), 1, as_of()).is_empty());
    }

    #[test]
    fn worst_average_first() {
        let rows = vec![
            row("T1", "S1", "2024-01-01", Some("2024-04-01")),
            row("T2", "S2", "2024-01-01", Some("2024-07-01")),
        ];
        let found = find_delays(&rows, &TimelinessConfig::default(), 1, as_of());
        let order: Vec<&str> = found.iter().map(|f| f.entity.as_str()).collect();
        assert_eq!(order, vec!["S2", "S1"]);
    }
}
