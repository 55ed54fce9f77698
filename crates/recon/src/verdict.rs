//! Verdict composition. Combines path, value and timeliness results into a
//! single status, risk level and explanation.
//!
//! Status priority, highest first:
//! - PENDING: no source value from either side and no source filing link.
//! - HIGH_RISK: any high-severity finding.
//! - WARNING: any warning.
//! - VALID: nothing to report.
//!
//! Risk level is derived separately so that a missing issuer or source filing
//! stays HIGH even when status ends up PENDING.

use crate::config::VerdictPolicy;
use crate::model::{
    Finding, PathCheckResult, RiskLevel, Severity, Status, TimeCheckResult, ValueCheckResult,
    Verdict,
};

pub const ALL_CHECKS_PASSED: &str = "All reconciliation checks passed.";
const SEPARATOR: &str = " | ";

/// Compose a verdict. Pure: equal inputs always give equal verdicts.
pub fn compose(
    path: &PathCheckResult,
    value: &ValueCheckResult,
    time: &TimeCheckResult,
    policy: &VerdictPolicy,
) -> Verdict {
    let mut high: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut confirmations: Vec<String> = Vec::new();

    // Paths
    if !path.has_supplier {
        high.push("Issuing taxpayer is not linked (ISSUED_BY missing).".into());
    }
    if !path.has_buyer {
        warnings.push("Receiving taxpayer is not linked (RECEIVED_BY missing).".into());
    }
    if !path.has_source_filing {
        high.push("Invoice not reported in any source filing (REPORTED_IN missing).".into());
    }
    if !path.has_counterpart_filing {
        warnings.push("Invoice not reflected in the buyer's counterpart filing.".into());
    }
    if !path.has_payment {
        warnings.push("No settlement record linked to this invoice (PAID_VIA missing).".into());
    }

    // Values
    let no_source_values = value.missing_primary && value.missing_secondary;
    if no_source_values {
        high.push("No taxable value from any source.".into());
    } else {
        match value.within_tolerance {
            Some(false) => {
                let dev = value.deviation_pct.unwrap_or(0.0);
                let detail = format!(
                    "{dev:.2}% deviation (filed={}, register={})",
                    fmt_amount(value.primary_value),
                    fmt_amount(value.secondary_value),
                );
                if dev > policy.high_risk_value_percent {
                    high.push(format!("Large value mismatch: {detail}."));
                } else {
                    warnings.push(format!("Minor value mismatch: {detail}."));
                }
            }
            Some(true) => {
                let dev = value.deviation_pct.unwrap_or(0.0);
                confirmations.push(format!("Values match (deviation {dev:.2}%)."));
            }
            None => {}
        }
    }
    if value.tax_math_ok == Some(false) {
        warnings.push("Tax components do not reconcile with the declared total value.".into());
    }

    // Timeliness
    if let (Some(false), Some(days)) = (time.filed_on_time, time.days_late) {
        let due = time.due_date.as_deref().unwrap_or("unknown");
        let msg = format!("Source filing submitted {days} days late (due {due}).");
        if days > policy.high_risk_filing_days {
            high.push(msg);
        } else {
            warnings.push(msg);
        }
    }

    let delay = time
        .days_to_payment
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".into());
    if time.is_chronic_delay {
        high.push(format!(
            "Chronic payment delay: {delay} days from invoice date to payment."
        ));
    } else if time.is_payment_delayed {
        warnings.push(format!("Payment delayed: {delay} days from invoice date."));
    }

    let status = if no_source_values && !path.has_source_filing {
        Status::Pending
    } else if !high.is_empty() {
        Status::HighRisk
    } else if !warnings.is_empty() {
        Status::Warning
    } else {
        Status::Valid
    };

    let risk_level =
        if status == Status::HighRisk || !path.has_supplier || !path.has_source_filing {
            RiskLevel::High
        } else if status == Status::Warning
            || !path.has_counterpart_filing
            || time.is_payment_delayed
        {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

    let tagged = |severity: Severity| move |message: String| Finding { severity, message };
    let mut findings: Vec<Finding> =
        Vec::with_capacity(high.len() + warnings.len() + confirmations.len());
    findings.extend(high.into_iter().map(tagged(Severity::High)));
    findings.extend(warnings.into_iter().map(tagged(Severity::Warning)));
    findings.extend(confirmations.into_iter().map(tagged(Severity::Info)));

    let explanation = if findings.is_empty() {
        ALL_CHECKS_PASSED.to_string()
    } else {
        findings
            .iter()
            .map(|f| f.message.as_str())
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    };

    Verdict {
        status,
        risk_level,
        explanation,
        findings,
    }
}

fn fmt_amount(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelinessConfig;
    use crate::model::{InvoiceContext, LinkPresence};
    use crate::paths::check_paths;
    use crate::timing::check_timing;
    use crate::values::check_values;
    use chrono::NaiveDate;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    /// A fully linked, on-time, paid invoice with matching values.
    fn clean() -> InvoiceContext {
        InvoiceContext {
            record_id: "INV-1".into(),
            links: LinkPresence::all(),
            primary_value: Some(100_000.0),
            secondary_value: Some(100_000.0),
            taxable_value: Some(100_000.0),
            central_tax: Some(9_000.0),
            state_tax: Some(9_000.0),
            integrated_tax: Some(0.0),
            total_value: Some(118_000.0),
            invoice_date: Some("2024-04-05".into()),
            filing_period: Some("2024-04".into()),
            filing_date: Some("2024-05-10".into()),
            payment_date: Some("2024-04-20".into()),
            ..InvoiceContext::default()
        }
    }

    fn verdict_for(ctx: &InvoiceContext) -> Verdict {
        let path = check_paths(&ctx.links);
        let value = check_values(ctx, 2.0);
        let time = check_timing(ctx, &TimelinessConfig::default(), as_of());
        compose(&path, &value, &time, &VerdictPolicy::default())
    }

    #[test]
    fn clean_invoice_is_valid_low() {
        let v = verdict_for(&clean());
        assert_eq!(v.status, Status::Valid);
        assert_eq!(v.risk_level, RiskLevel::Low);
        assert_eq!(v.explanation, "Values match (deviation 0.00%).");
        assert_eq!(v.findings.len(), 1);
        assert_eq!(v.findings[0].severity, Severity::Info);
    }

    #[test]
    fn no_findings_uses_all_passed_message() {
        let mut ctx = clean();
        // One side missing: nothing to compare, so no confirmation either.
        ctx.secondary_value = None;
        let path = check_paths(&ctx.links);
        let value = check_values(&ctx, 2.0);
        let time = check_timing(&ctx, &TimelinessConfig::default(), as_of());
        let v = compose(&path, &value, &time, &VerdictPolicy::default());
        assert_eq!(v.status, Status::Valid);
        assert_eq!(v.explanation, ALL_CHECKS_PASSED);
        assert!(v.findings.is_empty());
    }

    #[test]
    fn half_percent_register_drift_is_valid() {
        let mut ctx = clean();
        ctx.secondary_value = Some(100_500.0);
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::Valid);
        assert_eq!(v.risk_level, RiskLevel::Low);
        assert!(v.findings.iter().all(|f| f.severity == Severity::Info));
        assert_eq!(v.explanation, "Values match (deviation 0.50%).");
    }

    #[test]
    fn large_deviation_is_high_risk() {
        let mut ctx = clean();
        ctx.primary_value = Some(115_000.0);
        ctx.taxable_value = Some(115_000.0);
        ctx.total_value = Some(133_000.0);
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::HighRisk);
        assert_eq!(v.risk_level, RiskLevel::High);
        assert!(v.explanation.starts_with("Large value mismatch: 13.04% deviation"));
    }

    #[test]
    fn minor_deviation_is_warning() {
        let mut ctx = clean();
        ctx.primary_value = Some(105_000.0);
        ctx.taxable_value = Some(105_000.0);
        ctx.total_value = Some(123_000.0);
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::Warning);
        assert_eq!(v.risk_level, RiskLevel::Medium);
        assert!(v.explanation.contains("Minor value mismatch: 4.76%"));
    }

    #[test]
    fn fourteen_days_late_is_warning() {
        let mut ctx = clean();
        ctx.filing_date = Some("2024-05-25".into());
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::Warning);
        assert_eq!(v.risk_level, RiskLevel::Medium);
        assert!(v
            .explanation
            .contains("Source filing submitted 14 days late (due 2024-05-11)."));
    }

    #[test]
    fn very_late_filing_is_high_risk() {
        let mut ctx = clean();
        ctx.filing_date = Some("2024-06-20".into());
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::HighRisk);
        assert!(v.explanation.contains("40 days late"));
    }

    #[test]
    fn missing_source_filing_is_always_high_risk_level() {
        let mut ctx = clean();
        ctx.links.source_filing = false;
        let v = verdict_for(&ctx);
        assert_eq!(v.risk_level, RiskLevel::High);
        assert_eq!(v.status, Status::HighRisk);
    }

    #[test]
    fn no_data_at_all_is_pending_but_high_risk_level() {
        let mut ctx = clean();
        ctx.links.source_filing = false;
        ctx.primary_value = None;
        ctx.secondary_value = None;
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::Pending);
        assert_eq!(v.risk_level, RiskLevel::High);
        assert!(v.explanation.contains("No taxable value from any source."));
    }

    #[test]
    fn no_values_with_filing_link_is_high_risk() {
        let mut ctx = clean();
        ctx.primary_value = None;
        ctx.secondary_value = None;
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::HighRisk);
    }

    #[test]
    fn missing_counterpart_filing_is_medium() {
        let mut ctx = clean();
        ctx.links.counterpart_filing = false;
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::Warning);
        assert_eq!(v.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn chronic_delay_is_high_risk() {
        let mut ctx = clean();
        ctx.payment_date = Some("2024-06-25".into());
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::HighRisk);
        assert!(v.explanation.contains("Chronic payment delay: 81 days"));
    }

    #[test]
    fn tax_math_mismatch_is_warning() {
        let mut ctx = clean();
        ctx.total_value = Some(125_000.0);
        let v = verdict_for(&ctx);
        assert_eq!(v.status, Status::Warning);
        assert!(v.explanation.contains("Tax components do not reconcile"));
    }

    #[test]
    fn high_findings_precede_warnings_and_confirmations() {
        let mut ctx = clean();
        ctx.links.buyer = false;
        ctx.links.supplier = false;
        let v = verdict_for(&ctx);
        let severities: Vec<Severity> = v.findings.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Warning, Severity::Info]);
        assert!(v.explanation.starts_with("Issuing taxpayer is not linked"));
        assert_eq!(v.explanation.matches(SEPARATOR).count(), 2);
    }

    #[test]
    fn composition_is_deterministic() {
        let mut ctx = clean();
        ctx.links.payment = false;
        ctx.primary_value = Some(103_000.0);
        let path = check_paths(&ctx.links);
        let value = check_values(&ctx, 2.0);
        let time = check_timing(&ctx, &TimelinessConfig::default(), as_of());
        let a = compose(&path, &value, &time, &VerdictPolicy::default());
        let b = compose(&path, &value, &time, &VerdictPolicy::default());
        assert_eq!(a, b);
    }
}
