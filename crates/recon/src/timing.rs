//! Filing and payment timeliness.
//!
//! Monthly filers owe the source filing on a fixed day of the month after the
//! tax period. Payment delay is measured from the invoice date; an invoice
//! with no settlement keeps accruing delay against the `as_of` date.

use chrono::NaiveDate;

use crate::config::TimelinessConfig;
use crate::model::{InvoiceContext, TimeCheckResult};

/// Parse a `YYYY-MM-DD` date from the first ten characters of `raw`.
///
/// Timestamps like `2024-05-25T10:00:00Z` parse to their date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            log::debug!("could not parse date: {raw:?}");
            None
        }
    }
}

/// Parse a tax period into (year, month). Accepts `YYYY-MM` and `MMYYYY`.
pub fn parse_tax_period(raw: &str) -> Option<(i32, u32)> {
    let raw = raw.trim();
    let (year, month) = if let Some((y, m)) = raw.split_once('-') {
        (y, m)
    } else if raw.len() == 6 && raw.is_ascii() {
        (&raw[2..], &raw[..2])
    } else {
        return None;
    };

    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
        return None;
    }
    Some((year, month))
}

/// The filing deadline for `period`: `due_day` of the following month.
pub fn filing_due_date(period: &str, due_day: u32) -> Option<NaiveDate> {
    let (year, month) = parse_tax_period(period)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, due_day)
}

/// Assess filing and payment timeliness for one invoice.
pub fn check_timing(
    ctx: &InvoiceContext,
    config: &TimelinessConfig,
    as_of: NaiveDate,
) -> TimeCheckResult {
    let due_date = ctx
        .filing_period
        .as_deref()
        .and_then(|p| filing_due_date(p, config.filing_due_day));
    let filing_date = ctx.filing_date.as_deref().and_then(parse_date);

    let (filed_on_time, days_late) = match (due_date, filing_date) {
        (Some(due), Some(filed)) => {
            let delta = (filed - due).num_days();
            (Some(delta <= 0), Some(delta.max(0)))
        }
        _ => (None, None),
    };

    let invoice_date = ctx.invoice_date.as_deref().and_then(parse_date);
    let has_payment = ctx.links.payment;

    let days_to_payment = match invoice_date {
        Some(invoiced) if has_payment => ctx
            .payment_date
            .as_deref()
            .and_then(parse_date)
            .map(|paid| days_between(invoiced, paid)),
        Some(invoiced) => Some(days_between(invoiced, as_of)),
        None => None,
    };

    let is_payment_delayed = days_to_payment.is_some_and(|d| d > i64::from(config.grace_days));
    let is_chronic_delay = days_to_payment.is_some_and(|d| d > i64::from(config.chronic_days));

    TimeCheckResult {
        filing_period: ctx.filing_period.clone(),
        filing_date: ctx.filing_date.clone(),
        due_date: due_date.map(|d| d.to_string()),
        filed_on_time,
        days_late,
        invoice_date: ctx.invoice_date.clone(),
        payment_date: ctx.payment_date.clone(),
        has_payment,
        days_to_payment,
        is_payment_delayed,
        is_chronic_delay,
    }
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkPresence;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ctx() -> InvoiceContext {
        InvoiceContext {
            record_id: "INV-1".into(),
            links: LinkPresence::all(),
            ..InvoiceContext::default()
        }
    }

    #[test]
    fn parses_both_period_formats() {
        assert_eq!(parse_tax_period("2024-04"), Some((2024, 4)));
        assert_eq!(parse_tax_period("042024"), Some((2024, 4)));
        assert_eq!(parse_tax_period("13-2024"), None);
        assert_eq!(parse_tax_period("2024-13"), None);
        assert_eq!(parse_tax_period("April"), None);
        assert_eq!(parse_tax_period(""), None);
    }

    #[test]
    fn due_date_rolls_over_year() {
        assert_eq!(filing_due_date("2024-04", 11), Some(d("2024-05-11")));
        assert_eq!(filing_due_date("122023", 11), Some(d("2024-01-11")));
        assert_eq!(filing_due_date("garbage", 11), None);
    }

    #[test]
    fn parse_date_takes_date_prefix() {
        assert_eq!(parse_date("2024-05-25T10:30:00Z"), Some(d("2024-05-25")));
        assert_eq!(parse_date("25/05/2024"), None);
        assert_eq!(parse_date("2024-5-1"), None);
    }

    #[test]
    fn late_filing_counts_days() {
        let mut c = ctx();
        c.filing_period = Some("2024-04".into());
        c.filing_date = Some("2024-05-25".into());
        let res = check_timing(&c, &TimelinessConfig::default(), d("2024-06-01"));
        assert_eq!(res.due_date.as_deref(), Some("2024-05-11"));
        assert_eq!(res.filed_on_time, Some(false));
        assert_eq!(res.days_late, Some(14));
    }

    #[test]
    fn early_filing_is_on_time_with_zero_days_late() {
        let mut c = ctx();
        c.filing_period = Some("042024".into());
        c.filing_date = Some("2024-05-02".into());
        let res = check_timing(&c, &TimelinessConfig::default(), d("2024-06-01"));
        assert_eq!(res.filed_on_time, Some(true));
        assert_eq!(res.days_late, Some(0));
    }

    #[test]
    fn unparsable_filing_date_cannot_be_assessed() {
        let mut c = ctx();
        c.filing_period = Some("2024-04".into());
        c.filing_date = Some("not a date".into());
        let res = check_timing(&c, &TimelinessConfig::default(), d("2024-06-01"));
        assert_eq!(res.filed_on_time, None);
        assert_eq!(res.days_late, None);
        assert_eq!(res.due_date.as_deref(), Some("2024-05-11"));
    }

    #[test]
    fn payment_delay_thresholds() {
        let config = TimelinessConfig {
            grace_days: 30,
            chronic_days: 90,
            filing_due_day: 11,
        };
        let mut c = ctx();
        c.invoice_date = Some("2024-01-01".into());

        c.payment_date = Some("2024-01-20".into());
        let res = check_timing(&c, &config, d("2024-12-31"));
        assert_eq!(res.days_to_payment, Some(19));
        assert!(!res.is_payment_delayed);
        assert!(!res.is_chronic_delay);

        c.payment_date = Some("2024-02-15".into());
        let res = check_timing(&c, &config, d("2024-12-31"));
        assert_eq!(res.days_to_payment, Some(45));
        assert!(res.is_payment_delayed);
        assert!(!res.is_chronic_delay);

        c.payment_date = Some("2024-06-01".into());
        let res = check_timing(&c, &config, d("2024-12-31"));
        assert!(res.is_payment_delayed);
        assert!(res.is_chronic_delay);
    }

    #[test]
    fn unpaid_invoice_accrues_delay_against_as_of() {
        let mut c = ctx();
        c.links.payment = false;
        c.invoice_date = Some("2024-01-01".into());
        let res = check_timing(&c, &TimelinessConfig::default(), d("2024-01-31"));
        assert!(!res.has_payment);
        assert_eq!(res.days_to_payment, Some(30));
        assert!(!res.is_payment_delayed);

        let res = check_timing(&c, &TimelinessConfig::default(), d("2024-04-01"));
        assert_eq!(res.days_to_payment, Some(91));
        assert!(res.is_payment_delayed);
        assert!(res.is_chronic_delay);
    }

    #[test]
    fn linked_payment_without_date_is_unknown() {
        let mut c = ctx();
        c.invoice_date = Some("2024-01-01".into());
        c.payment_date = None;
        let res = check_timing(&c, &TimelinessConfig::default(), d("2025-01-01"));
        assert_eq!(res.days_to_payment, None);
        assert!(!res.is_payment_delayed);
    }
}
