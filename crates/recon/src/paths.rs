//! Which expected relationships an invoice has in the trading graph.

use crate::model::{LinkPresence, PathCheckResult};

pub const ISSUED_BY: &str = "ISSUED_BY";
pub const RECEIVED_BY: &str = "RECEIVED_BY";
pub const REPORTED_IN: &str = "REPORTED_IN (source filing)";
pub const REFLECTED_IN: &str = "REFLECTED_IN (counterpart filing)";
pub const PAID_VIA: &str = "PAID_VIA (settlement)";

/// Check the five expected links, in fixed order.
pub fn check_paths(links: &LinkPresence) -> PathCheckResult {
    let checks = [
        (links.supplier, ISSUED_BY),
        (links.buyer, RECEIVED_BY),
        (links.source_filing, REPORTED_IN),
        (links.counterpart_filing, REFLECTED_IN),
        (links.payment, PAID_VIA),
    ];

    let missing: Vec<String> = checks
        .iter()
        .filter(|(present, _)| !present)
        .map(|(_, name)| name.to_string())
        .collect();

    let coverage_score = (checks.len() - missing.len()) as u8;

    PathCheckResult {
        has_supplier: links.supplier,
        has_buyer: links.buyer,
        has_source_filing: links.source_filing,
        has_counterpart_filing: links.counterpart_filing,
        has_payment: links.payment,
        is_complete: missing.is_empty(),
        missing,
        coverage_score,
    }
}
