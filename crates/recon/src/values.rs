//! Cross-source taxable value comparison.
//!
//! Trust hierarchy, highest first: certified e-invoice value, supplier's
//! filed value (primary), buyer's purchase register (secondary). The
//! comparison below only ever looks at primary vs. secondary; the hierarchy
//! picks the value that gets stored on the invoice.

use crate::model::{InvoiceContext, ValueCheckResult};

/// Rounding allowance when checking taxable + taxes against the declared total.
pub const TAX_ROUNDING_ALLOWANCE: f64 = 1.0;

/// First usable value down the trust hierarchy.
///
/// Negative or non-finite values are treated as absent.
pub fn authoritative_value(
    certified: Option<f64>,
    primary: Option<f64>,
    secondary: Option<f64>,
) -> Option<f64> {
    [certified, primary, secondary]
        .into_iter()
        .flatten()
        .find(|v| v.is_finite() && *v >= 0.0)
}

/// Compare the two source values against `tolerance_pct` and check tax arithmetic.
pub fn check_values(ctx: &InvoiceContext, tolerance_pct: f64) -> ValueCheckResult {
    let primary = ctx.primary_value.filter(|v| v.is_finite());
    let secondary = ctx.secondary_value.filter(|v| v.is_finite());

    let (difference, deviation_pct, within_tolerance, message) = match (primary, secondary) {
        (Some(p), Some(s)) => {
            let difference = p - s;
            let base = if p != 0.0 { p } else { s };
            let deviation = if base != 0.0 {
                difference.abs() / base.abs() * 100.0
            } else {
                0.0
            };
            let deviation = round_to(deviation, 4);
            let within = deviation <= tolerance_pct;
            let message = if within {
                format!(
                    "Values match within {tolerance_pct}% tolerance (deviation: {deviation:.2}%)."
                )
            } else {
                format!(
                    "Value mismatch: filed={p:.2}, register={s:.2} \
                     ({deviation:.2}% deviation, threshold={tolerance_pct}%)."
                )
            };
            (Some(difference), Some(deviation), Some(within), message)
        }
        (None, None) => (
            None,
            None,
            None,
            "Both source-filing and purchase-register taxable values are absent.".to_string(),
        ),
        (None, Some(_)) => (
            None,
            None,
            None,
            "Source-filing taxable value is missing; cannot cross-check with the purchase register."
                .to_string(),
        ),
        (Some(_), None) => (
            None,
            None,
            None,
            "Purchase-register taxable value is missing; cannot cross-check with the source filing."
                .to_string(),
        ),
    };

    ValueCheckResult {
        primary_value: primary,
        secondary_value: secondary,
        difference,
        deviation_pct,
        within_tolerance,
        missing_primary: primary.is_none(),
        missing_secondary: secondary.is_none(),
        tax_math_ok: check_tax_math(ctx, primary, secondary),
        message,
    }
}

/// `None` whenever an operand is missing or the taxable value is zero.
fn check_tax_math(
    ctx: &InvoiceContext,
    primary: Option<f64>,
    secondary: Option<f64>,
) -> Option<bool> {
    let taxable = ctx.taxable_value.or(primary).or(secondary)?;
    if taxable == 0.0 {
        return None;
    }
    let taxes = ctx.central_tax? + ctx.state_tax? + ctx.integrated_tax?;
    let total = ctx.total_value?;
    Some((taxable + taxes - total).abs() <= TAX_ROUNDING_ALLOWANCE)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
