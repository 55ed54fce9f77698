use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Which of the five expected relationships exist for an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPresence {
    /// Invoice → issuing taxpayer.
    pub supplier: bool,
    /// Invoice → receiving taxpayer.
    pub buyer: bool,
    /// Invoice → supplier's periodic filing.
    pub source_filing: bool,
    /// Invoice → auto-generated counterpart filing on the buyer side.
    pub counterpart_filing: bool,
    /// Invoice → settlement record.
    pub payment: bool,
}

impl LinkPresence {
    pub fn all() -> Self {
        Self {
            supplier: true,
            buyer: true,
            source_filing: true,
            counterpart_filing: true,
            payment: true,
        }
    }
}

/// Everything the checks need to know about one invoice.
///
/// Assembled fresh for every reconciliation call. Dates and the filing period
/// stay as the raw strings the store holds; the timeliness checker decides
/// whether they parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceContext {
    pub record_id: String,
    pub links: LinkPresence,
    /// Taxable value as reported in the supplier's filing (higher trust).
    pub primary_value: Option<f64>,
    /// Taxable value from the buyer's purchase register.
    pub secondary_value: Option<f64>,
    /// Taxable value registered with the e-invoice portal, when one exists.
    pub certified_value: Option<f64>,
    /// Authoritative taxable value stored on the invoice.
    pub taxable_value: Option<f64>,
    pub central_tax: Option<f64>,
    pub state_tax: Option<f64>,
    pub integrated_tax: Option<f64>,
    pub total_value: Option<f64>,
    pub invoice_date: Option<String>,
    pub filing_period: Option<String>,
    pub filing_date: Option<String>,
    pub payment_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Check results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCheckResult {
    pub has_supplier: bool,
    pub has_buyer: bool,
    pub has_source_filing: bool,
    pub has_counterpart_filing: bool,
    pub has_payment: bool,
    pub missing: Vec<String>,
    pub is_complete: bool,
    /// Number of present links, 0..=5.
    pub coverage_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCheckResult {
    pub primary_value: Option<f64>,
    pub secondary_value: Option<f64>,
    /// primary − secondary.
    pub difference: Option<f64>,
    pub deviation_pct: Option<f64>,
    /// `None` when one side is missing.
    pub within_tolerance: Option<bool>,
    pub missing_primary: bool,
    pub missing_secondary: bool,
    pub tax_math_ok: Option<bool>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeCheckResult {
    pub filing_period: Option<String>,
    pub filing_date: Option<String>,
    pub due_date: Option<String>,
    /// `None` when the deadline or filing date is unknown.
    pub filed_on_time: Option<bool>,
    pub days_late: Option<i64>,
    pub invoice_date: Option<String>,
    pub payment_date: Option<String>,
    pub has_payment: bool,
    pub days_to_payment: Option<i64>,
    pub is_payment_delayed: bool,
    pub is_chronic_delay: bool,
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Valid,
    Warning,
    HighRisk,
    Pending,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Warning => "WARNING",
            Self::HighRisk => "HIGH_RISK",
            Self::Pending => "PENDING",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALID" => Ok(Self::Valid),
            "WARNING" => Ok(Self::Warning),
            "HIGH_RISK" => Ok(Self::HighRisk),
            "PENDING" => Ok(Self::Pending),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Warning,
    Info,
}

/// One human-readable observation behind a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

/// The outcome of composing the three checks. Carries no timestamp, so the
/// same checks always compose to an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: Status,
    pub risk_level: RiskLevel,
    pub explanation: String,
    pub findings: Vec<Finding>,
}

/// A verdict as it sits in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredVerdict {
    pub status: Status,
    pub risk_level: RiskLevel,
    pub explanation: String,
    pub reconciled_at: DateTime<Utc>,
}

/// Full result of reconciling one record.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciled {
    pub record_id: String,
    pub verdict: Verdict,
    pub reconciled_at: DateTime<Utc>,
    pub path: PathCheckResult,
    pub value: ValueCheckResult,
    pub time: TimeCheckResult,
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Narrows which records a batch run touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFilter {
    /// Match records where this taxpayer is supplier or buyer.
    pub counterparty: Option<String>,
    /// Match records reported in a source filing for this period.
    pub period: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub warning: usize,
    pub high_risk: usize,
    pub pending: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        self.add(status, 1);
    }

    /// Count `n` records with the same status.
    pub fn add(&mut self, status: Status, n: usize) {
        match status {
            Status::Valid => self.valid += n,
            Status::Warning => self.warning += n,
            Status::HighRisk => self.high_risk += n,
            Status::Pending => self.pending += n,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.warning + self.high_risk + self.pending
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    /// Records selected for the run.
    pub total: usize,
    pub counts: StatusCounts,
    /// Records whose pipeline errored (also counted as pending).
    pub failed: usize,
    /// Records left untouched because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
    pub duration_ms: f64,
    pub run_at: DateTime<Utc>,
}
