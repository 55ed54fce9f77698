use serde::Serialize;

use taxgraph_recon::RiskLevel;

// ---------------------------------------------------------------------------
// Rows read from the graph
// ---------------------------------------------------------------------------

/// One invoice seen as a directed trading edge, issuer → receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEdge {
    pub transaction_id: String,
    pub issuer: String,
    pub receiver: String,
    pub period: Option<String>,
}

/// An invoice with its issue date and, when settled, its payment date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRow {
    pub transaction_id: String,
    pub issuer: String,
    pub invoice_date: Option<String>,
    pub payment_date: Option<String>,
}

/// `transaction_id` amends `amends`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendmentLink {
    pub transaction_id: String,
    pub amends: String,
    /// Issuer of the amending invoice.
    pub issuer: Option<String>,
}

/// A taxpayer and its external risk classification, if one has been assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRisk {
    pub entity: String,
    pub risk_level: Option<RiskLevel>,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircularTrade {
    /// Stable id derived from the participant set.
    pub cycle_id: String,
    /// Participants in trading order, starting from the smallest id.
    pub participants: Vec<String>,
    /// Every invoice that evidences the loop, sorted.
    pub transaction_ids: Vec<String>,
    pub period: Option<String>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentDelay {
    pub entity: String,
    pub avg_delay_days: f64,
    pub max_delay_days: f64,
    pub affected_transactions: usize,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmendmentChain {
    pub entity: String,
    /// Distinct original invoices with at least one amendment.
    pub chain_count: usize,
    pub max_depth: usize,
    /// Set when some chain continued past the configured depth limit.
    pub depth_capped: bool,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskNetwork {
    pub entity: String,
    pub total_partners: usize,
    pub risky_partners: usize,
    pub ratio: f64,
    pub risk_level: RiskLevel,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Whether a detector ran, and if not, why.
///
/// An empty finding list only means "nothing found" when the status is
/// `Complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorStatus {
    Complete,
    /// Prerequisite data has not been loaded yet.
    NotReady { reason: String },
    /// The store failed while the detector was reading.
    Unavailable { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorReport<T> {
    #[serde(flatten)]
    pub status: DetectorStatus,
    pub findings: Vec<T>,
}

impl<T> DetectorReport<T> {
    pub fn complete(findings: Vec<T>) -> Self {
        Self {
            status: DetectorStatus::Complete,
            findings,
        }
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self {
            status: DetectorStatus::NotReady {
                reason: reason.into(),
            },
            findings: Vec::new(),
        }
    }

    pub fn unavailable(error: impl ToString) -> Self {
        Self {
            status: DetectorStatus::Unavailable {
                error: error.to_string(),
            },
            findings: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DetectorStatus::Complete
    }
}

/// All four detectors' reports from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSummary {
    pub circular_trades: DetectorReport<CircularTrade>,
    pub payment_delays: DetectorReport<PaymentDelay>,
    pub amendment_chains: DetectorReport<AmendmentChain>,
    pub risk_networks: DetectorReport<RiskNetwork>,
    /// Findings across every detector that completed.
    pub total_patterns: usize,
}

impl PatternSummary {
    pub fn new(
        circular_trades: DetectorReport<CircularTrade>,
        payment_delays: DetectorReport<PaymentDelay>,
        amendment_chains: DetectorReport<AmendmentChain>,
        risk_networks: DetectorReport<RiskNetwork>,
    ) -> Self {
        let total_patterns = circular_trades.findings.len()
            + payment_delays.findings.len()
            + amendment_chains.findings.len()
            + risk_networks.findings.len();
        Self {
            circular_trades,
            payment_delays,
            amendment_chains,
            risk_networks,
            total_patterns,
        }
    }
}

/// Round to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
