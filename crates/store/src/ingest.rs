use rusqlite::params;

use taxgraph_recon::values::authoritative_value;
use taxgraph_recon::{RiskLevel, StoreError};

use crate::{write_err, SqliteGraphStore};

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NewTaxpayer {
    pub gstin: String,
    pub name: Option<String>,
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Clone, Default)]
pub struct NewInvoice {
    pub invoice_id: String,
    pub supplier: Option<String>,
    pub buyer: Option<String>,
    pub invoice_date: Option<String>,
    /// Value in the supplier's filing.
    pub primary_value: Option<f64>,
    /// Value in the buyer's purchase register.
    pub secondary_value: Option<f64>,
    /// Value certified by the e-invoice portal.
    pub certified_value: Option<f64>,
    pub central_tax: Option<f64>,
    pub state_tax: Option<f64>,
    pub integrated_tax: Option<f64>,
    pub total_value: Option<f64>,
    /// The invoice this one amends.
    pub amends: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilingKind {
    /// The supplier's own periodic return.
    Source,
    /// Auto-generated on the buyer's side from suppliers' returns.
    Counterpart,
}

impl FilingKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Counterpart => "counterpart",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewFiling {
    pub filing_id: String,
    pub gstin: String,
    /// `YYYY-MM` or `MMYYYY`.
    pub period: String,
    pub filing_date: Option<String>,
    pub kind: FilingKind,
}

#[derive(Debug, Clone, Default)]
pub struct NewPayment {
    pub payment_id: String,
    pub invoice_id: String,
    pub payment_date: Option<String>,
    pub amount: Option<f64>,
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

impl SqliteGraphStore {
    /// Insert or update a taxpayer. An existing classification survives an
    /// update that carries none.
    pub fn upsert_taxpayer(&self, tenant: &str, taxpayer: &NewTaxpayer) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO taxpayers (tenant, gstin, name, risk_level) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (tenant, gstin) DO UPDATE SET
                     name = COALESCE(excluded.name, taxpayers.name),
                     risk_level = COALESCE(excluded.risk_level, taxpayers.risk_level)",
                params![
                    tenant,
                    &taxpayer.gstin,
                    &taxpayer.name,
                    taxpayer.risk_level.map(|r| r.as_str()),
                ],
            )
            .map_err(write_err)?;
            Ok(())
        })
    }

    /// Set or clear a taxpayer's external risk classification.
    pub fn set_risk_level(
        &self,
        tenant: &str,
        gstin: &str,
        risk_level: Option<RiskLevel>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE taxpayers SET risk_level = ?3 WHERE tenant = ?1 AND gstin = ?2",
                    params![tenant, gstin, risk_level.map(|r| r.as_str())],
                )
                .map_err(write_err)?;
            if changed == 0 {
                return Err(StoreError::Write(format!("unknown taxpayer: {gstin}")));
            }
            Ok(())
        })
    }

    /// Insert or update an invoice's source data.
    ///
    /// The stored taxable value is picked down the trust hierarchy. Verdict
    /// columns are left alone on update.
    pub fn upsert_invoice(&self, tenant: &str, invoice: &NewInvoice) -> Result<(), StoreError> {
        let taxable = authoritative_value(
            invoice.certified_value,
            invoice.primary_value,
            invoice.secondary_value,
        );
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO invoices (
                     tenant, invoice_id, supplier_gstin, buyer_gstin, invoice_date,
                     primary_value, secondary_value, certified_value, taxable_value,
                     central_tax, state_tax, integrated_tax, total_value, amends
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT (tenant, invoice_id) DO UPDATE SET
                     supplier_gstin = excluded.supplier_gstin,
                     buyer_gstin = excluded.buyer_gstin,
                     invoice_date = excluded.invoice_date,
                     primary_value = excluded.primary_value,
                     secondary_value = excluded.secondary_value,
                     certified_value = excluded.certified_value,
                     taxable_value = excluded.taxable_value,
                     central_tax = excluded.central_tax,
                     state_tax = excluded.state_tax,
                     integrated_tax = excluded.integrated_tax,
                     total_value = excluded.total_value,
                     amends = excluded.amends",
                params![
                    tenant,
                    &invoice.invoice_id,
                    &invoice.supplier,
                    &invoice.buyer,
                    &invoice.invoice_date,
                    invoice.primary_value,
                    invoice.secondary_value,
                    invoice.certified_value,
                    taxable,
                    invoice.central_tax,
                    invoice.state_tax,
                    invoice.integrated_tax,
                    invoice.total_value,
                    &invoice.amends,
                ],
            )
            .map_err(write_err)?;
            Ok(())
        })
    }

    pub fn upsert_filing(&self, tenant: &str, filing: &NewFiling) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO filings (tenant, filing_id, gstin, period, filing_date, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (tenant, filing_id) DO UPDATE SET
                     gstin = excluded.gstin,
                     period = excluded.period,
                     filing_date = excluded.filing_date,
                     kind = excluded.kind",
                params![
                    tenant,
                    &filing.filing_id,
                    &filing.gstin,
                    &filing.period,
                    &filing.filing_date,
                    filing.kind.as_str(),
                ],
            )
            .map_err(write_err)?;
            Ok(())
        })
    }

    /// Record that `invoice_id` appears in `filing_id`. Whether this is a
    /// source report or a counterpart reflection follows the filing's kind.
    pub fn link_filing(
        &self,
        tenant: &str,
        filing_id: &str,
        invoice_id: &str,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO filing_invoices (tenant, filing_id, invoice_id)
                 VALUES (?1, ?2, ?3)",
                params![tenant, filing_id, invoice_id],
            )
            .map_err(write_err)?;
            Ok(())
        })
    }

    pub fn add_payment(&self, tenant: &str, payment: &NewPayment) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO payments
                     (tenant, payment_id, invoice_id, payment_date, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    tenant,
                    &payment.payment_id,
                    &payment.invoice_id,
                    &payment.payment_date,
                    payment.amount,
                ],
            )
            .map_err(write_err)?;
            Ok(())
        })
    }
}
