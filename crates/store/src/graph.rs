use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use taxgraph_patterns::model::{AmendmentLink, EntityRisk, SettlementRow, TradeEdge};
use taxgraph_patterns::PatternSource;
use taxgraph_recon::model::{
    BatchFilter, InvoiceContext, LinkPresence, StatusCounts, StoredVerdict,
};
use taxgraph_recon::{InvoiceStore, RiskLevel, Status, StoreError, Verdict};

use crate::schema::SOURCE_FILING;
use crate::{query_err, write_err, SqliteGraphStore};

const FIRST_PAYMENT: &str = "SELECT MIN(p.payment_date) FROM payments p
     WHERE p.tenant = i.tenant AND p.invoice_id = i.invoice_id";

const HAS_PAYMENT: &str = "SELECT 1 FROM payments p
     WHERE p.tenant = i.tenant AND p.invoice_id = i.invoice_id";

fn context_query() -> String {
    format!(
        "SELECT
             i.primary_value, i.secondary_value, i.certified_value, i.taxable_value,
             i.central_tax, i.state_tax, i.integrated_tax, i.total_value, i.invoice_date,
             EXISTS (SELECT 1 FROM taxpayers t
                     WHERE t.tenant = i.tenant AND t.gstin = i.supplier_gstin),
             EXISTS (SELECT 1 FROM taxpayers t
                     WHERE t.tenant = i.tenant AND t.gstin = i.buyer_gstin),
             EXISTS (SELECT 1 {SOURCE_FILING}),
             EXISTS (SELECT 1 FROM filing_invoices fi
                     JOIN filings f ON f.tenant = fi.tenant AND f.filing_id = fi.filing_id
                     WHERE fi.tenant = i.tenant AND fi.invoice_id = i.invoice_id
                       AND f.kind = 'counterpart'),
             EXISTS ({HAS_PAYMENT}),
             (SELECT f.period {SOURCE_FILING}),
             (SELECT f.filing_date {SOURCE_FILING}),
             ({FIRST_PAYMENT})
         FROM invoices i
         WHERE i.tenant = ?1 AND i.invoice_id = ?2"
    )
}

fn context_from_row(record_id: &str, row: &Row<'_>) -> rusqlite::Result<InvoiceContext> {
    Ok(InvoiceContext {
        record_id: record_id.to_string(),
        primary_value: row.get(0)?,
        secondary_value: row.get(1)?,
        certified_value: row.get(2)?,
        taxable_value: row.get(3)?,
        central_tax: row.get(4)?,
        state_tax: row.get(5)?,
        integrated_tax: row.get(6)?,
        total_value: row.get(7)?,
        invoice_date: row.get(8)?,
        links: LinkPresence {
            supplier: row.get(9)?,
            buyer: row.get(10)?,
            source_filing: row.get(11)?,
            counterpart_filing: row.get(12)?,
            payment: row.get(13)?,
        },
        filing_period: row.get(14)?,
        filing_date: row.get(15)?,
        payment_date: row.get(16)?,
    })
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

impl InvoiceStore for SqliteGraphStore {
    fn fetch_context(
        &self,
        record_id: &str,
        tenant: &str,
    ) -> Result<Option<InvoiceContext>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(&context_query(), params![tenant, record_id], |row| {
                context_from_row(record_id, row)
            })
            .optional()
            .map_err(query_err)
        })
    }

    fn write_verdict(
        &self,
        record_id: &str,
        tenant: &str,
        verdict: &Verdict,
        reconciled_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE invoices
                     SET status = ?3, risk_level = ?4, explanation = ?5, reconciled_at = ?6
                     WHERE tenant = ?1 AND invoice_id = ?2",
                    params![
                        tenant,
                        record_id,
                        verdict.status.as_str(),
                        verdict.risk_level.as_str(),
                        &verdict.explanation,
                        reconciled_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    ],
                )
                .map_err(write_err)?;
            if changed == 0 {
                return Err(StoreError::Write(format!("no such record: {record_id}")));
            }
            Ok(())
        })
    }

    fn list_record_ids(
        &self,
        tenant: &str,
        filter: &BatchFilter,
    ) -> Result<Vec<String>, StoreError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = filter
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT i.invoice_id FROM invoices i
                     WHERE i.tenant = ?1
                       AND (?2 IS NULL OR i.supplier_gstin = ?2 OR i.buyer_gstin = ?2)
                       AND (?3 IS NULL OR EXISTS (
                           SELECT 1 FROM filing_invoices fi
                           JOIN filings f ON f.tenant = fi.tenant AND f.filing_id = fi.filing_id
                           WHERE fi.tenant = i.tenant AND fi.invoice_id = i.invoice_id
                             AND f.kind = 'source' AND f.period = ?3))
                     ORDER BY i.invoice_id
                     LIMIT ?4",
                )
                .map_err(query_err)?;
            let ids = stmt
                .query_map(
                    params![tenant, &filter.counterparty, &filter.period, limit],
                    |row| row.get(0),
                )
                .map_err(query_err)?
                .collect::<Result<Vec<String>, _>>()
                .map_err(query_err)?;
            Ok(ids)
        })
    }
}

impl SqliteGraphStore {
    /// The verdict last written for a record, if it has been reconciled.
    pub fn stored_verdict(
        &self,
        record_id: &str,
        tenant: &str,
    ) -> Result<Option<StoredVerdict>, StoreError> {
        let raw: Option<(Option<String>, Option<String>, Option<String>, Option<String>)> = self
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT status, risk_level, explanation, reconciled_at
                     FROM invoices WHERE tenant = ?1 AND invoice_id = ?2",
                    params![tenant, record_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()
                .map_err(query_err)
            })?;

        let Some((Some(status), Some(risk), explanation, Some(at))) = raw else {
            return Ok(None);
        };
        let reconciled_at = DateTime::parse_from_rfc3339(&at)
            .map_err(|e| StoreError::Query(format!("bad reconciled_at {at:?}: {e}")))?
            .with_timezone(&Utc);
        Ok(Some(StoredVerdict {
            status: status.parse::<Status>().map_err(StoreError::Query)?,
            risk_level: risk.parse::<RiskLevel>().map_err(StoreError::Query)?,
            explanation: explanation.unwrap_or_default(),
            reconciled_at,
        }))
    }

    /// Stored status distribution for the tenant without re-running anything.
    /// Records never reconciled count as pending.
    pub fn status_counts(&self, tenant: &str) -> Result<StatusCounts, StoreError> {
        let rows: Vec<(Option<String>, i64)> = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT status, COUNT(*) FROM invoices WHERE tenant = ?1 GROUP BY status",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![tenant], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;
            Ok(rows)
        })?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            let status = match status.as_deref().map(str::parse::<Status>) {
                Some(Ok(s)) => s,
                Some(Err(e)) => {
                    log::warn!("{e}; counting as pending");
                    Status::Pending
                }
                None => Status::Pending,
            };
            counts.add(status, usize::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Pattern detection
// ---------------------------------------------------------------------------

impl PatternSource for SqliteGraphStore {
    fn trade_edges(&self, tenant: &str) -> Result<Vec<TradeEdge>, StoreError> {
        let sql = format!(
            "SELECT i.invoice_id, i.supplier_gstin, i.buyer_gstin, (SELECT f.period {SOURCE_FILING})
             FROM invoices i
             WHERE i.tenant = ?1 AND i.supplier_gstin IS NOT NULL AND i.buyer_gstin IS NOT NULL
             ORDER BY i.invoice_id"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(query_err)?;
            let rows = stmt
                .query_map(params![tenant], |row| {
                    Ok(TradeEdge {
                        transaction_id: row.get(0)?,
                        issuer: row.get(1)?,
                        receiver: row.get(2)?,
                        period: row.get(3)?,
                    })
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;
            Ok(rows)
        })
    }

    /// Invoices paid only by payments with no recorded date are left out: their
    /// delay is unknown, not running.
    fn settlement_rows(&self, tenant: &str) -> Result<Vec<SettlementRow>, StoreError> {
        let sql = format!(
            "SELECT i.invoice_id, i.supplier_gstin, i.invoice_date, ({FIRST_PAYMENT})
             FROM invoices i
             WHERE i.tenant = ?1 AND i.supplier_gstin IS NOT NULL
               AND (({FIRST_PAYMENT}) IS NOT NULL OR NOT EXISTS ({HAS_PAYMENT}))
             ORDER BY i.invoice_id"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(query_err)?;
            let rows = stmt
                .query_map(params![tenant], |row| {
                    Ok(SettlementRow {
                        transaction_id: row.get(0)?,
                        issuer: row.get(1)?,
                        invoice_date: row.get(2)?,
                        payment_date: row.get(3)?,
                    })
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;
            Ok(rows)
        })
    }

    fn amendment_links(&self, tenant: &str) -> Result<Vec<AmendmentLink>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT invoice_id, amends, supplier_gstin FROM invoices
                     WHERE tenant = ?1 AND amends IS NOT NULL
                     ORDER BY invoice_id",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![tenant], |row| {
                    Ok(AmendmentLink {
                        transaction_id: row.get(0)?,
                        amends: row.get(1)?,
                        issuer: row.get(2)?,
                    })
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;
            Ok(rows)
        })
    }

    fn risk_classifications(&self, tenant: &str) -> Result<Vec<EntityRisk>, StoreError> {
        let rows: Vec<(String, Option<String>)> = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT gstin, risk_level FROM taxpayers WHERE tenant = ?1 ORDER BY gstin",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![tenant], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .map(|(entity, raw)| {
                let risk_level = raw.and_then(|r| match r.parse::<RiskLevel>() {
                    Ok(level) => Some(level),
                    Err(e) => {
                        log::warn!("taxpayer {entity}: {e}; treating as unclassified");
                        None
                    }
                });
                EntityRisk { entity, risk_level }
            })
            .collect())
    }
}
