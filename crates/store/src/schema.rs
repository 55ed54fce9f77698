// Graph schema. Relationships are rows, not edges: an invoice's supplier and
// buyer are columns, filing membership and payments are link tables.

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS taxpayers (
    tenant TEXT NOT NULL,
    gstin TEXT NOT NULL,
    name TEXT,
    risk_level TEXT,                -- LOW / MEDIUM / HIGH, NULL = unclassified
    PRIMARY KEY (tenant, gstin)
);

CREATE TABLE IF NOT EXISTS invoices (
    tenant TEXT NOT NULL,
    invoice_id TEXT NOT NULL,
    supplier_gstin TEXT,
    buyer_gstin TEXT,
    invoice_date TEXT,
    primary_value REAL,             -- supplier's filed value
    secondary_value REAL,           -- buyer's purchase register
    certified_value REAL,           -- e-invoice portal
    taxable_value REAL,             -- authoritative, picked on ingest
    central_tax REAL,
    state_tax REAL,
    integrated_tax REAL,
    total_value REAL,
    amends TEXT,                    -- invoice_id this one amends
    status TEXT,                    -- NULL until first reconciliation
    risk_level TEXT,
    explanation TEXT,
    reconciled_at TEXT,             -- RFC 3339, UTC
    PRIMARY KEY (tenant, invoice_id)
);

CREATE TABLE IF NOT EXISTS filings (
    tenant TEXT NOT NULL,
    filing_id TEXT NOT NULL,
    gstin TEXT NOT NULL,
    period TEXT NOT NULL,
    filing_date TEXT,
    kind TEXT NOT NULL,             -- 'source' or 'counterpart'
    PRIMARY KEY (tenant, filing_id)
);

CREATE TABLE IF NOT EXISTS filing_invoices (
    tenant TEXT NOT NULL,
    filing_id TEXT NOT NULL,
    invoice_id TEXT NOT NULL,
    PRIMARY KEY (tenant, filing_id, invoice_id)
);

CREATE TABLE IF NOT EXISTS payments (
    tenant TEXT NOT NULL,
    payment_id TEXT NOT NULL,
    invoice_id TEXT NOT NULL,
    payment_date TEXT,
    amount REAL,
    PRIMARY KEY (tenant, payment_id)
);

CREATE INDEX IF NOT EXISTS idx_invoices_supplier ON invoices (tenant, supplier_gstin);
CREATE INDEX IF NOT EXISTS idx_invoices_buyer ON invoices (tenant, buyer_gstin);
CREATE INDEX IF NOT EXISTS idx_filing_invoices_invoice ON filing_invoices (tenant, invoice_id);
CREATE INDEX IF NOT EXISTS idx_payments_invoice ON payments (tenant, invoice_id);
"#;

/// Earliest source filing for invoice alias `i`. Used as a correlated subquery.
pub(crate) const SOURCE_FILING: &str = r#"
    FROM filing_invoices fi
    JOIN filings f ON f.tenant = fi.tenant AND f.filing_id = fi.filing_id
    WHERE fi.tenant = i.tenant AND fi.invoice_id = i.invoice_id AND f.kind = 'source'
    ORDER BY f.filing_date IS NULL, f.filing_date
    LIMIT 1
"#;
