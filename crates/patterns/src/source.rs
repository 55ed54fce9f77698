use taxgraph_recon::StoreError;

use crate::model::{AmendmentLink, EntityRisk, SettlementRow, TradeEdge};

/// Read access to the tenant's trading graph for the detectors.
///
/// Every method returns the complete row set for the tenant; detectors do
/// their own grouping so results don't depend on row order.
pub trait PatternSource: Send + Sync {
    /// Invoices with both an issuer and a receiver.
    fn trade_edges(&self, tenant: &str) -> Result<Vec<TradeEdge>, StoreError>;

    /// Invoices with an issuer, whether paid or not.
    fn settlement_rows(&self, tenant: &str) -> Result<Vec<SettlementRow>, StoreError>;

    fn amendment_links(&self, tenant: &str) -> Result<Vec<AmendmentLink>, StoreError>;

    /// Every taxpayer known to the tenant, classified or not.
    fn risk_classifications(&self, tenant: &str) -> Result<Vec<EntityRisk>, StoreError>;
}
