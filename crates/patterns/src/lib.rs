//! `taxgraph-patterns`: graph-wide fraud pattern detectors.
//!
//! Each detector reads a full row set from a [`PatternSource`], groups it in
//! memory and returns findings in a deterministic order. Detectors only read;
//! they never touch stored verdicts.

pub mod amendment;
pub mod circular;
pub mod delay;
pub mod model;
pub mod network;
pub mod source;

use chrono::NaiveDate;

use taxgraph_recon::ReconConfig;

pub use model::{
    AmendmentChain, CircularTrade, DetectorReport, DetectorStatus, PatternSummary, PaymentDelay,
    RiskNetwork,
};
pub use source::PatternSource;

/// Run all four detectors concurrently and collect their reports.
///
/// A detector that fails reports `Unavailable` without affecting the others.
pub fn detect_all(
    source: &dyn PatternSource,
    config: &ReconConfig,
    tenant: &str,
    as_of: NaiveDate,
) -> PatternSummary {
    let (circular, delays, chains, networks) = std::thread::scope(|scope| {
        let circular = scope.spawn(|| circular::detect(source, tenant));
        let delays = scope.spawn(|| {
            delay::detect(source, tenant, &config.timeliness, &config.patterns, as_of)
        });
        let chains = scope.spawn(|| amendment::detect(source, tenant, &config.patterns));
        let networks = scope.spawn(|| network::detect(source, tenant, &config.patterns));
        let panicked = |name: &str| format!("{name} detector panicked");
        (
            circular
                .join()
                .unwrap_or_else(|_| DetectorReport::unavailable(panicked("circular trade"))),
            delays
                .join()
                .unwrap_or_else(|_| DetectorReport::unavailable(panicked("payment delay"))),
            chains
                .join()
                .unwrap_or_else(|_| DetectorReport::unavailable(panicked("amendment chain"))),
            networks
                .join()
                .unwrap_or_else(|_| DetectorReport::unavailable(panicked("risk network"))),
        )
    });

    let summary = PatternSummary::new(circular, delays, chains, networks);
    log::info!("pattern scan complete: {} patterns", summary.total_patterns);
    summary
}
