//! Risk network: taxpayers who trade mostly with high-risk counterparties.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use taxgraph_recon::config::PatternConfig;
use taxgraph_recon::RiskLevel;

use crate::model::{round_to, DetectorReport, EntityRisk, RiskNetwork, TradeEdge};
use crate::source::PatternSource;

pub const NOT_CLASSIFIED: &str =
    "no taxpayer has a risk classification yet; load classifications before running this detector";

pub fn detect(
    source: &dyn PatternSource,
    tenant: &str,
    config: &PatternConfig,
) -> DetectorReport<RiskNetwork> {
    let classes = match source.risk_classifications(tenant) {
        Ok(classes) => classes,
        Err(err) => {
            log::error!("risk network scan failed: {err}");
            return DetectorReport::unavailable(err);
        }
    };
    if classes.iter().all(|c| c.risk_level.is_none()) {
        log::warn!("risk network scan skipped: {NOT_CLASSIFIED}");
        return DetectorReport::not_ready(NOT_CLASSIFIED);
    }
    let edges = match source.trade_edges(tenant) {
        Ok(edges) => edges,
        Err(err) => {
            log::error!("risk network scan failed: {err}");
            return DetectorReport::unavailable(err);
        }
    };

    let findings = find_risky_networks(&edges, &classes, config.risky_partner_ratio);
    log::info!(
        "risk network scan: {} taxpayers classified, {} flagged",
        classes.iter().filter(|c| c.risk_level.is_some()).count(),
        findings.len()
    );
    DetectorReport::complete(findings)
}

/// Flag taxpayers whose share of HIGH-risk trading partners is at least
/// `threshold`. Partners are counted once regardless of direction or volume.
///
/// HIGH when the share reaches twice the threshold. Sorted by share, highest
/// first.
pub fn find_risky_networks(
    edges: &[TradeEdge],
    classes: &[EntityRisk],
    threshold: f64,
) -> Vec<RiskNetwork> {
    let risk: HashMap<&str, RiskLevel> = classes
        .iter()
        .filter_map(|c| c.risk_level.map(|level| (c.entity.as_str(), level)))
        .collect();

    let mut partners: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in edges {
        if edge.issuer == edge.receiver {
            continue;
        }
        partners
            .entry(edge.issuer.as_str())
            .or_default()
            .insert(edge.receiver.as_str());
        partners
            .entry(edge.receiver.as_str())
            .or_default()
            .insert(edge.issuer.as_str());
    }

    let mut findings: Vec<RiskNetwork> = partners
        .into_iter()
        .filter_map(|(entity, set)| {
            let total = set.len();
            let risky = set
                .iter()
                .filter(|p| risk.get(*p) == Some(&RiskLevel::High))
                .count();
            let ratio = risky as f64 / total as f64;
            if risky == 0 || ratio < threshold {
                return None;
            }
            let risk_level = if ratio >= threshold * 2.0 {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            Some(RiskNetwork {
                entity: entity.to_string(),
                total_partners: total,
                risky_partners: risky,
                ratio: round_to(ratio, 4),
                risk_level,
            })
        })
        .collect();

    findings.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.entity.cmp(&b.entity)));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(tx: &str, from: &str, to: &str) -> TradeEdge {
        TradeEdge {
            transaction_id: tx.into(),
            issuer: from.into(),
            receiver: to.into(),
            period: None,
        }
    }

    fn class(entity: &str, level: Option<RiskLevel>) -> EntityRisk {
        EntityRisk {
            entity: entity.into(),
            risk_level: level,
        }
    }

    #[test]
    fn mostly_risky_partners_is_high() {
        let edges = vec![edge("T1", "A", "R1"), edge("T2", "R2", "A"), edge("T3", "A", "C")];
        let classes = vec![
            class("R1", Some(RiskLevel::High)),
            class("R2", Some(RiskLevel::High)),
            class("C", Some(RiskLevel::Low)),
        ];
        let found = find_risky_networks(&edges, &classes, 0.30);
        assert_eq!(found.len(), 1);
        let f = &found[0];
        assert_eq!(f.entity, "A");
        assert_eq!(f.total_partners, 3);
        assert_eq!(f.risky_partners, 2);
        assert_eq!(f.ratio, 0.6667);
        assert_eq!(f.risk_level, RiskLevel::High);
    }

    #[test]
    fn ratio_at_threshold_is_medium() {
        let edges = vec![
            edge("T1", "A", "R1"),
            edge("T2", "A", "B"),
            edge("T3", "A", "C"),
            edge("T4", "A", "D"),
        ];
        let classes = vec![class("R1", Some(RiskLevel::High))];
        let found = find_risky_networks(&edges, &classes, 0.25);
        let a = found.iter().find(|f| f.entity == "A").unwrap();
        assert_eq!(a.ratio, 0.25);
        assert_eq!(a.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn repeated_trades_count_partner_once() {
        let edges = vec![
            edge("T1", "A", "R1"),
            edge("T2", "A", "R1"),
            edge("T3", "R1", "A"),
            edge("T4", "A", "B"),
            edge("T5", "A", "C"),
            edge("T6", "A", "D"),
        ];
        let classes = vec![class("R1", Some(RiskLevel::High))];
        let found = find_risky_networks(&edges, &classes, 0.30);
        assert!(found.iter().all(|f| f.entity != "A"));
    }

    #[test]
    fn medium_partners_are_not_risky() {
        let edges = vec![edge("T1", "A", "M")];
        let classes = vec![class("M", Some(RiskLevel::Medium))];
        assert!(find_risky_networks(&edges, &classes, 0.30).is_empty());
    }
}
