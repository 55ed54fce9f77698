use chrono::NaiveDate;
use proptest::prelude::*;

use taxgraph_patterns::circular::find_cycles;
use taxgraph_patterns::model::{AmendmentLink, EntityRisk, SettlementRow, TradeEdge};
use taxgraph_patterns::{detect_all, DetectorStatus, PatternSource};
use taxgraph_recon::{ReconConfig, RiskLevel, StoreError};

// -------------------------------------------------------------------------
// Fake source
// -------------------------------------------------------------------------

#[derive(Default)]
struct FakeSource {
    edges: Vec<TradeEdge>,
    settlements: Vec<SettlementRow>,
    amendments: Vec<AmendmentLink>,
    classes: Vec<EntityRisk>,
    fail_settlements: bool,
}

impl PatternSource for FakeSource {
    fn trade_edges(&self, _tenant: &str) -> Result<Vec<TradeEdge>, StoreError> {
        Ok(self.edges.clone())
    }

    fn settlement_rows(&self, _tenant: &str) -> Result<Vec<SettlementRow>, StoreError> {
        if self.fail_settlements {
            return Err(StoreError::Query("settlements table missing".into()));
        }
        Ok(self.settlements.clone())
    }

    fn amendment_links(&self, _tenant: &str) -> Result<Vec<AmendmentLink>, StoreError> {
        Ok(self.amendments.clone())
    }

    fn risk_classifications(&self, _tenant: &str) -> Result<Vec<EntityRisk>, StoreError> {
        Ok(self.classes.clone())
    }
}

fn edge(tx: &str, from: &str, to: &str) -> TradeEdge {
    TradeEdge {
        transaction_id: tx.into(),
        issuer: from.into(),
        receiver: to.into(),
        period: Some("2024-04".into()),
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

fn loop_source() -> FakeSource {
    FakeSource {
        edges: vec![
            edge("INV-1", "A", "B"),
            edge("INV-2", "B", "C"),
            edge("INV-3", "C", "A"),
            edge("INV-4", "A", "D"),
        ],
        settlements: vec![SettlementRow {
            transaction_id: "INV-1".into(),
            issuer: "A".into(),
            invoice_date: Some("2024-01-01".into()),
            payment_date: Some("2024-05-01".into()),
        }],
        amendments: vec![AmendmentLink {
            transaction_id: "INV-1A".into(),
            amends: "INV-1".into(),
            issuer: Some("A".into()),
        }],
        classes: vec![
            EntityRisk {
                entity: "D".into(),
                risk_level: Some(RiskLevel::High),
            },
            EntityRisk {
                entity: "A".into(),
                risk_level: None,
            },
        ],
        ..FakeSource::default()
    }
}

// -------------------------------------------------------------------------
// detect_all
// -------------------------------------------------------------------------

#[test]
fn every_detector_reports() {
    let summary = detect_all(&loop_source(), &ReconConfig::default(), "t", as_of());

    assert!(summary.circular_trades.is_complete());
    assert_eq!(summary.circular_trades.findings.len(), 1);
    assert_eq!(
        summary.circular_trades.findings[0].transaction_ids,
        vec!["INV-1", "INV-2", "INV-3"]
    );

    assert_eq!(summary.payment_delays.findings.len(), 1);
    assert_eq!(summary.amendment_chains.findings.len(), 1);

    // D's only partner is A, which is unclassified; A has 1 risky partner of 3.
    assert_eq!(summary.risk_networks.findings.len(), 1);
    assert_eq!(summary.risk_networks.findings[0].entity, "A");

    assert_eq!(summary.total_patterns, 4);
}

#[test]
fn network_detector_is_not_ready_without_classifications() {
    let mut source = loop_source();
    for class in &mut source.classes {
        class.risk_level = None;
    }
    let summary = detect_all(&source, &ReconConfig::default(), "t", as_of());
    assert!(matches!(
        summary.risk_networks.status,
        DetectorStatus::NotReady { .. }
    ));
    assert!(summary.circular_trades.is_complete());
}

#[test]
fn failing_detector_does_not_hide_others() {
    let mut source = loop_source();
    source.fail_settlements = true;
    let summary = detect_all(&source, &ReconConfig::default(), "t", as_of());
    assert!(matches!(
        summary.payment_delays.status,
        DetectorStatus::Unavailable { ref error } if error.contains("settlements table missing")
    ));
    assert!(summary.payment_delays.findings.is_empty());
    assert_eq!(summary.circular_trades.findings.len(), 1);
    assert_eq!(summary.total_patterns, 3);
}

#[test]
fn empty_graph_is_complete_and_empty() {
    let source = FakeSource {
        classes: vec![EntityRisk {
            entity: "A".into(),
            risk_level: Some(RiskLevel::Low),
        }],
        ..FakeSource::default()
    };
    let summary = detect_all(&source, &ReconConfig::default(), "t", as_of());
    assert_eq!(summary.total_patterns, 0);
    assert!(summary.risk_networks.is_complete());
    assert!(summary.amendment_chains.is_complete());
}

#[test]
fn summary_serializes_with_status_tags() {
    let summary = detect_all(&loop_source(), &ReconConfig::default(), "t", as_of());
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["circular_trades"]["status"], "complete");
    assert_eq!(json["circular_trades"]["findings"][0]["risk_level"], "HIGH");
    assert_eq!(json["total_patterns"], 4);
}

// -------------------------------------------------------------------------
// Order invariance
// -------------------------------------------------------------------------

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn arb_edges() -> impl Strategy<Value = Vec<TradeEdge>> {
    let node = prop::sample::select(vec!["A", "B", "C", "D", "E"]);
    prop::collection::vec((node.clone(), node), 0..24).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (from, to))| edge(&format!("T{i:02}"), from, to))
            .collect()
    })
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn cycles_do_not_depend_on_edge_order(
        (edges, shuffled) in arb_edges().prop_flat_map(|edges| {
            let shuffled = Just(edges.clone()).prop_shuffle();
            (Just(edges), shuffled)
        })
    ) {
        prop_assert_eq!(find_cycles(&edges), find_cycles(&shuffled));
    }

    #[test]
    fn cycle_ids_are_unique(edges in arb_edges()) {
        let cycles = find_cycles(&edges);
        let mut ids: Vec<&str> = cycles.iter().map(|c| c.cycle_id.as_str()).collect();
        let before = ids.len();
        ids.dedup();
        prop_assert_eq!(before, ids.len());
        for c in &cycles {
            prop_assert!(c.participants.len() == 2 || c.participants.len() == 3);
            prop_assert!(!c.transaction_ids.is_empty());
        }
    }
}
