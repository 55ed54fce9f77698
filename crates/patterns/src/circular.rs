//! Circular trading: two or three taxpayers invoicing each other in a loop.
//!
//! A loop is keyed by its participant set, so A→B→C→A and A→C→B→A collapse
//! into one finding whose evidence is the union of both orientations. The
//! participant order reported is the first orientation found when walking
//! from the smallest id.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use taxgraph_recon::RiskLevel;

use crate::model::{CircularTrade, DetectorReport, TradeEdge};
use crate::source::PatternSource;

const CYCLE_ID_LEN: usize = 12;

/// Evidence for one directed hop: transaction ids with their periods.
type Hop<'a> = BTreeMap<&'a str, Option<&'a str>>;

/// Read trade edges for `tenant` and find loops.
pub fn detect(source: &dyn PatternSource, tenant: &str) -> DetectorReport<CircularTrade> {
    match source.trade_edges(tenant) {
        Ok(edges) => {
            let cycles = find_cycles(&edges);
            log::info!(
                "circular trade scan: {} edges, {} loops",
                edges.len(),
                cycles.len()
            );
            DetectorReport::complete(cycles)
        }
        Err(err) => {
            log::error!("circular trade scan failed: {err}");
            DetectorReport::unavailable(err)
        }
    }
}

/// Loops of length two and three, sorted by cycle id.
///
/// Self-invoices are ignored. The result is the same for any ordering of
/// `edges`.
pub fn find_cycles(edges: &[TradeEdge]) -> Vec<CircularTrade> {
    let mut graph: BTreeMap<&str, BTreeMap<&str, Hop<'_>>> = BTreeMap::new();
    for edge in edges {
        if edge.issuer == edge.receiver {
            continue;
        }
        graph
            .entry(edge.issuer.as_str())
            .or_default()
            .entry(edge.receiver.as_str())
            .or_default()
            .insert(edge.transaction_id.as_str(), edge.period.as_deref());
    }

    let mut found: BTreeMap<String, CircularTrade> = BTreeMap::new();

    for (&a, out_a) in &graph {
        for (&b, ab) in out_a {
            // Walk each loop once, from its smallest participant.
            if b <= a {
                continue;
            }
            if let Some(ba) = hop(&graph, b, a) {
                merge(&mut found, &[a, b], &[ab, ba]);
            }
            let Some(out_b) = graph.get(b) else {
                continue;
            };
            for (&c, bc) in out_b {
                if c <= a || c == b {
                    continue;
                }
                if let Some(ca) = hop(&graph, c, a) {
                    merge(&mut found, &[a, b, c], &[ab, bc, ca]);
                }
            }
        }
    }

    found.into_values().collect()
}

fn hop<'g, 'a>(
    graph: &'g BTreeMap<&'a str, BTreeMap<&'a str, Hop<'a>>>,
    from: &str,
    to: &str,
) -> Option<&'g Hop<'a>> {
    graph.get(from).and_then(|out| out.get(to))
}

/// `sha256(sorted participants joined by "|")`, first 12 hex digits.
pub fn cycle_id(participants: &[&str]) -> String {
    let mut sorted: Vec<&str> = participants.to_vec();
    sorted.sort_unstable();
    let digest = Sha256::digest(sorted.join("|").as_bytes());
    let mut hex = String::with_capacity(CYCLE_ID_LEN);
    for byte in digest.iter().take(CYCLE_ID_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn merge(found: &mut BTreeMap<String, CircularTrade>, participants: &[&str], hops: &[&Hop<'_>]) {
    let id = cycle_id(participants);
    let entry = found.entry(id.clone()).or_insert_with(|| CircularTrade {
        cycle_id: id,
        participants: participants.iter().map(|p| p.to_string()).collect(),
        transaction_ids: Vec::new(),
        period: None,
        risk_level: RiskLevel::High,
    });

    let mut ids: BTreeSet<String> = entry.transaction_ids.drain(..).collect();
    for hop in hops {
        for (&tx, &period) in hop.iter() {
            ids.insert(tx.to_string());
            // Earliest period among the evidence, so the choice is order-free.
            if let Some(p) = period {
                if entry.period.as_deref().map_or(true, |cur| p < cur) {
                    entry.period = Some(p.to_string());
                }
            }
        }
    }
    entry.transaction_ids = ids.into_iter().collect();
}
