//! Amendment chains: invoices repeatedly amended, possibly to disguise the
//! original figures.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use taxgraph_recon::config::PatternConfig;
use taxgraph_recon::RiskLevel;

use crate::model::{AmendmentChain, AmendmentLink, DetectorReport};
use crate::source::PatternSource;

pub fn detect(
    source: &dyn PatternSource,
    tenant: &str,
    config: &PatternConfig,
) -> DetectorReport<AmendmentChain> {
    match source.amendment_links(tenant) {
        Ok(links) => {
            let findings = find_chains(&links, config);
            log::info!(
                "amendment chain scan: {} links, {} flagged taxpayers",
                links.len(),
                findings.len()
            );
            DetectorReport::complete(findings)
        }
        Err(err) => {
            log::error!("amendment chain scan failed: {err}");
            DetectorReport::unavailable(err)
        }
    }
}

#[derive(Default)]
struct Tally<'a> {
    roots: BTreeSet<&'a str>,
    max_depth: usize,
    capped: bool,
}

/// Where a walk up the `amends` links ended.
struct Walk<'a> {
    root: &'a str,
    /// Hops taken; `None` when the links loop.
    hops: Option<usize>,
}

/// Follow parent links from `start` to the original invoice.
///
/// A loop has no original; its smallest id stands in as the root so every
/// walk into the same loop lands on the same chain.
fn walk_to_root<'a>(parent: &HashMap<&'a str, &'a str>, start: &'a str) -> Walk<'a> {
    let mut path = vec![start];
    let mut seen: HashMap<&str, usize> = HashMap::from([(start, 0)]);
    let mut node = start;
    while let Some(&up) = parent.get(node) {
        if let Some(&at) = seen.get(up) {
            let root = path[at..].iter().copied().min().unwrap_or(up);
            return Walk { root, hops: None };
        }
        seen.insert(up, path.len());
        path.push(up);
        node = up;
    }
    Walk {
        root: node,
        hops: Some(path.len() - 1),
    }
}

/// Walk every amending invoice back to its original and tally per issuer.
///
/// Chains are counted by their true root. Reported depth stops at
/// `amendment_max_depth`; a longer chain, or a loop of amendments, marks the
/// finding `depth_capped`.
pub fn find_chains(links: &[AmendmentLink], config: &PatternConfig) -> Vec<AmendmentChain> {
    let max_hops = config.amendment_max_depth.max(1);

    let mut parent: HashMap<&str, &str> = HashMap::with_capacity(links.len());
    for link in links {
        if link.transaction_id != link.amends {
            parent.insert(link.transaction_id.as_str(), link.amends.as_str());
        }
    }

    let mut by_issuer: BTreeMap<&str, Tally<'_>> = BTreeMap::new();
    for link in links {
        let Some(issuer) = link.issuer.as_deref() else {
            continue;
        };
        let start = link.transaction_id.as_str();
        if !parent.contains_key(start) {
            continue;
        }
        let walk = walk_to_root(&parent, start);
        let (depth, capped) = match walk.hops {
            Some(hops) if hops <= max_hops => (hops, false),
            _ => (max_hops, true),
        };

        let tally = by_issuer.entry(issuer).or_default();
        tally.roots.insert(walk.root);
        tally.max_depth = tally.max_depth.max(depth);
        tally.capped |= capped;
    }

    let mut findings: Vec<AmendmentChain> = by_issuer
        .into_iter()
        .map(|(entity, tally)| {
            let chain_count = tally.roots.len();
            let risk_level =
                if chain_count >= config.amendment_flag_count || tally.max_depth >= 2 {
                    RiskLevel::High
                } else {
                    RiskLevel::Medium
                };
            AmendmentChain {
                entity: entity.to_string(),
                chain_count,
                max_depth: tally.max_depth,
                depth_capped: tally.capped,
                risk_level,
            }
        })
        .collect();

    findings.sort_by(|a, b| {
        b.max_depth
            .cmp(&a.max_depth)
            .then(b.chain_count.cmp(&a.chain_count))
            .then_with(|| a.entity.cmp(&b.entity))
    });
    findings
}
