use chrono::NaiveDate;
use extract::{PatentRecord, RelationKind};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::ApplicationGraph;
use crate::working_set::ParentLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Parent hops followed from the record before a branch is cut.
    pub max_chain_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_chain_depth: 16 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritySource {
    OwnFiling,
    Parent,
    Provisional,
}

/// Something odd met while walking a chain. None of these fail the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainAnomaly {
    /// The branch led back to an application already on the path.
    Cycle { application: String },
    /// The branch went deeper than `max_chain_depth`.
    DepthLimit { application: String },
    /// A parent was referenced without any filing date.
    MissingParentDate { application: String },
    /// The record has no filing date; its grant date stood in.
    MissingFilingDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityResolution {
    pub earliest_priority_date: NaiveDate,
    pub source: PrioritySource,
    /// Application numbers from the record to the application that
    /// supplied the date.
    pub chain: Vec<String>,
    pub anomalies: Vec<ChainAnomaly>,
}

#[derive(Debug, Clone)]
struct Candidate {
    date: NaiveDate,
    chain: Vec<String>,
}

#[derive(Default)]
struct Walk {
    path: Vec<NodeIndex>,
    parent: Option<Candidate>,
    provisional: Option<Candidate>,
    anomalies: Vec<ChainAnomaly>,
}

impl Walk {
    fn offer(slot: &mut Option<Candidate>, date: NaiveDate, chain: Vec<String>) {
        match slot {
            Some(best) if best.date <= date => {}
            _ => *slot = Some(Candidate { date, chain }),
        }
    }

    fn flag(&mut self, anomaly: ChainAnomaly) {
        if !self.anomalies.contains(&anomaly) {
            self.anomalies.push(anomaly);
        }
    }
}

#[derive(Debug, Default)]
pub struct PriorityChainResolver {
    config: ResolverConfig,
}

impl PriorityChainResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Earliest date the record can claim through continuation,
    /// continuation-in-part and divisional parents. Provisional dates count
    /// only when no such parent has a date. Never later than the record's
    /// own filing date.
    pub fn resolve(&self, record: &PatentRecord, lookup: &dyn ParentLookup) -> PriorityResolution {
        let (graph, root) = ApplicationGraph::build(record, lookup);

        let mut walk = Walk::default();
        let own = match record.filing_date {
            Some(date) => date,
            None => {
                walk.flag(ChainAnomaly::MissingFilingDate);
                record.grant_date
            }
        };

        walk.path.push(root);
        self.visit(&graph, root, &mut walk);

        let root_key = graph.node(root).application.clone();
        let (best, source) = match (walk.parent.take(), walk.provisional.take()) {
            (Some(parent), _) => (Some(parent), PrioritySource::Parent),
            (None, Some(provisional)) => (Some(provisional), PrioritySource::Provisional),
            (None, None) => (None, PrioritySource::OwnFiling),
        };

        let resolution = match best {
            Some(candidate) if candidate.date < own => PriorityResolution {
                earliest_priority_date: candidate.date,
                source,
                chain: candidate.chain,
                anomalies: walk.anomalies,
            },
            _ => PriorityResolution {
                earliest_priority_date: own,
                source: PrioritySource::OwnFiling,
                chain: vec![root_key],
                anomalies: walk.anomalies,
            },
        };

        for anomaly in &resolution.anomalies {
            warn!(identifier = %record.identifier, anomaly = ?anomaly, "priority chain anomaly");
        }
        debug!(
            identifier = %record.identifier,
            priority = %resolution.earliest_priority_date,
            source = ?resolution.source,
            applications = graph.node_count(),
            links = graph.edge_count(),
            "priority resolved"
        );

        resolution
    }

    /// Resolve and store the date on the record.
    pub fn apply(&self, record: &mut PatentRecord, lookup: &dyn ParentLookup) -> PriorityResolution {
        let resolution = self.resolve(record, lookup);
        record.earliest_priority_date = Some(resolution.earliest_priority_date);
        resolution
    }

    fn visit(&self, graph: &ApplicationGraph, idx: NodeIndex, walk: &mut Walk) {
        for (parent, relation) in graph.parents(idx) {
            let node = graph.node(parent);

            if walk.path.contains(&parent) {
                walk.flag(ChainAnomaly::Cycle {
                    application: node.application.clone(),
                });
                continue;
            }

            let chain = || -> Vec<String> {
                walk.path
                    .iter()
                    .chain(std::iter::once(&parent))
                    .map(|i| graph.node(*i).application.clone())
                    .collect()
            };

            if relation == RelationKind::ParentProvisional {
                if let Some(date) = node.filing_date {
                    let chain = chain();
                    Walk::offer(&mut walk.provisional, date, chain);
                }
                continue;
            }
            if !relation.is_chain_edge() {
                continue;
            }
            if walk.path.len() > self.config.max_chain_depth {
                walk.flag(ChainAnomaly::DepthLimit {
                    application: node.application.clone(),
                });
                continue;
            }

            match node.filing_date {
                Some(date) => {
                    let chain = chain();
                    Walk::offer(&mut walk.parent, date, chain);
                }
                None => walk.flag(ChainAnomaly::MissingParentDate {
                    application: node.application.clone(),
                }),
            }

            if node.expanded {
                walk.path.push(parent);
                self.visit(graph, parent, walk);
                walk.path.pop();
            }
        }
    }
}
