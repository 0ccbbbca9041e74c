use chrono::NaiveDate;
use extract::{application_key, PatentRecord, RelationKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};

use crate::working_set::ParentLookup;

#[derive(Debug, Clone)]
pub struct ApplicationNode {
    pub application: String,
    pub filing_date: Option<NaiveDate>,
    /// A parsed record backs this node, so its own parents are known.
    pub expanded: bool,
}

/// Applications reachable from one record. Edges point child → parent
/// and carry the relation the child claims.
#[derive(Debug, Default)]
pub struct ApplicationGraph {
    graph: DiGraph<ApplicationNode, RelationKind>,
    nodes: HashMap<String, NodeIndex>,
}

impl ApplicationGraph {
    /// Collect every application reachable from `root` through parent
    /// references. Records found in `lookup` are expanded; anything else is
    /// a leaf carrying the date its child reported.
    pub fn build(root: &PatentRecord, lookup: &dyn ParentLookup) -> (Self, NodeIndex) {
        let mut graph = Self::default();
        let root_key = application_key(&root.application_number);
        let root_idx = graph.add_node(&root_key, root.filing_date);

        let mut queue = VecDeque::new();
        queue.push_back((root_idx, root));

        while let Some((child_idx, record)) = queue.pop_front() {
            graph.graph[child_idx].expanded = true;

            for parent in record.parents() {
                let key = application_key(&parent.application_number);
                if key.is_empty() {
                    continue;
                }

                let known = lookup.lookup(&key);
                let date = known.and_then(|r| r.filing_date).or(parent.filing_date);
                let parent_idx = graph.add_node(&key, date);
                graph.graph.add_edge(child_idx, parent_idx, parent.relation);

                if let Some(parent_record) = known {
                    if !graph.graph[parent_idx].expanded && !queue.iter().any(|(idx, _)| *idx == parent_idx) {
                        queue.push_back((parent_idx, parent_record));
                    }
                }
            }
        }

        (graph, root_idx)
    }

    fn add_node(&mut self, key: &str, filing_date: Option<NaiveDate>) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(key) {
            let node = &mut self.graph[idx];
            if node.filing_date.is_none() {
                node.filing_date = filing_date;
            }
            return idx;
        }

        let idx = self.graph.add_node(ApplicationNode {
            application: key.to_string(),
            filing_date,
            expanded: false,
        });
        self.nodes.insert(key.to_string(), idx);
        idx
    }

    pub fn node(&self, idx: NodeIndex) -> &ApplicationNode {
        &self.graph[idx]
    }

    /// Parent edges of `idx` in the order the child document lists them.
    pub fn parents(&self, idx: NodeIndex) -> Vec<(NodeIndex, RelationKind)> {
        let mut edges: Vec<_> = self
            .graph
            .edges(idx)
            .map(|e| (e.id().index(), e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, target, kind)| (target, kind)).collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
