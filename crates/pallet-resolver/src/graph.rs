//! Job ordering graph and cycle detection.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::job::JobId;

/// Jobs as nodes; an edge `a -> b` means `a` comes after `b`.
#[derive(Debug, Default)]
pub struct JobGraph {
    graph: DiGraph<JobId, ()>,
    index: HashMap<JobId, NodeIndex>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or retrieve a node.
    pub fn add_node(&mut self, id: &JobId) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.index.insert(id.clone(), idx);
        idx
    }

    /// Record that `job` comes after `comes_after`.
    pub fn add_edge(&mut self, job: &JobId, comes_after: &JobId) {
        let from = self.add_node(job);
        let to = self.add_node(comes_after);
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Strongly connected components that are real cycles: more than one
    /// job, or a job that waits for itself. Members are sorted.
    pub fn cycles(&self) -> Vec<Vec<JobId>> {
        let mut out: Vec<Vec<JobId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .is_some_and(|&n| self.graph.edges(n).any(|e| e.target() == n))
            })
            .map(|scc| {
                let mut ids: Vec<JobId> = scc.into_iter().map(|n| self.graph[n].clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::new(s)
    }

    #[test]
    fn nodes_and_edges_are_deduplicated() {
        let mut g = JobGraph::new();
        g.add_edge(&id("a"), &id("b"));
        g.add_edge(&id("a"), &id("b"));
        assert_eq!(g.len(), 2);
        assert_eq!(g.graph.edge_count(), 1);
    }

    #[test]
    fn finds_cycles() {
        let mut g = JobGraph::new();
        g.add_edge(&id("a"), &id("b"));
        g.add_edge(&id("b"), &id("c"));
        g.add_edge(&id("c"), &id("a"));
        g.add_edge(&id("d"), &id("a"));
        g.add_edge(&id("e"), &id("e"));
        assert_eq!(
            g.cycles(),
            vec![vec![id("a"), id("b"), id("c")], vec![id("e")]]
        );
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let mut g = JobGraph::new();
        g.add_edge(&id("a"), &id("b"));
        g.add_node(&id("c"));
        assert!(g.cycles().is_empty());
        assert!(!g.is_empty());
    }
}
