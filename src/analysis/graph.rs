//! Variable dependency graph of a formula batch.

use std::collections::VecDeque;
use std::fmt::Write;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::analysis::expr_info::ExprInfo;

/// A graph vertex: a variable name and the formulas whose first target it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub index: usize,
    /// Batch positions of the owning formulas, in input order.
    pub formulas: Vec<usize>,
}

/// Variable names mapped to vertex numbers in insertion order.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: IndexMap<String, Node, RandomState>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if missing and return its vertex number.
    pub fn add(&mut self, name: &str) -> usize {
        if let Some(node) = self.nodes.get(name) {
            return node.index;
        }
        let index = self.nodes.len();
        self.nodes
            .insert(name.to_string(), Node {
                index,
                formulas: Vec::new(),
            });
        index
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    pub fn by_index(&self, index: usize) -> Option<(&str, &Node)> {
        self.nodes
            .get_index(index)
            .map(|(name, node)| (name.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Directed graph over vertex numbers with adjacency lists.
#[derive(Debug, Clone, Default)]
pub struct Digraph {
    adjacency: Vec<Vec<usize>>,
    indegree: Vec<usize>,
    edges: usize,
}

impl Digraph {
    pub fn new(vertices: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); vertices],
            indegree: vec![0; vertices],
            edges: 0,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// Add `from -> to`. Parallel edges are collapsed.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if self.adjacency[from].contains(&to) {
            return;
        }
        self.adjacency[from].push(to);
        self.indegree[to] += 1;
        self.edges += 1;
    }

    pub fn adjacent(&self, vertex: usize) -> &[usize] {
        &self.adjacency[vertex]
    }

    pub fn indegree(&self, vertex: usize) -> usize {
        self.indegree[vertex]
    }

    /// Kahn's algorithm. On a cycle, returns the vertices that were never released.
    pub fn topological_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut indegree = self.indegree.clone();
        let mut queue: VecDeque<usize> = (0..self.vertex_count())
            .filter(|&v| indegree[v] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.vertex_count());

        while let Some(u) = queue.pop_front() {
            order.push(u);
            for &v in &self.adjacency[u] {
                indegree[v] -= 1;
                if indegree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        if order.len() < self.vertex_count() {
            let remaining = (0..self.vertex_count())
                .filter(|&v| indegree[v] > 0)
                .collect();
            return Err(remaining);
        }
        Ok(order)
    }
}

/// The nodes and edges built from the assignment formulas of one batch.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: NodeSet,
    graph: Digraph,
}

impl DependencyGraph {
    /// Only assignments contribute. Each precursor of a formula gets an edge
    /// to each of its successors; the first successor carries the formula.
    pub fn build(infos: &[ExprInfo]) -> Self {
        let mut nodes = NodeSet::new();
        for (position, info) in infos.iter().enumerate() {
            if !info.is_assign() {
                continue;
            }
            for name in info.precursors() {
                nodes.add(name);
            }
            let mut first = true;
            for name in info.successors() {
                nodes.add(name);
                if first {
                    if let Some(node) = nodes.get_mut(name) {
                        node.formulas.push(position);
                    }
                    first = false;
                }
            }
        }

        let mut graph = Digraph::new(nodes.len());
        for info in infos.iter().filter(|info| info.is_assign()) {
            for precursor in info.precursors() {
                let Some(from) = nodes.get(precursor).map(|n| n.index) else {
                    continue;
                };
                for successor in info.successors() {
                    if let Some(to) = nodes.get(successor).map(|n| n.index) {
                        graph.add_edge(from, to);
                    }
                }
            }
        }

        Self { nodes, graph }
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn graph(&self) -> &Digraph {
        &self.graph
    }

    pub fn has_assign(&self) -> bool {
        self.graph.vertex_count() > 0
    }

    pub fn name_of(&self, vertex: usize) -> &str {
        self.nodes.by_index(vertex).map_or("", |(name, _)| name)
    }

    /// Human-readable adjacency listing, one line per vertex.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} vertices, {} edges",
            self.graph.vertex_count(),
            self.graph.edge_count()
        );
        for u in 0..self.graph.vertex_count() {
            let _ = write!(
                out,
                "{}({}-{}): ",
                u,
                self.name_of(u),
                self.graph.indegree(u)
            );
            for &v in self.graph.adjacent(u) {
                let _ = write!(out, "{}({}) ", v, self.name_of(v));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn infos(sources: &[&str]) -> Vec<ExprInfo> {
        sources
            .iter()
            .enumerate()
            .map(|(i, s)| ExprInfo::new(Parser::parse_source(s).unwrap(), i))
            .collect()
    }

    #[test]
    fn test_kahn_order() {
        let mut graph = Digraph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(0, 2);
        graph.add_edge(3, 2);
        assert_eq!(graph.topological_order().unwrap(), vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_kahn_reports_cycle() {
        let mut graph = Digraph::new(3);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 1);
        assert_eq!(graph.topological_order().unwrap_err(), vec![1, 2]);
    }

    #[test]
    fn test_parallel_edges_collapse() {
        let mut graph = Digraph::new(2);
        graph.add_edge(0, 1);
        graph.add_edge(0, 1);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.indegree(1), 1);
    }

    #[test]
    fn test_first_successor_carries_formula() {
        let dependency = DependencyGraph::build(&infos(&["x = y = a + b"]));
        assert_eq!(dependency.nodes().get("x").unwrap().formulas, vec![0]);
        assert!(dependency.nodes().get("y").unwrap().formulas.is_empty());
        assert!(dependency.nodes().get("a").unwrap().formulas.is_empty());
    }

    #[test]
    fn test_formulas_sharing_a_target_are_all_kept() {
        let dependency = DependencyGraph::build(&infos(&["x = 1", "x = a"]));
        assert_eq!(dependency.nodes().get("x").unwrap().formulas, vec![0, 1]);
    }

    #[test]
    fn test_plain_formulas_build_no_graph() {
        let dependency = DependencyGraph::build(&infos(&["a + b", "c > 1"]));
        assert!(!dependency.has_assign());
        assert_eq!(dependency.describe(), "0 vertices, 0 edges\n");
    }

    #[test]
    fn test_describe() {
        let dependency = DependencyGraph::build(&infos(&["b = a * 2", "c = b + 1"]));
        assert_eq!(
            dependency.describe(),
            "3 vertices, 2 edges\n0(a-0): 1(b) \n1(b-1): 2(c) \n2(c-1): \n"
        );
    }
}
