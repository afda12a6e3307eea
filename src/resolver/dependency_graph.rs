//! Dependency graph for whole-tree resolution.
//!
//! Nodes are package ids; an edge `a → b` means `a` requires `b`. Used to
//! reject cycles before a tree is handed to the installer.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::core::{PackageId, StackpmError};

/// Color states for DFS cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited
    White,
    /// On the current DFS path
    Gray,
    /// Fully explored
    Black,
}

/// Directed graph of package requirements.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<PackageId, ()>,
    node_map: HashMap<PackageId, NodeIndex>,
}

impl DependencyGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node if it is not already present.
    pub fn ensure_node(&mut self, id: &PackageId) -> NodeIndex {
        if let Some(&index) = self.node_map.get(id) {
            index
        } else {
            let index = self.graph.add_node(id.clone());
            self.node_map.insert(id.clone(), index);
            index
        }
    }

    /// Records that `from` requires `to`.
    pub fn add_dependency(&mut self, from: &PackageId, to: &PackageId) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Number of packages in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Fails with the first cycle found, rendered as `a → b → a`.
    pub fn detect_cycles(&self) -> Result<(), StackpmError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) != Some(&Color::White) {
                continue;
            }
            if let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path) {
                let chain = cycle.iter().map(ToString::to_string).collect::<Vec<_>>().join(" → ");
                return Err(StackpmError::CircularDependency { chain });
            }
        }

        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<PackageId>,
    ) -> Option<Vec<PackageId>> {
        colors.insert(node, Color::Gray);
        path.push(self.graph[node].clone());

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|id| *id == self.graph[neighbor]).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }
}
