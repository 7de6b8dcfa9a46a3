//! Fog infrastructure topology.
//!
//! Wraps an undirected [`petgraph`] graph of [`FogNode`]s connected by
//! [`Link`]s, with name-based lookup on top of node indices. A topology is
//! exchanged as a [`GraphSpec`] JSON document and converted into a
//! [`ResourceGraph`] before any optimization or simulation runs.

use petgraph::algo::{astar, dijkstra};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("duplicate node: {0}")]
    DuplicateNode(String),
    #[error("unknown service: {0}")]
    UnknownService(String),
}

/// Role of a node in the infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    #[default]
    Fog,
    /// Attachment point for request sources.
    Gateway,
    Cloud,
}

/// One infrastructure node with its resource capacities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogNode {
    pub name: String,
    /// RAM capacity.
    pub ram: f64,
    /// Instructions per time unit.
    pub ipt: f64,
    /// Storage capacity.
    pub sto: f64,
    #[serde(default)]
    pub role: NodeRole,
    /// Community id assigned by the partitioner, 0 when unassigned.
    #[serde(default)]
    pub community: u32,
}

/// One network link between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Bandwidth in bytes per time unit.
    pub bw: f64,
    /// Propagation delay in time units.
    pub pr: f64,
}

/// Serialized topology document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub ram: f64,
    pub ipt: f64,
    pub sto: f64,
    #[serde(default)]
    pub role: NodeRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
    pub bw: f64,
    pub pr: f64,
}

/// Edge cost used for route selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeCost {
    /// Every edge costs one hop.
    Hops,
    /// Edge cost is its propagation delay.
    Latency,
}

/// The fog topology with name-based node lookup.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    graph: UnGraph<FogNode, Link>,
    index: HashMap<String, NodeIndex>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            index: HashMap::new(),
        }
    }

    /// Build a graph from a serialized topology document.
    pub fn from_spec(spec: &GraphSpec) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in &spec.nodes {
            graph.add_node(node.clone().into())?;
        }
        for edge in &spec.edges {
            graph.add_link(
                &edge.source,
                &edge.target,
                Link {
                    bw: edge.bw,
                    pr: edge.pr,
                },
            )?;
        }
        Ok(graph)
    }

    /// Serialize back into a topology document.
    pub fn to_spec(&self) -> GraphSpec {
        let nodes = self
            .graph
            .node_indices()
            .map(|idx| {
                let node = &self.graph[idx];
                NodeSpec {
                    name: node.name.clone(),
                    ram: node.ram,
                    ipt: node.ipt,
                    sto: node.sto,
                    role: node.role,
                }
            })
            .collect();
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = self.graph.edge_endpoints(edge)?;
                let link = self.graph[edge];
                Some(EdgeSpec {
                    source: self.graph[a].name.clone(),
                    target: self.graph[b].name.clone(),
                    bw: link.bw,
                    pr: link.pr,
                })
            })
            .collect();
        GraphSpec { nodes, edges }
    }

    pub fn add_node(&mut self, node: FogNode) -> Result<NodeIndex, GraphError> {
        if self.index.contains_key(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(name, idx);
        Ok(idx)
    }

    pub fn add_link(&mut self, a: &str, b: &str, link: Link) -> Result<(), GraphError> {
        let ia = self.node_index(a)?;
        let ib = self.node_index(b)?;
        self.graph.add_edge(ia, ib, link);
        Ok(())
    }

    pub fn node_index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    pub fn node(&self, idx: NodeIndex) -> &FogNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut FogNode {
        &mut self.graph[idx]
    }

    pub fn node_by_name(&self, name: &str) -> Result<&FogNode, GraphError> {
        Ok(self.node(self.node_index(name)?))
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node names in index order. Index positions are stable for the
    /// lifetime of the graph (nodes are never removed), so this order is
    /// the canonical node numbering for the optimizers.
    pub fn node_names(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].name.clone())
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FogNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    pub fn degree(&self, name: &str) -> Result<usize, GraphError> {
        let idx = self.node_index(name)?;
        Ok(self.graph.neighbors(idx).count())
    }

    /// Nodes with the gateway role; falls back to all nodes when the
    /// topology declares none.
    pub fn gateway_names(&self) -> Vec<String> {
        let gateways: Vec<String> = self
            .nodes()
            .filter(|n| n.role == NodeRole::Gateway)
            .map(|n| n.name.clone())
            .collect();
        if gateways.is_empty() {
            self.node_names()
        } else {
            gateways
        }
    }

    /// Link between two adjacent named nodes, if one exists.
    pub fn link_between(&self, a: &str, b: &str) -> Result<Option<Link>, GraphError> {
        let ia = self.node_index(a)?;
        let ib = self.node_index(b)?;
        Ok(self.graph.find_edge(ia, ib).map(|e| self.graph[e]))
    }

    /// Shortest path between two named nodes under the given edge cost.
    /// Returns `None` when the target is unreachable.
    pub fn shortest_path(
        &self,
        from: &str,
        to: &str,
        cost: EdgeCost,
    ) -> Result<Option<Vec<String>>, GraphError> {
        let start = self.node_index(from)?;
        let goal = self.node_index(to)?;
        let result = astar(
            &self.graph,
            start,
            |n| n == goal,
            |edge| match cost {
                EdgeCost::Hops => 1.0,
                EdgeCost::Latency => edge.weight().pr,
            },
            |_| 0.0,
        );
        Ok(result.map(|(_, path)| {
            path.into_iter()
                .map(|idx| self.graph[idx].name.clone())
                .collect()
        }))
    }

    /// Full hop-count distance matrix, indexed like [`Self::node_names`].
    /// Unreachable pairs are `f64::INFINITY`.
    pub fn hop_distances(&self) -> Vec<Vec<f64>> {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut matrix = vec![vec![f64::INFINITY; indices.len()]; indices.len()];
        for (row, &start) in indices.iter().enumerate() {
            let reached = dijkstra(&self.graph, start, None, |_| 1.0);
            for (col, &other) in indices.iter().enumerate() {
                if let Some(&d) = reached.get(&other) {
                    matrix[row][col] = d;
                }
            }
        }
        matrix
    }
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl From<NodeSpec> for FogNode {
    fn from(spec: NodeSpec) -> Self {
        FogNode {
            name: spec.name,
            ram: spec.ram,
            ipt: spec.ipt,
            sto: spec.sto,
            role: spec.role,
            community: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fog_node(name: &str) -> FogNode {
        FogNode {
            name: name.to_string(),
            ram: 4.0,
            ipt: 100.0,
            sto: 0.5,
            role: NodeRole::Fog,
            community: 0,
        }
    }

    /// Line n0 - n1 - n2 plus a slow shortcut n0 - n2.
    fn line_with_shortcut() -> ResourceGraph {
        let mut g = ResourceGraph::new();
        for name in ["n0", "n1", "n2"] {
            g.add_node(fog_node(name)).unwrap();
        }
        g.add_link("n0", "n1", Link { bw: 1e6, pr: 1.0 }).unwrap();
        g.add_link("n1", "n2", Link { bw: 1e6, pr: 1.0 }).unwrap();
        g.add_link("n0", "n2", Link { bw: 1e6, pr: 10.0 }).unwrap();
        g
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut g = ResourceGraph::new();
        g.add_node(fog_node("a")).unwrap();
        assert!(matches!(
            g.add_node(fog_node("a")),
            Err(GraphError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_shortest_path_by_hops_takes_shortcut() {
        let g = line_with_shortcut();
        let path = g.shortest_path("n0", "n2", EdgeCost::Hops).unwrap().unwrap();
        assert_eq!(path, vec!["n0", "n2"]);
    }

    #[test]
    fn test_shortest_path_by_latency_avoids_slow_link() {
        let g = line_with_shortcut();
        let path = g
            .shortest_path("n0", "n2", EdgeCost::Latency)
            .unwrap()
            .unwrap();
        assert_eq!(path, vec!["n0", "n1", "n2"]);
    }

    #[test]
    fn test_unreachable_node_yields_none() {
        let mut g = line_with_shortcut();
        g.add_node(fog_node("island")).unwrap();
        assert_eq!(
            g.shortest_path("n0", "island", EdgeCost::Hops).unwrap(),
            None
        );
    }

    #[test]
    fn test_hop_distance_matrix() {
        let g = line_with_shortcut();
        let m = g.hop_distances();
        assert_eq!(m[0][0], 0.0);
        assert_eq!(m[0][1], 1.0);
        assert_eq!(m[0][2], 1.0); // shortcut
        assert_eq!(m[1][2], 1.0);
    }

    #[test]
    fn test_spec_round_trip() {
        let g = line_with_shortcut();
        let spec = g.to_spec();
        let rebuilt = ResourceGraph::from_spec(&spec).unwrap();
        assert_eq!(rebuilt.num_nodes(), 3);
        assert_eq!(rebuilt.num_links(), 3);
        assert_eq!(rebuilt.node_by_name("n1").unwrap().ram, 4.0);
    }

    #[test]
    fn test_gateway_fallback_when_no_gateways() {
        let g = line_with_shortcut();
        assert_eq!(g.gateway_names().len(), 3);
    }
}
