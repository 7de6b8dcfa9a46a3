//! Random fog topology generation.
//!
//! Builds a Barabási–Albert style preferential-attachment graph of fog
//! nodes, optionally adds a high-capacity cloud node attached to the
//! best-connected fog node, and marks the lowest-degree nodes as gateways
//! (the network edge, where request sources attach).

use crate::graph::{FogNode, GraphError, Link, NodeRole, ResourceGraph};
use crate::workload::{DistributionSpec, WorkloadError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("need at least {needed} fog nodes, got {got}")]
    TooFewNodes { needed: usize, got: usize },
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Generator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyParams {
    pub num_fog_nodes: usize,
    /// Edges added per new node during preferential attachment.
    pub attachment_edges: usize,
    pub num_gateways: usize,
    pub with_cloud: bool,
    pub node_ram: DistributionSpec,
    pub node_ipt: DistributionSpec,
    pub node_sto: DistributionSpec,
    pub link_bw: DistributionSpec,
    pub link_pr: DistributionSpec,
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self {
            num_fog_nodes: 20,
            attachment_edges: 2,
            num_gateways: 4,
            with_cloud: true,
            node_ram: DistributionSpec::Uniform {
                min: 10.0,
                max: 25.0,
            },
            node_ipt: DistributionSpec::Uniform {
                min: 100.0,
                max: 1000.0,
            },
            node_sto: DistributionSpec::Uniform {
                min: 20.0,
                max: 200.0,
            },
            link_bw: DistributionSpec::Uniform {
                min: 6_000_000.0,
                max: 600_000_000.0,
            },
            link_pr: DistributionSpec::Uniform { min: 2.0, max: 10.0 },
        }
    }
}

/// Generate a random connected fog topology.
pub fn generate<R: Rng>(
    rng: &mut R,
    params: &TopologyParams,
) -> Result<ResourceGraph, TopologyError> {
    let m = params.attachment_edges.max(1);
    if params.num_fog_nodes <= m {
        return Err(TopologyError::TooFewNodes {
            needed: m + 1,
            got: params.num_fog_nodes,
        });
    }

    let mut graph = ResourceGraph::new();
    for i in 0..params.num_fog_nodes {
        graph.add_node(FogNode {
            name: format!("n{i}"),
            ram: params.node_ram.sample(rng)?.round(),
            ipt: params.node_ipt.sample(rng)?.round(),
            sto: params.node_sto.sample(rng)?,
            role: NodeRole::Fog,
            community: 0,
        })?;
    }

    // Preferential attachment: seed clique of m+1 nodes, then each new
    // node links to m targets drawn from the degree-weighted endpoint bag.
    let mut endpoint_bag: Vec<usize> = Vec::new();
    for a in 0..=m {
        for b in (a + 1)..=m {
            add_fog_link(&mut graph, rng, params, a, b)?;
            endpoint_bag.push(a);
            endpoint_bag.push(b);
        }
    }
    for new in (m + 1)..params.num_fog_nodes {
        let mut targets: Vec<usize> = Vec::with_capacity(m);
        while targets.len() < m {
            let &candidate = endpoint_bag
                .choose(rng)
                .unwrap_or(&(new - 1));
            if candidate != new && !targets.contains(&candidate) {
                targets.push(candidate);
            }
        }
        for &target in &targets {
            add_fog_link(&mut graph, rng, params, new, target)?;
            endpoint_bag.push(new);
            endpoint_bag.push(target);
        }
    }

    // Lowest-degree fog nodes become gateways.
    let mut by_degree: Vec<(usize, String)> = graph
        .node_names()
        .into_iter()
        .map(|name| Ok((graph.degree(&name)?, name)))
        .collect::<Result<_, GraphError>>()?;
    by_degree.sort();
    for (_, name) in by_degree.iter().take(params.num_gateways) {
        let idx = graph.node_index(name)?;
        graph.node_mut(idx).role = NodeRole::Gateway;
    }

    if params.with_cloud {
        let best_connected = by_degree
            .last()
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| "n0".to_string());
        graph.add_node(FogNode {
            name: "cloud".to_string(),
            ram: 1e6,
            ipt: 1e6,
            sto: 1e6,
            role: NodeRole::Cloud,
            community: 0,
        })?;
        // Cloud link: fat pipe, long propagation delay.
        graph.add_link(
            "cloud",
            &best_connected,
            Link {
                bw: 125_000_000.0,
                pr: 100.0,
            },
        )?;
    }

    Ok(graph)
}

fn add_fog_link<R: Rng>(
    graph: &mut ResourceGraph,
    rng: &mut R,
    params: &TopologyParams,
    a: usize,
    b: usize,
) -> Result<(), TopologyError> {
    graph.add_link(
        &format!("n{a}"),
        &format!("n{b}"),
        Link {
            bw: params.link_bw.sample(rng)?,
            pr: params.link_pr.sample(rng)?,
        },
    )?;
    Ok(())
}
