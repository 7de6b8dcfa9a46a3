//! Route selection between workload sources and deployed service instances.
//!
//! Given a placement (service name to hosting nodes) and a topology, pick
//! one path per `(source node, target service)` pair: the best path to any
//! instance under the configured cost. Unreachable targets keep an empty
//! path so the simulator can still process the request without hop data.

use crate::graph::{EdgeCost, GraphError, ResourceGraph};
use crate::service::WorkloadSource;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("unknown routing mode: {0} (expected \"shortest\" or \"latency\")")]
    InvalidMode(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// How path cost is measured during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Fewest hops.
    #[default]
    Shortest,
    /// Lowest accumulated propagation delay.
    Latency,
}

impl RoutingMode {
    fn edge_cost(self) -> EdgeCost {
        match self {
            RoutingMode::Shortest => EdgeCost::Hops,
            RoutingMode::Latency => EdgeCost::Latency,
        }
    }
}

impl FromStr for RoutingMode {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortest" => Ok(RoutingMode::Shortest),
            "latency" => Ok(RoutingMode::Latency),
            other => Err(RoutingError::InvalidMode(other.to_string())),
        }
    }
}

/// Service name to the nodes hosting it.
pub type PlacementMap = HashMap<String, Vec<String>>;

/// `(source node, target service)` to the selected node path. An empty
/// path means no instance was reachable.
pub type RouteMap = HashMap<(String, String), Vec<String>>;

/// Select one route per workload source.
///
/// A service with no entry in `placement` is an error; a service whose
/// instances are all unreachable from the source gets an empty path.
pub fn select_routes(
    graph: &ResourceGraph,
    sources: &[WorkloadSource],
    placement: &PlacementMap,
    mode: RoutingMode,
) -> Result<RouteMap, RoutingError> {
    let mut routes = RouteMap::new();
    for ws in sources {
        let key = (ws.source.clone(), ws.target_service.clone());
        if routes.contains_key(&key) {
            continue;
        }
        let instances = placement
            .get(&ws.target_service)
            .ok_or_else(|| GraphError::UnknownService(ws.target_service.clone()))?;

        let mut best: Option<Vec<String>> = None;
        let mut best_cost = f64::INFINITY;
        for node in instances {
            let Some(path) = graph.shortest_path(&ws.source, node, mode.edge_cost())? else {
                continue;
            };
            let cost = match mode {
                RoutingMode::Shortest => path.len().saturating_sub(1) as f64,
                RoutingMode::Latency => path_latency(graph, &path)?,
            };
            if cost < best_cost {
                best_cost = cost;
                best = Some(path);
            }
        }
        routes.insert(key, best.unwrap_or_default());
    }
    Ok(routes)
}

/// Select one route per communicating service pair: the best path between
/// any hosting node of the source service and any hosting node of the
/// destination service. Empty path when no pair of instances is connected.
pub fn select_service_routes(
    graph: &ResourceGraph,
    service_pairs: &[(String, String)],
    placement: &PlacementMap,
    mode: RoutingMode,
) -> Result<RouteMap, RoutingError> {
    let mut routes = RouteMap::new();
    for (src, dst) in service_pairs {
        let key = (src.clone(), dst.clone());
        if routes.contains_key(&key) {
            continue;
        }
        let src_nodes = placement
            .get(src)
            .ok_or_else(|| GraphError::UnknownService(src.clone()))?;
        let dst_nodes = placement
            .get(dst)
            .ok_or_else(|| GraphError::UnknownService(dst.clone()))?;

        let mut best: Option<Vec<String>> = None;
        let mut best_cost = f64::INFINITY;
        for a in src_nodes {
            for b in dst_nodes {
                let Some(path) = graph.shortest_path(a, b, mode.edge_cost())? else {
                    continue;
                };
                let cost = match mode {
                    RoutingMode::Shortest => path.len().saturating_sub(1) as f64,
                    RoutingMode::Latency => path_latency(graph, &path)?,
                };
                if cost < best_cost {
                    best_cost = cost;
                    best = Some(path);
                }
            }
        }
        routes.insert(key, best.unwrap_or_default());
    }
    Ok(routes)
}

/// Sum of propagation delays along a node path.
pub fn path_latency(graph: &ResourceGraph, path: &[String]) -> Result<f64, RoutingError> {
    let mut total = 0.0;
    for pair in path.windows(2) {
        let link = graph
            .link_between(&pair[0], &pair[1])?
            .ok_or_else(|| GraphError::UnknownNode(format!("{}-{}", pair[0], pair[1])))?;
        total += link.pr;
    }
    Ok(total)
}
