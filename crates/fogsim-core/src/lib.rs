//! FogSim — Fog service placement optimization and queueing simulation.
//!
//! This crate models a fog infrastructure graph, partitions it into
//! communities, places application services with a constrained GA, selects
//! routes from request sources to service instances, and replays the
//! workload through a discrete-event M/M/1 simulator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐   ┌───────────┐
//! │ Topology │──▶│ Community   │──▶│ Placement │──▶│  Routing  │
//! │ (graph)  │   │ Partitioner │   │    GA     │   │ Selection │
//! └──────────┘   └─────────────┘   └───────────┘   └─────┬─────┘
//!                                                        │
//!                                  ┌───────────┐   ┌─────▼─────┐
//!                                  │  Metrics  │◀──│ Simulator │
//!                                  │ (Evaluate)│   │ (Events)  │
//!                                  └───────────┘   └───────────┘
//! ```

pub mod clock;
pub mod config;
pub mod graph;
pub mod metrics;
pub mod routing;
pub mod service;
pub mod sim;
pub mod topology;
pub mod workload;

// Re-export key types for convenience.
pub use clock::SimClock;
pub use config::FogSimConfig;
pub use graph::{FogNode, GraphSpec, Link, NodeRole, ResourceGraph};
pub use metrics::EvalMetrics;
pub use routing::{PlacementMap, RouteMap, RoutingMode};
pub use service::{AffinityConstraint, Application, Service, WorkloadSource};
pub use sim::{EventSimulator, SimulationResult};

use fogsim_ga::{CommunityGa, GaError, Individual, NodeProfile, PlacementGa, PlacementProblem};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Graph(#[from] graph::GraphError),
    #[error(transparent)]
    Ga(#[from] GaError),
    #[error(transparent)]
    Routing(#[from] routing::RoutingError),
    #[error(transparent)]
    Workload(#[from] workload::WorkloadError),
    #[error(transparent)]
    Sim(#[from] sim::SimError),
    #[error("affinity constraint references unknown module: {0}")]
    UnknownAffinityModule(String),
}

/// Everything a full pipeline run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Node name to community id.
    pub communities: HashMap<String, u32>,
    /// Service name to hosting nodes.
    pub placement: PlacementMap,
    /// Objective vector of the chosen placement.
    pub placement_fitness: Vec<f64>,
    /// Routes from each request source to its target service.
    pub routes: Vec<RouteEntry>,
    /// Routes between consecutive services of each application chain.
    pub service_routes: Vec<RouteEntry>,
    pub applications: Vec<Application>,
    pub sources: Vec<WorkloadSource>,
    pub results: Vec<SimulationResult>,
    pub metrics: EvalMetrics,
}

/// One selected route, in serialization-friendly form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    pub source: String,
    pub target_service: String,
    pub path: Vec<String>,
}

/// Flatten a route map into sorted [`RouteEntry`] records.
pub fn route_entries(routes: &RouteMap) -> Vec<RouteEntry> {
    let mut entries: Vec<RouteEntry> = routes
        .iter()
        .map(|((source, target_service), path)| RouteEntry {
            source: source.clone(),
            target_service: target_service.clone(),
            path: path.clone(),
        })
        .collect();
    entries.sort_by(|a, b| {
        (&a.source, &a.target_service).cmp(&(&b.source, &b.target_service))
    });
    entries
}

/// Consecutive service pairs of every application chain.
pub fn service_pairs(apps: &[Application]) -> Vec<(String, String)> {
    apps.iter()
        .flat_map(|app| {
            app.services
                .windows(2)
                .map(|pair| (pair[0].name.clone(), pair[1].name.clone()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Extract the community partitioner's view of the graph.
pub fn community_problem(graph: &ResourceGraph) -> Vec<NodeProfile> {
    graph
        .nodes()
        .map(|n| NodeProfile {
            ram: n.ram,
            ipt: n.ipt,
            sto: n.sto,
        })
        .collect()
}

/// Write a community assignment back onto the graph nodes.
pub fn assign_communities(
    graph: &mut ResourceGraph,
    chromosome: &[u32],
) -> Result<HashMap<String, u32>, PipelineError> {
    let names = graph.node_names();
    let mut communities = HashMap::new();
    for (name, &community) in names.iter().zip(chromosome) {
        let idx = graph.node_index(name)?;
        graph.node_mut(idx).community = community;
        communities.insert(name.clone(), community);
    }
    Ok(communities)
}

/// Flattened service list in application order: the canonical service
/// numbering shared by the placement problem and the placement map.
pub fn flatten_services(apps: &[Application]) -> Vec<Service> {
    apps.iter().flat_map(|a| a.services.clone()).collect()
}

/// Resolve name-based affinity pins into `(service index, node index)`
/// pairs against the canonical numberings.
pub fn resolve_affinity(
    graph: &ResourceGraph,
    services: &[Service],
    constraints: &[AffinityConstraint],
) -> Result<Vec<(usize, usize)>, PipelineError> {
    let node_names = graph.node_names();
    let mut pairs = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        let service = services
            .iter()
            .position(|s| s.name == constraint.module)
            .ok_or_else(|| PipelineError::UnknownAffinityModule(constraint.module.clone()))?;
        let node = node_names
            .iter()
            .position(|n| *n == constraint.node)
            .ok_or_else(|| graph::GraphError::UnknownNode(constraint.node.clone()))?;
        pairs.push((service, node));
    }
    Ok(pairs)
}

/// Build the placement GA's problem view. Capacity and demand are RAM;
/// clients are the gateway nodes; distances are hop counts.
pub fn placement_problem(
    graph: &ResourceGraph,
    apps: &[Application],
    constraints: &[AffinityConstraint],
) -> Result<(PlacementProblem, Vec<Service>), PipelineError> {
    let services = flatten_services(apps);
    let node_names = graph.node_names();
    let client_nodes = graph
        .gateway_names()
        .iter()
        .filter_map(|g| node_names.iter().position(|n| n == g))
        .collect();
    let problem = PlacementProblem {
        node_capacities: graph.nodes().map(|n| n.ram).collect(),
        service_demands: services.iter().map(|s| s.ram).collect(),
        client_nodes,
        distances: graph.hop_distances(),
        affinity: resolve_affinity(graph, &services, constraints)?,
    };
    Ok((problem, services))
}

/// Decode a placement chromosome into a service-name to node-names map.
pub fn placement_map(
    individual: &Individual,
    services: &[Service],
    node_names: &[String],
) -> PlacementMap {
    let mut map = PlacementMap::new();
    for (row, service) in individual.chromosome.iter().zip(services) {
        let nodes = row
            .iter()
            .enumerate()
            .filter_map(|(i, &deployed)| deployed.then(|| node_names[i].clone()))
            .collect();
        map.insert(service.name.clone(), nodes);
    }
    map
}

/// Run the community partitioner stage.
pub fn partition<R: Rng>(
    rng: &mut R,
    graph: &mut ResourceGraph,
    config: &FogSimConfig,
) -> Result<HashMap<String, u32>, PipelineError> {
    let ga = CommunityGa::new(
        community_problem(graph),
        config.community.num_communities,
        (&config.community).into(),
    )?;
    let chromosome = ga.run(rng);
    assign_communities(graph, &chromosome)
}

/// Run the placement stage against already-generated applications.
pub fn place<R: Rng>(
    rng: &mut R,
    graph: &ResourceGraph,
    config: &FogSimConfig,
    apps: &[Application],
) -> Result<(Individual, PlacementMap), PipelineError> {
    let (problem, services) = placement_problem(graph, apps, &config.affinity)?;
    let ga = PlacementGa::new(&problem, (&config.placement).into())?;
    let best = ga.run(rng)?;
    let map = placement_map(&best, &services, &graph.node_names());
    Ok((best, map))
}

/// Run the full pipeline: workload generation, partitioning, placement,
/// route selection, simulation, evaluation. All randomness flows from the
/// configured seed.
pub fn run_pipeline(
    config: &FogSimConfig,
    graph: &mut ResourceGraph,
) -> Result<PipelineOutcome, PipelineError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.simulation.seed);

    let applications =
        workload::generate_applications(&mut rng, &(&config.workload).into())?;
    let sources = workload::generate_sources(
        &mut rng,
        &graph.gateway_names(),
        &applications,
        &(&config.workload).into(),
    )?;

    let communities = partition(&mut rng, graph, config)?;
    let (best, placement) = place(&mut rng, graph, config, &applications)?;
    let routes = routing::select_routes(graph, &sources, &placement, config.routing.mode)?;
    let service_routes = routing::select_service_routes(
        graph,
        &service_pairs(&applications),
        &placement,
        config.routing.mode,
    )?;

    let mut simulator =
        EventSimulator::new(config.simulation.horizon, config.simulation.service_rate)?;
    simulator.load_workload(&mut rng, &sources, &placement, Some(&routes))?;
    let results = simulator.run(&mut rng);
    let metrics = metrics::evaluate(&results, &sources, &applications);

    Ok(PipelineOutcome {
        communities,
        placement,
        placement_fitness: best.fitness,
        routes: route_entries(&routes),
        service_routes: route_entries(&service_routes),
        applications,
        sources,
        results,
        metrics,
    })
}
