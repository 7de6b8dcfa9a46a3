/// Integration tests for the full optimization and simulation pipeline.
use fogsim_core::config::FogSimConfig;
use fogsim_core::graph::{FogNode, Link, NodeRole, ResourceGraph};
use fogsim_core::topology::{self, TopologyParams};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn scenario_config() -> FogSimConfig {
    FogSimConfig::from_str(
        r#"
[simulation]
name = "integration-test"
seed = 42
horizon = 200.0
service_rate = 50.0

[community]
num_communities = 3
population_size = 20
generations = 15

[placement]
population_size = 10
generations = 8

[routing]
mode = "shortest"

[workload]
num_apps = 2
min_services = 2
max_services = 3
sources_per_app = 2
service_ram = { kind = "uniform", min = 1.0, max = 2.0 }
rate = { kind = "uniform", min = 1.0, max = 2.0 }
"#,
    )
    .unwrap()
}

fn small_topology() -> ResourceGraph {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let params = TopologyParams {
        num_fog_nodes: 12,
        attachment_edges: 2,
        num_gateways: 3,
        with_cloud: true,
        ..Default::default()
    };
    topology::generate(&mut rng, &params).unwrap()
}

#[test]
fn test_full_pipeline_produces_consistent_outcome() {
    let config = scenario_config();
    let mut graph = small_topology();
    let outcome = fogsim_core::run_pipeline(&config, &mut graph).unwrap();

    // Every node got a community in range.
    assert_eq!(outcome.communities.len(), graph.num_nodes());
    for &community in outcome.communities.values() {
        assert!((1..=3).contains(&community));
    }

    // Every service of every application is placed on at least one node.
    let node_names = graph.node_names();
    for app in &outcome.applications {
        for service in &app.services {
            let hosts = outcome
                .placement
                .get(&service.name)
                .unwrap_or_else(|| panic!("{} not placed", service.name));
            assert!(!hosts.is_empty());
            assert!(hosts.iter().all(|h| node_names.contains(h)));
        }
    }

    // One route per distinct (source, entry service) pair, ending at a
    // node that hosts the service.
    for route in &outcome.routes {
        if let Some(last) = route.path.last() {
            assert!(outcome.placement[&route.target_service].contains(last));
        }
    }

    // Service-chain routes connect hosting nodes of both ends.
    for route in &outcome.service_routes {
        if let (Some(first), Some(last)) = (route.path.first(), route.path.last()) {
            assert!(outcome.placement[&route.source].contains(first));
            assert!(outcome.placement[&route.target_service].contains(last));
        }
    }

    // Requests completed and were aggregated.
    assert!(outcome.metrics.total_requests > 0);
    assert_eq!(
        outcome.metrics.total_requests as usize,
        outcome.results.len()
    );
    assert!(outcome.metrics.avg_delay > 0.0);
}

#[test]
fn test_pipeline_is_deterministic() {
    let config = scenario_config();
    let outcome_a = fogsim_core::run_pipeline(&config, &mut small_topology()).unwrap();
    let outcome_b = fogsim_core::run_pipeline(&config, &mut small_topology()).unwrap();

    assert_eq!(outcome_a.communities, outcome_b.communities);
    assert_eq!(outcome_a.placement, outcome_b.placement);
    assert_eq!(outcome_a.placement_fitness, outcome_b.placement_fitness);
    assert_eq!(outcome_a.results.len(), outcome_b.results.len());
    assert_eq!(outcome_a.metrics, outcome_b.metrics);
}

#[test]
fn test_affinity_pin_survives_the_pipeline() {
    let mut config = scenario_config();
    config.affinity = vec![fogsim_core::AffinityConstraint {
        app: "app0".to_string(),
        module: "app0_s0".to_string(),
        node: "n5".to_string(),
    }];
    let mut graph = small_topology();
    let outcome = fogsim_core::run_pipeline(&config, &mut graph).unwrap();
    assert!(outcome.placement["app0_s0"].contains(&"n5".to_string()));
}

#[test]
fn test_unknown_affinity_node_fails() {
    let mut config = scenario_config();
    config.affinity = vec![fogsim_core::AffinityConstraint {
        app: "app0".to_string(),
        module: "app0_s0".to_string(),
        node: "nowhere".to_string(),
    }];
    let mut graph = small_topology();
    assert!(fogsim_core::run_pipeline(&config, &mut graph).is_err());
}

#[test]
fn test_pipeline_on_hand_built_graph() {
    // Star topology: one hub, three leaves; the leaves are gateways.
    let mut graph = ResourceGraph::new();
    graph
        .add_node(FogNode {
            name: "hub".to_string(),
            ram: 50.0,
            ipt: 1000.0,
            sto: 100.0,
            role: NodeRole::Fog,
            community: 0,
        })
        .unwrap();
    for i in 0..3 {
        graph
            .add_node(FogNode {
                name: format!("leaf{i}"),
                ram: 20.0,
                ipt: 500.0,
                sto: 50.0,
                role: NodeRole::Gateway,
                community: 0,
            })
            .unwrap();
        graph
            .add_link("hub", &format!("leaf{i}"), Link { bw: 1e7, pr: 3.0 })
            .unwrap();
    }

    let mut config = scenario_config();
    config.community.num_communities = 2;
    let outcome = fogsim_core::run_pipeline(&config, &mut graph).unwrap();
    assert_eq!(outcome.communities.len(), 4);
    assert!(outcome.metrics.total_requests > 0);
    // All sources sit on gateways, so every route starts at a leaf.
    for route in &outcome.routes {
        assert!(route.source.starts_with("leaf"));
    }
}
