//! FogSim CLI — Optimize and simulate fog service placements.

use clap::{Parser, Subcommand};
use fogsim_core::config::FogSimConfig;
use fogsim_core::graph::{GraphSpec, ResourceGraph};
use fogsim_core::routing::PlacementMap;
use fogsim_core::topology::{self, TopologyParams};
use fogsim_core::{metrics, routing, workload, EventSimulator};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "fogsim",
    about = "Optimize and simulate service placements on fog infrastructures",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: partition, place, route, simulate, evaluate.
    Run {
        /// Path to TOML scenario file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to topology JSON file.
        #[arg(short, long)]
        graph: PathBuf,
        /// Write the full outcome to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Partition the infrastructure into communities.
    Partition {
        /// Path to TOML scenario file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to topology JSON file.
        #[arg(short, long)]
        graph: PathBuf,
        /// Write the node-to-community map to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute a service placement for a generated workload.
    Place {
        /// Path to TOML scenario file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to topology JSON file.
        #[arg(short, long)]
        graph: PathBuf,
        /// Write the placement map to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate a workload against an existing placement.
    Simulate {
        /// Path to TOML scenario file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to topology JSON file.
        #[arg(short, long)]
        graph: PathBuf,
        /// Path to a placement map JSON file (service name to node names).
        #[arg(short, long)]
        placement: PathBuf,
        /// Write per-request results to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a random fog topology.
    GenTopology {
        /// Number of fog nodes.
        #[arg(long, default_value = "20")]
        nodes: usize,
        /// Edges added per node (preferential attachment).
        #[arg(long, default_value = "2")]
        edges: usize,
        /// Number of gateway nodes.
        #[arg(long, default_value = "4")]
        gateways: usize,
        /// Omit the cloud node.
        #[arg(long)]
        no_cloud: bool,
        /// Random seed.
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            graph,
            output,
        } => {
            let sim_config = load_config(&config);
            let mut graph = load_graph(&graph);
            let outcome = fogsim_core::run_pipeline(&sim_config, &mut graph).unwrap_or_else(|e| {
                eprintln!("Pipeline failed: {}", e);
                std::process::exit(1);
            });
            println!("{}", metrics::format_table(&outcome.metrics));
            write_json(output.as_deref(), &outcome);
        }
        Commands::Partition {
            config,
            graph,
            output,
        } => {
            let sim_config = load_config(&config);
            let mut graph = load_graph(&graph);
            let mut rng = ChaCha8Rng::seed_from_u64(sim_config.simulation.seed);
            let communities = fogsim_core::partition(&mut rng, &mut graph, &sim_config)
                .unwrap_or_else(|e| {
                    eprintln!("Partitioning failed: {}", e);
                    std::process::exit(1);
                });
            let mut sorted: Vec<_> = communities.iter().collect();
            sorted.sort();
            for (node, community) in sorted {
                println!("{node}: community {community}");
            }
            write_json(output.as_deref(), &communities);
        }
        Commands::Place {
            config,
            graph,
            output,
        } => {
            let sim_config = load_config(&config);
            let graph = load_graph(&graph);
            let mut rng = ChaCha8Rng::seed_from_u64(sim_config.simulation.seed);
            let apps = workload::generate_applications(&mut rng, &(&sim_config.workload).into())
                .unwrap_or_else(|e| {
                    eprintln!("Workload generation failed: {}", e);
                    std::process::exit(1);
                });
            let (best, placement) = fogsim_core::place(&mut rng, &graph, &sim_config, &apps)
                .unwrap_or_else(|e| {
                    eprintln!("Placement failed: {}", e);
                    std::process::exit(1);
                });
            println!(
                "Placement objectives: instances={:.3} distance={:.3} usage={:.3}",
                best.fitness[0], best.fitness[1], best.fitness[2]
            );
            let mut sorted: Vec<_> = placement.iter().collect();
            sorted.sort();
            for (service, nodes) in sorted {
                println!("{service}: {}", nodes.join(", "));
            }
            write_json(output.as_deref(), &placement);
        }
        Commands::Simulate {
            config,
            graph,
            placement,
            output,
        } => {
            let sim_config = load_config(&config);
            let graph = load_graph(&graph);
            let placement: PlacementMap = read_json(&placement);
            let mut rng = ChaCha8Rng::seed_from_u64(sim_config.simulation.seed);

            let apps = workload::generate_applications(&mut rng, &(&sim_config.workload).into())
                .unwrap_or_else(|e| {
                    eprintln!("Workload generation failed: {}", e);
                    std::process::exit(1);
                });
            let sources = workload::generate_sources(
                &mut rng,
                &graph.gateway_names(),
                &apps,
                &(&sim_config.workload).into(),
            )
            .unwrap_or_else(|e| {
                eprintln!("Workload generation failed: {}", e);
                std::process::exit(1);
            });
            let routes =
                routing::select_routes(&graph, &sources, &placement, sim_config.routing.mode)
                    .unwrap_or_else(|e| {
                        eprintln!("Route selection failed: {}", e);
                        std::process::exit(1);
                    });

            let results = EventSimulator::new(
                sim_config.simulation.horizon,
                sim_config.simulation.service_rate,
            )
            .and_then(|mut sim| {
                sim.load_workload(&mut rng, &sources, &placement, Some(&routes))?;
                Ok(sim.run(&mut rng))
            })
            .unwrap_or_else(|e| {
                eprintln!("Simulation failed: {}", e);
                std::process::exit(1);
            });

            println!(
                "{}",
                metrics::format_table(&metrics::evaluate(&results, &sources, &apps))
            );
            write_json(output.as_deref(), &results);
        }
        Commands::GenTopology {
            nodes,
            edges,
            gateways,
            no_cloud,
            seed,
            output,
        } => {
            let params = TopologyParams {
                num_fog_nodes: nodes,
                attachment_edges: edges,
                num_gateways: gateways,
                with_cloud: !no_cloud,
                ..Default::default()
            };
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let graph = topology::generate(&mut rng, &params).unwrap_or_else(|e| {
                eprintln!("Topology generation failed: {}", e);
                std::process::exit(1);
            });
            write_json(Some(&output), &graph.to_spec());
            println!(
                "Topology with {} nodes and {} links written to {}",
                graph.num_nodes(),
                graph.num_links(),
                output.display()
            );
        }
    }
}

fn load_config(path: &Path) -> FogSimConfig {
    FogSimConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    })
}

fn load_graph(path: &Path) -> ResourceGraph {
    let spec: GraphSpec = read_json(path);
    ResourceGraph::from_spec(&spec).unwrap_or_else(|e| {
        eprintln!("Error building graph: {}", e);
        std::process::exit(1);
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        std::process::exit(1);
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn write_json<T: serde::Serialize>(path: Option<&Path>, value: &T) {
    let Some(path) = path else {
        return;
    };
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        std::process::exit(1);
    });
    std::fs::write(path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
}
