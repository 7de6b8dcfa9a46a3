//! TOML configuration parsing for FogSim.
//!
//! Defines the scenario schema: simulation parameters, the two GA sections,
//! route selection, synthetic workload ranges, and affinity pins. Every
//! field has a default drawn from the reference experiment, so a minimal
//! scenario file only overrides what it cares about.

use crate::routing::RoutingMode;
use crate::service::AffinityConstraint;
use crate::workload::{AppGenParams, DistributionSpec, SourceGenParams};
use fogsim_ga::{CommunityParams, CommunityWeights, PlacementParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level scenario configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSimConfig {
    pub simulation: SimulationSection,
    pub community: CommunitySection,
    pub placement: PlacementSection,
    pub routing: RoutingSection,
    pub workload: WorkloadSection,
    /// Module-to-node pins.
    pub affinity: Vec<AffinityConstraint>,
}

/// General simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    /// Human-readable name for this scenario.
    pub name: String,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Simulation horizon: arrivals are generated up to this time.
    pub horizon: f64,
    /// Exponential service rate of every node.
    pub service_rate: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            name: "scenario".to_string(),
            seed: 42,
            horizon: 1000.0,
            service_rate: 5.0,
        }
    }
}

/// Community partitioner parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunitySection {
    pub num_communities: u32,
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub omega_usage: f64,
    pub omega_balance: f64,
    pub omega_distinct: f64,
    pub w_ram: f64,
    pub w_sto: f64,
    pub w_ipt: f64,
}

impl Default for CommunitySection {
    fn default() -> Self {
        let weights = CommunityWeights::default();
        Self {
            num_communities: 4,
            population_size: 50,
            generations: 100,
            mutation_rate: 0.1,
            omega_usage: weights.omega_usage,
            omega_balance: weights.omega_balance,
            omega_distinct: weights.omega_distinct,
            w_ram: weights.w_ram,
            w_sto: weights.w_sto,
            w_ipt: weights.w_ipt,
        }
    }
}

impl From<&CommunitySection> for CommunityParams {
    fn from(s: &CommunitySection) -> Self {
        CommunityParams {
            population_size: s.population_size,
            generations: s.generations,
            mutation_rate: s.mutation_rate,
            weights: CommunityWeights {
                omega_usage: s.omega_usage,
                omega_balance: s.omega_balance,
                omega_distinct: s.omega_distinct,
                w_ram: s.w_ram,
                w_sto: s.w_sto,
                w_ipt: s.w_ipt,
            },
        }
    }
}

/// Placement GA parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSection {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_probability: f64,
    pub max_seed_attempts: u32,
    pub max_mutation_attempts: u32,
    pub max_crossover_attempts: u32,
}

impl Default for PlacementSection {
    fn default() -> Self {
        let params = PlacementParams::default();
        Self {
            population_size: params.population_size,
            generations: params.generations,
            mutation_probability: params.mutation_probability,
            max_seed_attempts: params.max_seed_attempts,
            max_mutation_attempts: params.max_mutation_attempts,
            max_crossover_attempts: params.max_crossover_attempts,
        }
    }
}

impl From<&PlacementSection> for PlacementParams {
    fn from(s: &PlacementSection) -> Self {
        PlacementParams {
            population_size: s.population_size,
            generations: s.generations,
            mutation_probability: s.mutation_probability,
            max_seed_attempts: s.max_seed_attempts,
            max_mutation_attempts: s.max_mutation_attempts,
            max_crossover_attempts: s.max_crossover_attempts,
        }
    }
}

/// Route selection parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    pub mode: RoutingMode,
}

/// Synthetic workload ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSection {
    pub num_apps: usize,
    pub min_services: usize,
    pub max_services: usize,
    pub deadline: DistributionSpec,
    pub service_ram: DistributionSpec,
    pub service_ipt: DistributionSpec,
    pub packet_size: DistributionSpec,
    pub sources_per_app: usize,
    pub rate: DistributionSpec,
}

impl Default for WorkloadSection {
    fn default() -> Self {
        let apps = AppGenParams::default();
        let sources = SourceGenParams::default();
        Self {
            num_apps: apps.num_apps,
            min_services: apps.min_services,
            max_services: apps.max_services,
            deadline: apps.deadline,
            service_ram: apps.service_ram,
            service_ipt: apps.service_ipt,
            packet_size: apps.packet_size,
            sources_per_app: sources.sources_per_app,
            rate: sources.rate,
        }
    }
}

impl From<&WorkloadSection> for AppGenParams {
    fn from(s: &WorkloadSection) -> Self {
        AppGenParams {
            num_apps: s.num_apps,
            deadline: s.deadline,
            min_services: s.min_services,
            max_services: s.max_services,
            service_ram: s.service_ram,
            service_ipt: s.service_ipt,
            packet_size: s.packet_size,
        }
    }
}

impl From<&WorkloadSection> for SourceGenParams {
    fn from(s: &WorkloadSection) -> Self {
        SourceGenParams {
            sources_per_app: s.sources_per_app,
            rate: s.rate,
        }
    }
}

impl FogSimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: FogSimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.horizon <= 0.0 {
            return Err(ConfigError::Validation("horizon must be > 0".to_string()));
        }
        if self.simulation.service_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "service_rate must be > 0".to_string(),
            ));
        }
        if self.community.num_communities == 0 {
            return Err(ConfigError::Validation(
                "num_communities must be > 0".to_string(),
            ));
        }
        if self.community.population_size < 2 {
            return Err(ConfigError::Validation(
                "community population_size must be >= 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.community.mutation_rate) {
            return Err(ConfigError::Validation(
                "mutation_rate must be in [0, 1]".to_string(),
            ));
        }
        if self.placement.population_size < 2 {
            return Err(ConfigError::Validation(
                "placement population_size must be >= 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.placement.mutation_probability) {
            return Err(ConfigError::Validation(
                "mutation_probability must be in [0, 1]".to_string(),
            ));
        }
        if self.placement.max_seed_attempts == 0 || self.placement.max_crossover_attempts == 0 {
            return Err(ConfigError::Validation(
                "placement retry budgets must be > 0".to_string(),
            ));
        }
        if self.workload.min_services == 0 || self.workload.min_services > self.workload.max_services
        {
            return Err(ConfigError::Validation(format!(
                "service count range [{}, {}] is invalid",
                self.workload.min_services, self.workload.max_services
            )));
        }
        for (name, dist) in [
            ("deadline", &self.workload.deadline),
            ("service_ram", &self.workload.service_ram),
            ("service_ipt", &self.workload.service_ipt),
            ("packet_size", &self.workload.packet_size),
            ("rate", &self.workload.rate),
        ] {
            dist.validate()
                .map_err(|e| ConfigError::Validation(format!("workload.{name}: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[simulation]
name = "test-scenario"
seed = 123
horizon = 500.0
service_rate = 8.0

[community]
num_communities = 3
generations = 40

[placement]
population_size = 20
mutation_probability = 0.3

[routing]
mode = "latency"

[workload]
num_apps = 2
sources_per_app = 4
deadline = { kind = "uniform", min = 2000.0, max = 4000.0 }
rate = { kind = "exponential", mean = 2.0 }

[[affinity]]
app = "app0"
module = "app0_s1"
node = "n3"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = FogSimConfig::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.simulation.name, "test-scenario");
        assert_eq!(config.simulation.seed, 123);
        assert_eq!(config.community.num_communities, 3);
        assert_eq!(config.community.generations, 40);
        assert_eq!(config.placement.population_size, 20);
        assert_eq!(config.routing.mode, RoutingMode::Latency);
        assert_eq!(config.workload.num_apps, 2);
        assert_eq!(
            config.workload.rate,
            DistributionSpec::Exponential { mean: 2.0 }
        );
        assert_eq!(config.affinity.len(), 1);
        assert_eq!(config.affinity[0].node, "n3");
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = FogSimConfig::from_str("").unwrap();
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.simulation.horizon, 1000.0);
        assert_eq!(config.community.population_size, 50);
        assert_eq!(config.placement.generations, 50);
        assert_eq!(config.routing.mode, RoutingMode::Shortest);
        assert!(config.affinity.is_empty());
    }

    #[test]
    fn test_zero_service_rate_rejected() {
        let toml = "[simulation]\nservice_rate = 0.0\n";
        assert!(matches!(
            FogSimConfig::from_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_communities_rejected() {
        let toml = "[community]\nnum_communities = 0\n";
        assert!(matches!(
            FogSimConfig::from_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_workload_distribution_rejected() {
        let toml = "[workload]\nrate = { kind = \"uniform\", min = 5.0, max = 1.0 }\n";
        assert!(matches!(
            FogSimConfig::from_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_params_conversion() {
        let config = FogSimConfig::from_str(SAMPLE_CONFIG).unwrap();
        let community: CommunityParams = (&config.community).into();
        assert_eq!(community.generations, 40);
        let placement: PlacementParams = (&config.placement).into();
        assert_eq!(placement.population_size, 20);
        assert_eq!(placement.mutation_probability, 0.3);
    }
}
