//! Synthetic workload generation.
//!
//! Applications, their service chains, and the request sources attached to
//! gateway nodes are drawn from typed [`DistributionSpec`]s, so a scenario
//! file fully determines the workload given a seed.

use crate::service::{Application, Service, WorkloadSource};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),
    #[error("no nodes available to attach workload sources")]
    NoSourceNodes,
}

/// A sampling distribution, declared in the scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DistributionSpec {
    Uniform { min: f64, max: f64 },
    Exponential { mean: f64 },
}

impl DistributionSpec {
    pub fn validate(&self) -> Result<(), WorkloadError> {
        match *self {
            DistributionSpec::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(WorkloadError::InvalidDistribution(format!(
                        "uniform bounds [{min}, {max}]"
                    )));
                }
            }
            DistributionSpec::Exponential { mean } => {
                if !(mean.is_finite() && mean > 0.0) {
                    return Err(WorkloadError::InvalidDistribution(format!(
                        "exponential mean {mean}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<f64, WorkloadError> {
        match *self {
            DistributionSpec::Uniform { min, max } => {
                if min == max {
                    Ok(min)
                } else {
                    self.validate()?;
                    Ok(rng.gen_range(min..=max))
                }
            }
            DistributionSpec::Exponential { mean } => {
                let exp = Exp::new(1.0 / mean).map_err(|e| {
                    WorkloadError::InvalidDistribution(format!("exponential mean {mean}: {e}"))
                })?;
                Ok(exp.sample(rng))
            }
        }
    }
}

/// Parameters for the application generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppGenParams {
    pub num_apps: usize,
    pub deadline: DistributionSpec,
    pub min_services: usize,
    pub max_services: usize,
    pub service_ram: DistributionSpec,
    pub service_ipt: DistributionSpec,
    pub packet_size: DistributionSpec,
}

impl Default for AppGenParams {
    fn default() -> Self {
        Self {
            num_apps: 5,
            deadline: DistributionSpec::Uniform {
                min: 2600.0,
                max: 6600.0,
            },
            min_services: 2,
            max_services: 10,
            service_ram: DistributionSpec::Uniform { min: 1.0, max: 6.0 },
            service_ipt: DistributionSpec::Uniform { min: 1.0, max: 6.0 },
            packet_size: DistributionSpec::Uniform {
                min: 1_500_000.0,
                max: 4_500_000.0,
            },
        }
    }
}

/// Parameters for the request-source generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceGenParams {
    /// Sources attached per application.
    pub sources_per_app: usize,
    pub rate: DistributionSpec,
}

impl Default for SourceGenParams {
    fn default() -> Self {
        Self {
            sources_per_app: 3,
            rate: DistributionSpec::Uniform { min: 1.0, max: 5.0 },
        }
    }
}

/// Generate `num_apps` applications named `app{i}` with service chains
/// `app{i}_s{j}`.
pub fn generate_applications<R: Rng>(
    rng: &mut R,
    params: &AppGenParams,
) -> Result<Vec<Application>, WorkloadError> {
    let mut apps = Vec::with_capacity(params.num_apps);
    for i in 0..params.num_apps {
        let num_services = if params.min_services >= params.max_services {
            params.min_services
        } else {
            rng.gen_range(params.min_services..=params.max_services)
        };
        let mut services = Vec::with_capacity(num_services);
        for j in 0..num_services {
            services.push(Service {
                name: format!("app{i}_s{j}"),
                ram: params.service_ram.sample(rng)?.round(),
                ipt: params.service_ipt.sample(rng)?.round(),
                packet_size: params.packet_size.sample(rng)?,
            });
        }
        apps.push(Application {
            name: format!("app{i}"),
            services,
            deadline: params.deadline.sample(rng)?,
        });
    }
    Ok(apps)
}

/// Attach request sources to random attachment nodes, targeting each
/// application's entry service.
pub fn generate_sources<R: Rng>(
    rng: &mut R,
    attachment_nodes: &[String],
    apps: &[Application],
    params: &SourceGenParams,
) -> Result<Vec<WorkloadSource>, WorkloadError> {
    if attachment_nodes.is_empty() {
        return Err(WorkloadError::NoSourceNodes);
    }
    let mut sources = Vec::new();
    for app in apps {
        let Some(entry) = app.entry_service() else {
            continue;
        };
        for _ in 0..params.sources_per_app {
            let node = attachment_nodes
                .choose(rng)
                .ok_or(WorkloadError::NoSourceNodes)?;
            sources.push(WorkloadSource {
                source: node.clone(),
                target_service: entry.to_string(),
                rate: params.rate.sample(rng)?,
            });
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_uniform_sample_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let spec = DistributionSpec::Uniform { min: 2.0, max: 5.0 };
        for _ in 0..100 {
            let v = spec.sample(&mut rng).unwrap();
            assert!((2.0..=5.0).contains(&v));
        }
    }

    #[test]
    fn test_degenerate_uniform_is_constant() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let spec = DistributionSpec::Uniform { min: 3.0, max: 3.0 };
        assert_eq!(spec.sample(&mut rng).unwrap(), 3.0);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let spec = DistributionSpec::Uniform { min: 5.0, max: 2.0 };
        assert!(spec.validate().is_err());
        let spec = DistributionSpec::Exponential { mean: 0.0 };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_exponential_mean_roughly_matches() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let spec = DistributionSpec::Exponential { mean: 4.0 };
        let n = 20_000;
        let total: f64 = (0..n).map(|_| spec.sample(&mut rng).unwrap()).sum();
        let empirical = total / n as f64;
        assert!((empirical - 4.0).abs() < 0.2, "mean was {empirical}");
    }

    #[test]
    fn test_generated_apps_match_params() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let params = AppGenParams {
            num_apps: 4,
            ..Default::default()
        };
        let apps = generate_applications(&mut rng, &params).unwrap();
        assert_eq!(apps.len(), 4);
        for app in &apps {
            assert!((2..=10).contains(&app.services.len()));
            assert!((2600.0..=6600.0).contains(&app.deadline));
            for service in &app.services {
                assert!((1.0..=6.0).contains(&service.ram));
            }
        }
    }

    #[test]
    fn test_sources_target_entry_services() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let apps = generate_applications(&mut rng, &AppGenParams::default()).unwrap();
        let nodes = vec!["gw0".to_string(), "gw1".to_string()];
        let sources =
            generate_sources(&mut rng, &nodes, &apps, &SourceGenParams::default()).unwrap();
        assert_eq!(sources.len(), apps.len() * 3);
        for source in &sources {
            assert!(nodes.contains(&source.source));
            assert!(source.target_service.ends_with("_s0"));
            assert!((1.0..=5.0).contains(&source.rate));
        }
    }

    #[test]
    fn test_no_attachment_nodes_is_an_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let apps = generate_applications(&mut rng, &AppGenParams::default()).unwrap();
        let result = generate_sources(&mut rng, &[], &apps, &SourceGenParams::default());
        assert!(matches!(result, Err(WorkloadError::NoSourceNodes)));
    }
}
