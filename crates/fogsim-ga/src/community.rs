//! Community partitioning with a generational genetic algorithm.
//!
//! A chromosome assigns each node a community id in `[1, num_communities]`.
//! Fitness combines a weighted global resource term, the variance of
//! community sizes, and the number of distinct communities; lower is better,
//! so the GA internally maximizes the negated value. No feasibility
//! constraint is enforced: empty or unbalanced communities are penalized
//! through the fitness, never rejected.

use crate::error::GaError;
use crate::NodeProfile;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Community id per node, index-aligned with the node profile slice.
pub type CommunityChromosome = Vec<u32>;

/// Weights of the community fitness function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommunityWeights {
    /// Weight of the global resource-usage term.
    pub omega_usage: f64,
    /// Weight of the community-size variance term.
    pub omega_balance: f64,
    /// Weight of the distinct-community-count term.
    pub omega_distinct: f64,
    pub w_ram: f64,
    pub w_sto: f64,
    pub w_ipt: f64,
}

impl Default for CommunityWeights {
    fn default() -> Self {
        Self {
            omega_usage: 0.4,
            omega_balance: 0.25,
            omega_distinct: 0.35,
            w_ram: 0.20,
            w_sto: 0.20,
            w_ipt: 0.25,
        }
    }
}

/// GA run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityParams {
    pub population_size: usize,
    pub generations: usize,
    /// Independent per-gene resampling probability.
    pub mutation_rate: f64,
    pub weights: CommunityWeights,
}

impl Default for CommunityParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            mutation_rate: 0.1,
            weights: CommunityWeights::default(),
        }
    }
}

/// Community partitioner over a fixed set of node profiles.
pub struct CommunityGa {
    profiles: Vec<NodeProfile>,
    num_communities: u32,
    params: CommunityParams,
}

impl CommunityGa {
    pub fn new(
        profiles: Vec<NodeProfile>,
        num_communities: u32,
        params: CommunityParams,
    ) -> Result<Self, GaError> {
        if profiles.is_empty() {
            return Err(GaError::InvalidProblem("no nodes to partition".into()));
        }
        if num_communities == 0 {
            return Err(GaError::InvalidProblem(
                "num_communities must be > 0".into(),
            ));
        }
        if params.population_size < 2 {
            return Err(GaError::InvalidProblem(
                "population_size must be >= 2".into(),
            ));
        }
        Ok(Self {
            profiles,
            num_communities,
            params,
        })
    }

    /// Fitness of a chromosome, negated so that higher is better.
    ///
    /// The resource term sums over the whole graph rather than per
    /// community; it acts as a global regularizer scaling the variance and
    /// distinct-count terms against the topology at hand.
    pub fn fitness(&self, chromosome: &[u32]) -> f64 {
        let w = &self.params.weights;
        let n = chromosome.len() as f64;
        let k = self.num_communities as f64;

        let mut counts = vec![0usize; self.num_communities as usize + 1];
        for &c in chromosome {
            counts[c as usize] += 1;
        }
        let target = n / k;
        let variance: f64 = counts[1..]
            .iter()
            .map(|&c| (c as f64 - target).powi(2))
            .sum();

        let resource_usage: f64 = self
            .profiles
            .iter()
            .map(|p| p.ram * w.w_ram + p.sto * w.w_sto + p.ipt * w.w_ipt)
            .sum();

        let distinct = {
            let mut seen = vec![false; self.num_communities as usize + 1];
            let mut count = 0usize;
            for &c in chromosome {
                if !seen[c as usize] {
                    seen[c as usize] = true;
                    count += 1;
                }
            }
            count as f64
        };

        -(w.omega_usage * resource_usage + w.omega_balance * variance + w.omega_distinct * distinct)
    }

    fn random_chromosome<R: Rng>(&self, rng: &mut R) -> CommunityChromosome {
        (0..self.profiles.len())
            .map(|_| rng.gen_range(1..=self.num_communities))
            .collect()
    }

    /// Roulette selection of one parent.
    ///
    /// Fitness values are shifted into a strictly positive range before
    /// normalizing, so negative fitness (the common case here, since raw
    /// fitness is negated cost) cannot corrupt the probability distribution.
    fn roulette<'a, R: Rng>(
        &self,
        rng: &mut R,
        population: &'a [CommunityChromosome],
        fitness_values: &[f64],
    ) -> &'a CommunityChromosome {
        let min = fitness_values
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let shifted: Vec<f64> = fitness_values.iter().map(|f| f - min + 1e-6).collect();
        let total: f64 = shifted.iter().sum();
        let mut pick = rng.gen::<f64>() * total;
        for (chromosome, weight) in population.iter().zip(&shifted) {
            pick -= weight;
            if pick <= 0.0 {
                return chromosome;
            }
        }
        // Floating-point residue: fall back to the last individual.
        population.last().unwrap_or(&population[0])
    }

    /// Single-point crossover; children exchange tails past the cut.
    fn crossover<R: Rng>(
        &self,
        rng: &mut R,
        parent1: &[u32],
        parent2: &[u32],
    ) -> (CommunityChromosome, CommunityChromosome) {
        let len = parent1.len();
        if len < 2 {
            return (parent1.to_vec(), parent2.to_vec());
        }
        let cut = rng.gen_range(1..len);
        let mut child1 = Vec::with_capacity(len);
        let mut child2 = Vec::with_capacity(len);
        child1.extend_from_slice(&parent1[..cut]);
        child1.extend_from_slice(&parent2[cut..]);
        child2.extend_from_slice(&parent2[..cut]);
        child2.extend_from_slice(&parent1[cut..]);
        (child1, child2)
    }

    fn mutate<R: Rng>(&self, rng: &mut R, chromosome: &mut CommunityChromosome) {
        for gene in chromosome.iter_mut() {
            if rng.gen::<f64>() < self.params.mutation_rate {
                *gene = rng.gen_range(1..=self.num_communities);
            }
        }
    }

    /// Run the GA for the configured number of generations and return the
    /// best chromosome seen across all generations, not just the final one.
    pub fn run<R: Rng>(&self, rng: &mut R) -> CommunityChromosome {
        let mut population: Vec<CommunityChromosome> = (0..self.params.population_size)
            .map(|_| self.random_chromosome(rng))
            .collect();

        let mut best: Option<(CommunityChromosome, f64)> = None;

        for _generation in 0..self.params.generations {
            let fitness_values: Vec<f64> =
                population.iter().map(|c| self.fitness(c)).collect();

            for (chromosome, &f) in population.iter().zip(&fitness_values) {
                if best.as_ref().map_or(true, |(_, bf)| f > *bf) {
                    best = Some((chromosome.clone(), f));
                }
            }

            let mut next = Vec::with_capacity(self.params.population_size);
            while next.len() < self.params.population_size {
                let parent1 = self.roulette(rng, &population, &fitness_values).clone();
                let parent2 = self.roulette(rng, &population, &fitness_values).clone();
                let (mut child1, mut child2) = self.crossover(rng, &parent1, &parent2);
                self.mutate(rng, &mut child1);
                self.mutate(rng, &mut child2);
                next.push(child1);
                if next.len() < self.params.population_size {
                    next.push(child2);
                }
            }
            population = next;
        }

        // The final generation never had its fitness scored in the loop.
        for chromosome in &population {
            let f = self.fitness(chromosome);
            if best.as_ref().map_or(true, |(_, bf)| f > *bf) {
                best = Some((chromosome.clone(), f));
            }
        }

        best.map(|(c, _)| c).unwrap_or_default()
    }
}
