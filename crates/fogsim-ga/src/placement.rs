//! Constrained, user-affinity-aware service placement GA.
//!
//! A chromosome is a `[service][node]` boolean matrix. A feasible individual
//! deploys every service on at least one node, never exceeds any node's
//! capacity, and keeps every affinity-pinned module on its required node.
//! Operators may break feasibility; a repair pass restores it, and every
//! repair loop is bounded so an unlucky operator sequence surfaces as
//! [`GaError::RepairInfeasible`] instead of spinning forever.

use crate::error::GaError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Deployment matrix: `chromosome[service][node]`.
pub type PlacementChromosome = Vec<Vec<bool>>;

/// Problem view the GA operates on, decoupled from any graph type.
///
/// `distances` is a full node × node matrix (hop counts or latency,
/// whichever the caller measured). `affinity` holds `(service, node)` pairs
/// that must be deployed exactly as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementProblem {
    pub node_capacities: Vec<f64>,
    pub service_demands: Vec<f64>,
    /// Nodes where request sources attach; used by the distance objective.
    pub client_nodes: Vec<usize>,
    pub distances: Vec<Vec<f64>>,
    pub affinity: Vec<(usize, usize)>,
}

impl PlacementProblem {
    pub fn num_nodes(&self) -> usize {
        self.node_capacities.len()
    }

    pub fn num_services(&self) -> usize {
        self.service_demands.len()
    }

    fn validate(&self) -> Result<(), GaError> {
        if self.node_capacities.is_empty() {
            return Err(GaError::InvalidProblem("no nodes".into()));
        }
        if self.service_demands.is_empty() {
            return Err(GaError::InvalidProblem("no services".into()));
        }
        if self.distances.len() != self.num_nodes()
            || self.distances.iter().any(|row| row.len() != self.num_nodes())
        {
            return Err(GaError::InvalidProblem(
                "distance matrix does not match node count".into(),
            ));
        }
        if self.client_nodes.iter().any(|&n| n >= self.num_nodes()) {
            return Err(GaError::InvalidProblem("client node out of range".into()));
        }
        for &(service, node) in &self.affinity {
            if service >= self.num_services() || node >= self.num_nodes() {
                return Err(GaError::InvalidProblem(format!(
                    "affinity pair ({service}, {node}) out of range"
                )));
            }
        }
        Ok(())
    }
}

/// One candidate solution with its evaluated objective vector
/// (mean instance count, mean client distance, mean resource-usage ratio;
/// all minimized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub chromosome: PlacementChromosome,
    pub fitness: Vec<f64>,
}

/// GA run parameters, including the retry budgets that bound every
/// feasibility loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementParams {
    pub population_size: usize,
    pub generations: usize,
    /// Probability that an offspring is mutated.
    pub mutation_probability: f64,
    pub max_seed_attempts: u32,
    pub max_mutation_attempts: u32,
    pub max_crossover_attempts: u32,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            population_size: 30,
            generations: 50,
            mutation_probability: 0.25,
            max_seed_attempts: 1000,
            max_mutation_attempts: 100,
            max_crossover_attempts: 50,
        }
    }
}

/// True iff fitness vector `a` Pareto-dominates `b` (minimization):
/// `a` is no worse on every objective and strictly better on at least one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (&x, &y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

fn lexicographic_less(a: &[f64], b: &[f64]) -> bool {
    for (&x, &y) in a.iter().zip(b) {
        if x < y {
            return true;
        }
        if x > y {
            return false;
        }
    }
    false
}

/// `a` beats `b`: dominance first, lexicographic order to break ties
/// between mutually non-dominating vectors.
fn better(a: &[f64], b: &[f64]) -> bool {
    if dominates(a, b) {
        return true;
    }
    if dominates(b, a) {
        return false;
    }
    lexicographic_less(a, b)
}

/// Exchange the `[first..=second]` segment of every service row between two
/// chromosomes. Applying the same cuts a second time reconstructs the
/// parents, which the crossover feasibility loop relies on being cheap.
pub fn exchange_segments(
    a: &PlacementChromosome,
    b: &PlacementChromosome,
    cuts: &[(usize, usize)],
) -> (PlacementChromosome, PlacementChromosome) {
    let mut child1 = a.clone();
    let mut child2 = b.clone();
    for (service, &(first, second)) in cuts.iter().enumerate() {
        for node in first..=second {
            child1[service][node] = b[service][node];
            child2[service][node] = a[service][node];
        }
    }
    (child1, child2)
}

/// The placement optimizer.
pub struct PlacementGa<'a> {
    problem: &'a PlacementProblem,
    params: PlacementParams,
    /// Per-service flag: pinned by an affinity constraint.
    protected_services: Vec<bool>,
    /// Per-node flag: target of an affinity constraint.
    protected_nodes: Vec<bool>,
}

impl<'a> PlacementGa<'a> {
    pub fn new(problem: &'a PlacementProblem, params: PlacementParams) -> Result<Self, GaError> {
        problem.validate()?;
        if params.population_size < 2 {
            return Err(GaError::InvalidProblem(
                "population_size must be >= 2".into(),
            ));
        }
        let mut protected_services = vec![false; problem.num_services()];
        let mut protected_nodes = vec![false; problem.num_nodes()];
        for &(service, node) in &problem.affinity {
            protected_services[service] = true;
            protected_nodes[node] = true;
        }
        Ok(Self {
            problem,
            params,
            protected_services,
            protected_nodes,
        })
    }

    // --- Construction ---

    /// Build one random chromosome against a private residual-capacity
    /// ledger. Affinity services are force-assigned first; everything else
    /// picks 1..4 candidate nodes with remaining headroom, falling back to
    /// arbitrary nodes when too few qualify (the constraint check catches
    /// the overload afterwards).
    fn random_chromosome<R: Rng>(&self, rng: &mut R) -> PlacementChromosome {
        let nodes = self.problem.num_nodes();
        let services = self.problem.num_services();
        let mut chromosome = vec![vec![false; nodes]; services];
        let mut residual = self.problem.node_capacities.clone();
        let mut forced = vec![false; services];

        for &(service, node) in &self.problem.affinity {
            if residual[node] >= self.problem.service_demands[service] {
                chromosome[service][node] = true;
                residual[node] -= self.problem.service_demands[service];
                forced[service] = true;
            }
            // Insufficient capacity: leave unset so the feasibility check
            // rejects this candidate.
        }

        let all_nodes: Vec<usize> = (0..nodes).collect();
        for service in 0..services {
            if forced[service] {
                continue;
            }
            let demand = self.problem.service_demands[service];
            let want = rng.gen_range(1..4usize).min(nodes);
            let candidates: Vec<usize> = (0..nodes).filter(|&n| residual[n] >= demand).collect();
            let chosen: Vec<usize> = if candidates.len() >= want {
                candidates.choose_multiple(rng, want).copied().collect()
            } else {
                all_nodes.choose_multiple(rng, want).copied().collect()
            };
            for node in chosen {
                chromosome[service][node] = true;
                residual[node] -= demand;
            }
        }
        chromosome
    }

    /// Construct a feasible individual within the seed retry budget.
    fn seed_individual<R: Rng>(&self, rng: &mut R) -> Result<Individual, GaError> {
        for _ in 0..self.params.max_seed_attempts {
            let chromosome = self.random_chromosome(rng);
            if self.check_constraints(&chromosome) {
                let fitness = self.evaluate(&chromosome);
                return Ok(Individual { chromosome, fitness });
            }
        }
        Err(GaError::SeedInfeasible {
            attempts: self.params.max_seed_attempts,
        })
    }

    // --- Feasibility ---

    fn node_usage(&self, chromosome: &PlacementChromosome) -> Vec<f64> {
        let mut usage = vec![0.0; self.problem.num_nodes()];
        for (service, row) in chromosome.iter().enumerate() {
            for (node, &deployed) in row.iter().enumerate() {
                if deployed {
                    usage[node] += self.problem.service_demands[service];
                }
            }
        }
        usage
    }

    pub fn check_constraints(&self, chromosome: &PlacementChromosome) -> bool {
        // Every service deployed somewhere.
        if chromosome.iter().any(|row| !row.iter().any(|&d| d)) {
            return false;
        }
        // No node over capacity.
        let usage = self.node_usage(chromosome);
        for (node, &used) in usage.iter().enumerate() {
            if used > self.problem.node_capacities[node] {
                return false;
            }
        }
        // Every affinity bit present.
        self.problem
            .affinity
            .iter()
            .all(|&(service, node)| chromosome[service][node])
    }

    fn enforce_affinity(&self, chromosome: &mut PlacementChromosome) {
        for &(service, node) in &self.problem.affinity {
            chromosome[service][node] = true;
        }
    }

    /// Best-effort repair: shed allocations from overloaded nodes (never a
    /// service's last instance or an affinity bit), then deploy any
    /// uncovered service on the first node with headroom.
    fn repair(&self, chromosome: &mut PlacementChromosome) {
        let mut usage = self.node_usage(chromosome);
        let affinity_bits: Vec<(usize, usize)> = self.problem.affinity.clone();

        for node in 0..self.problem.num_nodes() {
            while usage[node] > self.problem.node_capacities[node] {
                let removable = (0..self.problem.num_services()).find(|&service| {
                    chromosome[service][node]
                        && !affinity_bits.contains(&(service, node))
                        && chromosome[service].iter().filter(|&&d| d).count() > 1
                });
                match removable {
                    Some(service) => {
                        chromosome[service][node] = false;
                        usage[node] -= self.problem.service_demands[service];
                    }
                    None => break,
                }
            }
        }

        for service in 0..self.problem.num_services() {
            if chromosome[service].iter().any(|&d| d) {
                continue;
            }
            let demand = self.problem.service_demands[service];
            if let Some(node) = (0..self.problem.num_nodes())
                .find(|&n| usage[n] + demand <= self.problem.node_capacities[n])
            {
                chromosome[service][node] = true;
                usage[node] += demand;
            }
        }
    }

    // --- Objectives ---

    fn mean_instance_count(&self, chromosome: &PlacementChromosome) -> f64 {
        let instances: usize = chromosome
            .iter()
            .map(|row| row.iter().filter(|&&d| d).count())
            .sum();
        instances as f64 / chromosome.len() as f64
    }

    fn mean_client_distance(&self, chromosome: &PlacementChromosome) -> f64 {
        if self.problem.client_nodes.is_empty() {
            return 0.0;
        }
        let mut total = 0.0;
        for row in chromosome {
            let deployed: Vec<usize> = row
                .iter()
                .enumerate()
                .filter_map(|(node, &d)| d.then_some(node))
                .collect();
            if deployed.is_empty() {
                // Uncovered services are infeasible anyway; keep the
                // objective finite so repair-era evaluations stay ordered.
                total += f64::MAX / self.problem.num_services() as f64;
                continue;
            }
            let per_client: f64 = self
                .problem
                .client_nodes
                .iter()
                .map(|&client| {
                    deployed
                        .iter()
                        .map(|&node| self.problem.distances[node][client])
                        .fold(f64::INFINITY, f64::min)
                })
                .sum();
            total += per_client / self.problem.client_nodes.len() as f64;
        }
        total / chromosome.len() as f64
    }

    fn mean_resource_usage(&self, chromosome: &PlacementChromosome) -> f64 {
        let usage = self.node_usage(chromosome);
        let ratios: f64 = usage
            .iter()
            .zip(&self.problem.node_capacities)
            .map(|(&used, &cap)| if cap > 0.0 { used / cap } else { 0.0 })
            .sum();
        ratios / self.problem.num_nodes() as f64
    }

    pub fn evaluate(&self, chromosome: &PlacementChromosome) -> Vec<f64> {
        vec![
            self.mean_instance_count(chromosome),
            self.mean_client_distance(chromosome),
            self.mean_resource_usage(chromosome),
        ]
    }

    // --- Operators ---

    /// Two-point per-service-row crossover with repair; bounded retries.
    fn crossover<R: Rng>(
        &self,
        rng: &mut R,
        parent1: &Individual,
        parent2: &Individual,
    ) -> Result<(Individual, Individual), GaError> {
        let nodes = self.problem.num_nodes();
        for _ in 0..self.params.max_crossover_attempts {
            let cuts: Vec<(usize, usize)> = (0..self.problem.num_services())
                .map(|_| {
                    let first = rng.gen_range(0..nodes);
                    let second = rng.gen_range(first..nodes);
                    (first, second)
                })
                .collect();
            let (mut c1, mut c2) =
                exchange_segments(&parent1.chromosome, &parent2.chromosome, &cuts);
            for child in [&mut c1, &mut c2] {
                self.enforce_affinity(child);
                self.repair(child);
            }
            if self.check_constraints(&c1) && self.check_constraints(&c2) {
                let f1 = self.evaluate(&c1);
                let f2 = self.evaluate(&c2);
                return Ok((
                    Individual {
                        chromosome: c1,
                        fitness: f1,
                    },
                    Individual {
                        chromosome: c2,
                        fitness: f2,
                    },
                ));
            }
        }
        Err(GaError::RepairInfeasible {
            attempts: self.params.max_crossover_attempts,
        })
    }

    fn swap_node_columns<R: Rng>(&self, rng: &mut R, chromosome: &mut PlacementChromosome) {
        let free_nodes: Vec<usize> = (0..self.problem.num_nodes())
            .filter(|&n| !self.protected_nodes[n])
            .collect();
        if free_nodes.len() < 2 {
            return;
        }
        let picked: Vec<usize> = free_nodes.choose_multiple(rng, 2).copied().collect();
        let (a, b) = (picked[0], picked[1]);
        for (service, row) in chromosome.iter_mut().enumerate() {
            if !self.protected_services[service] {
                row.swap(a, b);
            }
        }
    }

    fn swap_service_rows<R: Rng>(&self, rng: &mut R, chromosome: &mut PlacementChromosome) {
        let free_services: Vec<usize> = (0..self.problem.num_services())
            .filter(|&s| !self.protected_services[s])
            .collect();
        if free_services.len() < 2 {
            return;
        }
        let picked: Vec<usize> = free_services.choose_multiple(rng, 2).copied().collect();
        chromosome.swap(picked[0], picked[1]);
    }

    /// Mutate in place with one of the swap operators; on retry exhaustion
    /// the individual is reset from scratch rather than left infeasible.
    fn mutate<R: Rng>(&self, rng: &mut R, individual: &mut Individual) -> Result<(), GaError> {
        for _ in 0..self.params.max_mutation_attempts {
            let mut candidate = individual.chromosome.clone();
            if rng.gen_bool(0.5) {
                self.swap_node_columns(rng, &mut candidate);
            } else {
                self.swap_service_rows(rng, &mut candidate);
            }
            self.enforce_affinity(&mut candidate);
            self.repair(&mut candidate);
            if self.check_constraints(&candidate) {
                individual.fitness = self.evaluate(&candidate);
                individual.chromosome = candidate;
                return Ok(());
            }
        }
        *individual = self.seed_individual(rng)?;
        Ok(())
    }

    // --- Evolution ---

    fn tournament<'p, R: Rng>(
        &self,
        rng: &mut R,
        population: &'p [Individual],
    ) -> &'p Individual {
        let picked = rand::seq::index::sample(rng, population.len(), 2.min(population.len()));
        let a = &population[picked.index(0)];
        if picked.len() < 2 {
            return a;
        }
        let b = &population[picked.index(1)];
        if better(&a.fitness, &b.fitness) {
            a
        } else {
            b
        }
    }

    /// One generational replacement. Crossover failures are absorbed by
    /// seeding fresh individuals so a single unlucky pairing cannot abort
    /// the run.
    fn evolve<R: Rng>(
        &self,
        rng: &mut R,
        population: &mut Vec<Individual>,
    ) -> Result<(), GaError> {
        let target = self.params.population_size;
        let mut next: Vec<Individual> = Vec::with_capacity(target);
        while next.len() < target {
            let parent1 = self.tournament(rng, population).clone();
            let parent2 = self.tournament(rng, population).clone();
            match self.crossover(rng, &parent1, &parent2) {
                Ok((mut child1, mut child2)) => {
                    for child in [&mut child1, &mut child2] {
                        if rng.gen::<f64>() < self.params.mutation_probability {
                            self.mutate(rng, child)?;
                        }
                    }
                    next.push(child1);
                    if next.len() < target {
                        next.push(child2);
                    }
                }
                Err(GaError::RepairInfeasible { .. }) => {
                    next.push(self.seed_individual(rng)?);
                }
                Err(other) => return Err(other),
            }
        }
        *population = next;
        Ok(())
    }

    /// Run the full GA and return the best individual seen across all
    /// generations.
    pub fn run<R: Rng>(&self, rng: &mut R) -> Result<Individual, GaError> {
        let mut population: Vec<Individual> = (0..self.params.population_size)
            .map(|_| self.seed_individual(rng))
            .collect::<Result<_, _>>()?;

        let mut incumbent = population
            .iter()
            .min_by(|a, b| {
                if better(&a.fitness, &b.fitness) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                }
            })
            .cloned()
            .ok_or_else(|| GaError::InvalidProblem("empty population".into()))?;

        for _generation in 0..self.params.generations {
            self.evolve(rng, &mut population)?;
            for individual in &population {
                if better(&individual.fitness, &incumbent.fitness) {
                    incumbent = individual.clone();
                }
            }
        }
        Ok(incumbent)
    }
}
