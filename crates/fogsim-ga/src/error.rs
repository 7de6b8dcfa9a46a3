//! Error taxonomy for the GA optimizers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GaError {
    /// Chromosome construction could not satisfy capacity + coverage +
    /// affinity within the retry budget. Indicates an impossible
    /// configuration (aggregate demand exceeds aggregate capacity).
    #[error(
        "could not seed initial population: no feasible individual found in {attempts} attempts \
         (total demand likely exceeds total capacity)"
    )]
    SeedInfeasible { attempts: u32 },

    /// Post-operator repair could not restore feasibility within the retry
    /// budget. Indicates an unlucky operator sequence rather than an
    /// impossible configuration; the population manager may recover by
    /// re-seeding the individual.
    #[error("could not repair individual after genetic operators ({attempts} attempts)")]
    RepairInfeasible { attempts: u32 },

    /// The problem definition itself is unusable (no nodes, no services,
    /// zero communities, mismatched dimensions).
    #[error("invalid problem: {0}")]
    InvalidProblem(String),
}
