//! FogSim GA — population-search optimizers for fog service placement.
//!
//! This crate provides the two genetic algorithms of the FogSim pipeline:
//!
//! | Optimizer | Encoding | Goal |
//! |-----------|----------|------|
//! | [`CommunityGa`] | community id per node | resource-balanced graph partition |
//! | [`PlacementGa`] | service × node boolean matrix | capacity- and affinity-feasible deployment |
//!
//! Both operate on plain problem-view types ([`NodeProfile`],
//! [`PlacementProblem`]) rather than on a graph representation, so the
//! simulation crate converts its topology into these views before a run.
//! All randomness flows through a caller-supplied [`rand::Rng`]; the same
//! seed and inputs reproduce the same chromosome byte for byte.

pub mod community;
pub mod error;
pub mod placement;

pub use community::{CommunityChromosome, CommunityGa, CommunityParams, CommunityWeights};
pub use error::GaError;
pub use placement::{
    Individual, PlacementChromosome, PlacementGa, PlacementParams, PlacementProblem,
};

/// Resource profile of one node, as seen by the community partitioner.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeProfile {
    pub ram: f64,
    pub ipt: f64,
    pub sto: f64,
}
