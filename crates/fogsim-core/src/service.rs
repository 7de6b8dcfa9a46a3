//! Application, service, and workload-source model.
//!
//! An [`Application`] is an ordered chain of [`Service`]s with an end-to-end
//! deadline; requests enter at the first service. [`WorkloadSource`]s attach
//! request generators to graph nodes, and [`AffinityConstraint`]s pin a
//! service to a specific node (a user-owned device that must host its own
//! module).

use serde::{Deserialize, Serialize};

/// One deployable module of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// RAM demand, in the same unit as node capacity.
    pub ram: f64,
    /// Instructions per request, drives processing time.
    pub ipt: f64,
    /// Bytes transferred per request along the chain.
    pub packet_size: f64,
}

/// An application: a named chain of services and a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub services: Vec<Service>,
    /// End-to-end deadline in simulation time units.
    pub deadline: f64,
}

impl Application {
    /// Name of the service requests enter at.
    pub fn entry_service(&self) -> Option<&str> {
        self.services.first().map(|s| s.name.as_str())
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}

/// A request generator attached to a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSource {
    /// Node the requests originate from.
    pub source: String,
    /// Service the requests are addressed to.
    pub target_service: String,
    /// Mean arrival rate (requests per time unit, Poisson).
    pub rate: f64,
}

/// Pins one application module to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityConstraint {
    pub app: String,
    pub module: String,
    pub node: String,
}
