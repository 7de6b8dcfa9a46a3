//! Discrete-event M/M/1 queueing simulator.
//!
//! Each serving node is a single server with an unbounded FIFO queue.
//! Arrivals are Poisson per workload source (pre-generated to the horizon);
//! service times are exponential with a global service rate. The event loop
//! pops the earliest event, advances the virtual clock, and processes it.
//!
//! Event semantics per node:
//! - `Arrival` enqueues the request; if the server is free at `now`, a
//!   service start is scheduled at `now` and `busy_until` is advanced so a
//!   second arrival at the same timestamp cannot also claim the server.
//! - `StartService` pops the queue head and schedules its completion.
//! - `EndService` records the result; if the queue is non-empty, the next
//!   start is scheduled at the finish time, again advancing `busy_until`
//!   first so an arrival at exactly the finish time sees the server taken.

use crate::clock::SimClock;
use crate::routing::{PlacementMap, RouteMap};
use crate::service::WorkloadSource;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, HashMap, VecDeque};
// Display/Error are written by hand: `thiserror` treats a field named
// `source` as the error's source, which a `String` cannot be.
#[derive(Debug)]
pub enum SimError {
    MissingPlacement { source: String, service: String },
    InvalidRate { source: String, rate: f64 },
    InvalidServiceRate(f64),
    InvalidHorizon(f64),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::MissingPlacement { source, service } => write!(
                f,
                "service {service} targeted by source {source} has no placement"
            ),
            SimError::InvalidRate { source, rate } => {
                write!(f, "invalid arrival rate {rate} for source {source}")
            }
            SimError::InvalidServiceRate(rate) => write!(f, "invalid service rate {rate}"),
            SimError::InvalidHorizon(h) => write!(f, "invalid simulation horizon {h}"),
        }
    }
}

impl std::error::Error for SimError {}

/// One request travelling through the simulator.
#[derive(Debug, Clone)]
pub struct Request {
    pub source: String,
    pub target_service: String,
    /// Node the request is served at.
    pub node: String,
    pub arrival_time: f64,
    /// Selected route, when route selection ran. `None` means no routing
    /// stage; an empty path means the target was unreachable.
    pub path: Option<Vec<String>>,
}

/// Completion record for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub source: String,
    pub target_service: String,
    pub node: String,
    pub arrival_time: f64,
    pub start_time: f64,
    pub finish_time: f64,
    pub delay: f64,
    pub path: Option<Vec<String>>,
}

/// Events in the discrete-event simulation.
#[derive(Debug, Clone)]
enum SimEvent {
    Arrival(Request),
    StartService { node: String },
    EndService { request: Request, start_time: f64 },
}

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent {
    time: f64,
    sequence: u64,
    event: SimEvent,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap, equal times in
        // insertion order.
        other
            .time
            .total_cmp(&self.time)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// The queueing simulator.
pub struct EventSimulator {
    pub clock: SimClock,
    horizon: f64,
    service_dist: Exp<f64>,
    event_queue: BinaryHeap<TimedEvent>,
    sequence: u64,
    queues: HashMap<String, VecDeque<Request>>,
    busy_until: HashMap<String, f64>,
    results: Vec<SimulationResult>,
    pub events_processed: u64,
}

impl EventSimulator {
    pub fn new(horizon: f64, service_rate: f64) -> Result<Self, SimError> {
        if !(horizon.is_finite() && horizon > 0.0) {
            return Err(SimError::InvalidHorizon(horizon));
        }
        let service_dist =
            Exp::new(service_rate).map_err(|_| SimError::InvalidServiceRate(service_rate))?;
        Ok(Self {
            clock: SimClock::new(),
            horizon,
            service_dist,
            event_queue: BinaryHeap::new(),
            sequence: 0,
            queues: HashMap::new(),
            busy_until: HashMap::new(),
            results: Vec::new(),
            events_processed: 0,
        })
    }

    fn schedule_event(&mut self, time: f64, event: SimEvent) {
        self.event_queue.push(TimedEvent {
            time,
            sequence: self.sequence,
            event,
        });
        self.sequence += 1;
    }

    /// Pre-generate Poisson arrivals for every workload source up to the
    /// horizon. Each source's requests are served at the last node of its
    /// selected route, or at the first placed instance when no route map
    /// is given.
    pub fn load_workload<R: Rng>(
        &mut self,
        rng: &mut R,
        sources: &[WorkloadSource],
        placement: &PlacementMap,
        routes: Option<&RouteMap>,
    ) -> Result<(), SimError> {
        for ws in sources {
            let instances =
                placement
                    .get(&ws.target_service)
                    .ok_or_else(|| SimError::MissingPlacement {
                        source: ws.source.clone(),
                        service: ws.target_service.clone(),
                    })?;
            let path = routes
                .map(|r| {
                    r.get(&(ws.source.clone(), ws.target_service.clone()))
                        .cloned()
                        .unwrap_or_default()
                });
            let node = match &path {
                Some(p) if !p.is_empty() => p[p.len() - 1].clone(),
                _ => instances
                    .first()
                    .cloned()
                    .ok_or_else(|| SimError::MissingPlacement {
                        source: ws.source.clone(),
                        service: ws.target_service.clone(),
                    })?,
            };
            let interarrival = Exp::new(ws.rate).map_err(|_| SimError::InvalidRate {
                source: ws.source.clone(),
                rate: ws.rate,
            })?;

            let mut t = interarrival.sample(rng);
            while t <= self.horizon {
                self.schedule_event(
                    t,
                    SimEvent::Arrival(Request {
                        source: ws.source.clone(),
                        target_service: ws.target_service.clone(),
                        node: node.clone(),
                        arrival_time: t,
                        path: path.clone(),
                    }),
                );
                t += interarrival.sample(rng);
            }
        }
        Ok(())
    }

    /// Run until the event queue drains; completions scheduled past the
    /// horizon are still processed. Returns completion records in finish
    /// order.
    pub fn run<R: Rng>(&mut self, rng: &mut R) -> Vec<SimulationResult> {
        while let Some(timed_event) = self.event_queue.pop() {
            self.clock.advance_to(timed_event.time);
            self.process_event(rng, timed_event.event);
            self.events_processed += 1;
        }
        std::mem::take(&mut self.results)
    }

    fn process_event<R: Rng>(&mut self, rng: &mut R, event: SimEvent) {
        match event {
            SimEvent::Arrival(request) => self.handle_arrival(rng, request),
            SimEvent::StartService { node } => self.handle_start(rng, &node),
            SimEvent::EndService {
                request,
                start_time,
            } => self.handle_end(rng, request, start_time),
        }
    }

    fn handle_arrival<R: Rng>(&mut self, rng: &mut R, request: Request) {
        let now = self.clock.now();
        let node = request.node.clone();
        self.queues.entry(node.clone()).or_default().push_back(request);

        let busy = self.busy_until.get(&node).copied().unwrap_or(0.0);
        if busy <= now {
            // Claim the server before the start event runs so a second
            // arrival at the same timestamp queues behind this one.
            let service = self.service_dist.sample(rng);
            self.busy_until.insert(node.clone(), now + service);
            self.schedule_event(now, SimEvent::StartService { node });
        }
    }

    fn handle_start<R: Rng>(&mut self, rng: &mut R, node: &str) {
        let now = self.clock.now();
        let Some(request) = self.queues.get_mut(node).and_then(|q| q.pop_front()) else {
            return;
        };
        let service = self.service_dist.sample(rng);
        self.busy_until.insert(node.to_string(), now + service);
        self.schedule_event(
            now + service,
            SimEvent::EndService {
                request,
                start_time: now,
            },
        );
    }

    fn handle_end<R: Rng>(&mut self, rng: &mut R, request: Request, start_time: f64) {
        let finish = self.clock.now();
        self.results.push(SimulationResult {
            delay: finish - request.arrival_time,
            source: request.source,
            target_service: request.target_service,
            node: request.node.clone(),
            arrival_time: request.arrival_time,
            start_time,
            finish_time: finish,
            path: request.path,
        });

        let has_waiting = self
            .queues
            .get(&request.node)
            .is_some_and(|q| !q.is_empty());
        if has_waiting {
            let service = self.service_dist.sample(rng);
            self.busy_until.insert(request.node.clone(), finish + service);
            self.schedule_event(finish, SimEvent::StartService { node: request.node });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn single_node_setup(rate: f64) -> (Vec<WorkloadSource>, PlacementMap) {
        let sources = vec![WorkloadSource {
            source: "gw".to_string(),
            target_service: "svc".to_string(),
            rate,
        }];
        let mut placement = PlacementMap::new();
        placement.insert("svc".to_string(), vec!["n0".to_string()]);
        (sources, placement)
    }

    #[test]
    fn test_missing_placement_detected_at_load() {
        let (sources, _) = single_node_setup(1.0);
        let mut sim = EventSimulator::new(100.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = sim.load_workload(&mut rng, &sources, &PlacementMap::new(), None);
        assert!(matches!(result, Err(SimError::MissingPlacement { .. })));
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(matches!(
            EventSimulator::new(100.0, 0.0),
            Err(SimError::InvalidServiceRate(_))
        ));
        assert!(matches!(
            EventSimulator::new(0.0, 5.0),
            Err(SimError::InvalidHorizon(_))
        ));
        let (sources, placement) = single_node_setup(0.0);
        let mut sim = EventSimulator::new(100.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            sim.load_workload(&mut rng, &sources, &placement, None),
            Err(SimError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_every_arrival_completes_exactly_once() {
        let (sources, placement) = single_node_setup(2.0);
        let mut sim = EventSimulator::new(200.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        sim.load_workload(&mut rng, &sources, &placement, None)
            .unwrap();
        let arrivals = sim.event_queue.len();
        let results = sim.run(&mut rng);
        assert_eq!(results.len(), arrivals);
    }

    #[test]
    fn test_service_periods_never_overlap_per_node() {
        let (sources, placement) = single_node_setup(4.0);
        let mut sim = EventSimulator::new(500.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        sim.load_workload(&mut rng, &sources, &placement, None)
            .unwrap();
        let mut results = sim.run(&mut rng);
        results.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        for pair in results.windows(2) {
            assert!(
                pair[1].start_time >= pair[0].finish_time - 1e-9,
                "overlapping service: {} starts before {} finishes",
                pair[1].start_time,
                pair[0].finish_time
            );
        }
    }

    #[test]
    fn test_fifo_order_within_node() {
        let (sources, placement) = single_node_setup(4.0);
        let mut sim = EventSimulator::new(300.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        sim.load_workload(&mut rng, &sources, &placement, None)
            .unwrap();
        let results = sim.run(&mut rng);
        // Single node, single source: completion order must follow
        // arrival order.
        for pair in results.windows(2) {
            assert!(pair[0].arrival_time <= pair[1].arrival_time);
        }
    }

    #[test]
    fn test_mm1_mean_delay_close_to_theory() {
        // lambda = 2, mu = 5: mean sojourn time is 1 / (mu - lambda) = 1/3.
        let (sources, placement) = single_node_setup(2.0);
        let mut sim = EventSimulator::new(1000.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        sim.load_workload(&mut rng, &sources, &placement, None)
            .unwrap();
        let results = sim.run(&mut rng);

        let n = results.len() as f64;
        assert!(
            (1600.0..2400.0).contains(&n),
            "expected about 2000 completions, got {n}"
        );
        let mean_delay = results.iter().map(|r| r.delay).sum::<f64>() / n;
        assert!(
            (mean_delay - 1.0 / 3.0).abs() < 0.08,
            "mean delay {mean_delay} too far from 1/3"
        );
    }

    #[test]
    fn test_deterministic_given_seed() {
        let (sources, placement) = single_node_setup(2.0);
        let run = |seed: u64| {
            let mut sim = EventSimulator::new(200.0, 5.0).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            sim.load_workload(&mut rng, &sources, &placement, None)
                .unwrap();
            sim.run(&mut rng)
                .iter()
                .map(|r| (r.arrival_time, r.finish_time))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_route_tail_selects_serving_node() {
        let (sources, mut placement) = single_node_setup(2.0);
        placement.insert(
            "svc".to_string(),
            vec!["n0".to_string(), "n1".to_string()],
        );
        let mut routes = RouteMap::new();
        routes.insert(
            ("gw".to_string(), "svc".to_string()),
            vec!["gw".to_string(), "n1".to_string()],
        );
        let mut sim = EventSimulator::new(100.0, 5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        sim.load_workload(&mut rng, &sources, &placement, Some(&routes))
            .unwrap();
        let results = sim.run(&mut rng);
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.node == "n1"));
        assert!(results
            .iter()
            .all(|r| r.path.as_deref() == Some(&["gw".to_string(), "n1".to_string()][..])));
    }
}
