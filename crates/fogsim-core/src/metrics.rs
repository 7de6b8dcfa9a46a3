//! Aggregation of simulation results into scenario metrics.
//!
//! Condenses per-request completion records into delay statistics, hop
//! statistics over routed requests, offered throughput, and deadline
//! misses against each application's end-to-end deadline.

use crate::service::{Application, WorkloadSource};
use crate::sim::SimulationResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated metrics for one simulation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub total_requests: u64,
    pub avg_delay: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    pub std_delay: f64,
    /// Hop statistics over requests that carried a non-empty route.
    pub avg_hops: f64,
    pub min_hops: f64,
    pub max_hops: f64,
    /// Offered load: the sum of all source arrival rates.
    pub throughput: f64,
    pub deadline_misses: u64,
    pub deadline_miss_rate: f64,
}

/// Aggregate completion records into metrics. An empty result set yields
/// all-zero metrics.
pub fn evaluate(
    results: &[SimulationResult],
    sources: &[WorkloadSource],
    apps: &[Application],
) -> EvalMetrics {
    if results.is_empty() {
        return EvalMetrics::default();
    }

    let deadlines: HashMap<&str, f64> = apps
        .iter()
        .flat_map(|app| {
            app.services
                .iter()
                .map(move |s| (s.name.as_str(), app.deadline))
        })
        .collect();

    let delays: Vec<f64> = results.iter().map(|r| r.delay).collect();
    let n = delays.len() as f64;
    let avg_delay = delays.iter().sum::<f64>() / n;
    let variance = delays.iter().map(|d| (d - avg_delay).powi(2)).sum::<f64>() / n;

    let hops: Vec<f64> = results
        .iter()
        .filter_map(|r| r.path.as_ref())
        .filter(|p| !p.is_empty())
        .map(|p| (p.len() - 1) as f64)
        .collect();
    let (avg_hops, min_hops, max_hops) = if hops.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            hops.iter().sum::<f64>() / hops.len() as f64,
            hops.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
            hops.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        )
    };

    let deadline_misses = results
        .iter()
        .filter(|r| {
            deadlines
                .get(r.target_service.as_str())
                .is_some_and(|&d| r.delay > d)
        })
        .count() as u64;

    EvalMetrics {
        total_requests: results.len() as u64,
        avg_delay,
        min_delay: delays.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
        max_delay: delays.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        std_delay: variance.sqrt(),
        avg_hops,
        min_hops,
        max_hops,
        throughput: sources.iter().map(|s| s.rate).sum(),
        deadline_misses,
        deadline_miss_rate: deadline_misses as f64 / n,
    }
}

/// Render metrics as a human-readable table.
pub fn format_table(metrics: &EvalMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{:=<70}\n", "  Simulation Results  "));
    out.push_str(&format!(
        "  Requests: {} | Offered load: {:.2} req/unit\n",
        metrics.total_requests, metrics.throughput
    ));
    out.push_str(&format!("{:-<70}\n", "  Delay  "));
    out.push_str(&format!(
        "  avg={:>10.3}  min={:>10.3}  max={:>10.3}  std={:>10.3}\n",
        metrics.avg_delay, metrics.min_delay, metrics.max_delay, metrics.std_delay
    ));
    out.push_str(&format!("{:-<70}\n", "  Hops  "));
    out.push_str(&format!(
        "  avg={:>10.2}  min={:>10.0}  max={:>10.0}\n",
        metrics.avg_hops, metrics.min_hops, metrics.max_hops
    ));
    out.push_str(&format!("{:-<70}\n", "  Deadlines  "));
    out.push_str(&format!(
        "  missed: {} ({:.1}%)\n",
        metrics.deadline_misses,
        metrics.deadline_miss_rate * 100.0
    ));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Service;

    fn result(delay: f64, service: &str, path: Option<Vec<&str>>) -> SimulationResult {
        SimulationResult {
            source: "gw".to_string(),
            target_service: service.to_string(),
            node: "n0".to_string(),
            arrival_time: 0.0,
            start_time: 0.0,
            finish_time: delay,
            delay,
            path: path.map(|p| p.into_iter().map(String::from).collect()),
        }
    }

    fn app(deadline: f64) -> Application {
        Application {
            name: "app0".to_string(),
            services: vec![Service {
                name: "svc".to_string(),
                ram: 1.0,
                ipt: 1.0,
                packet_size: 1.0,
            }],
            deadline,
        }
    }

    #[test]
    fn test_empty_results_yield_zero_metrics() {
        let metrics = evaluate(&[], &[], &[]);
        assert_eq!(metrics, EvalMetrics::default());
    }

    #[test]
    fn test_delay_statistics() {
        let results = vec![
            result(1.0, "svc", None),
            result(2.0, "svc", None),
            result(3.0, "svc", None),
        ];
        let metrics = evaluate(&results, &[], &[app(10.0)]);
        assert_eq!(metrics.total_requests, 3);
        assert!((metrics.avg_delay - 2.0).abs() < 1e-12);
        assert_eq!(metrics.min_delay, 1.0);
        assert_eq!(metrics.max_delay, 3.0);
        assert!((metrics.std_delay - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_hops_ignore_unrouted_requests() {
        let results = vec![
            result(1.0, "svc", Some(vec!["gw", "mid", "n0"])),
            result(1.0, "svc", Some(vec![])),
            result(1.0, "svc", None),
        ];
        let metrics = evaluate(&results, &[], &[app(10.0)]);
        assert_eq!(metrics.avg_hops, 2.0);
        assert_eq!(metrics.min_hops, 2.0);
        assert_eq!(metrics.max_hops, 2.0);
    }

    #[test]
    fn test_deadline_misses() {
        let results = vec![
            result(5.0, "svc", None),
            result(15.0, "svc", None),
            result(25.0, "svc", None),
        ];
        let metrics = evaluate(&results, &[], &[app(10.0)]);
        assert_eq!(metrics.deadline_misses, 2);
        assert!((metrics.deadline_miss_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_throughput_sums_source_rates() {
        let sources = vec![
            WorkloadSource {
                source: "gw".to_string(),
                target_service: "svc".to_string(),
                rate: 2.0,
            },
            WorkloadSource {
                source: "gw2".to_string(),
                target_service: "svc".to_string(),
                rate: 3.0,
            },
        ];
        let metrics = evaluate(&[result(1.0, "svc", None)], &sources, &[app(10.0)]);
        assert_eq!(metrics.throughput, 5.0);
    }

    #[test]
    fn test_format_table_no_panic() {
        let metrics = evaluate(&[result(1.0, "svc", None)], &[], &[app(10.0)]);
        let table = format_table(&metrics);
        assert!(table.contains("Requests: 1"));
    }
}
