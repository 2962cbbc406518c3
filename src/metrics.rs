//! Poll cycle metrics collection and reporting
//!
//! Tracks latency and success rate for refresh cycles against the upstream
//! metering API.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics over recent poll cycles
#[derive(Debug, Clone)]
pub struct ApiMetrics {
    /// Name of the upstream API backend
    pub api_name: String,
    /// 50th percentile cycle latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile cycle latency in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of cycles tracked
    pub total_cycles: u64,
    /// Number of failed cycles
    pub failed_cycles: u64,
}

impl ApiMetrics {
    /// Creates metrics with no data
    pub fn empty(api_name: &str) -> Self {
        Self {
            api_name: api_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_cycles: 0,
            failed_cycles: 0,
        }
    }
}

/// Internal sample for latency tracking
#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

/// Collects and computes cycle metrics
pub struct MetricsCollector {
    api_name: String,
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    /// Lifetime counters
    total_cycles: RwLock<u64>,
    failed_cycles: RwLock<u64>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for an API backend
    pub fn new(api_name: &str) -> Self {
        Self {
            api_name: api_name.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            total_cycles: RwLock::new(0),
            failed_cycles: RwLock::new(0),
        }
    }

    /// Records a cycle with its duration and outcome
    pub async fn record_cycle(&self, duration: Duration, success: bool) {
        let duration_ms = duration.as_secs_f64() * 1000.0;

        {
            let mut total = self.total_cycles.write().await;
            *total += 1;
        }

        if !success {
            let mut failed = self.failed_cycles.write().await;
            *failed += 1;
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms,
            success,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn metrics(&self) -> ApiMetrics {
        let samples = self.samples.read().await;
        let total = *self.total_cycles.read().await;
        let failed = *self.failed_cycles.read().await;

        if samples.is_empty() {
            return ApiMetrics::empty(&self.api_name);
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if total > 0 {
            (total - failed) as f64 / total as f64
        } else {
            1.0
        };

        ApiMetrics {
            api_name: self.api_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_cycles: total,
            failed_cycles: failed,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new("glowmarkt");

        collector.record_cycle(Duration::from_millis(100), true).await;
        collector.record_cycle(Duration::from_millis(200), true).await;
        collector.record_cycle(Duration::from_millis(150), false).await;

        let metrics = collector.metrics().await;

        assert_eq!(metrics.api_name, "glowmarkt");
        assert_eq!(metrics.total_cycles, 3);
        assert_eq!(metrics.failed_cycles, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 10.0);
    }
}
