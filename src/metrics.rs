use crate::error::{FloodError, Result};
use crate::http::Timer;
use crate::utils::format_duration_ns;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Request phases timed by every iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Connect,
    Write,
    Read,
    Close,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Connect, Phase::Write, Phase::Read, Phase::Close];

    /// Offset of the end of this phase from the start of the iteration
    pub fn elapsed(self, timer: &Timer) -> Duration {
        match self {
            Phase::Connect => timer.connect(),
            Phase::Write => timer.write(),
            Phase::Read => timer.read(),
            Phase::Close => timer.close(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connect => "connect",
            Phase::Write => "write",
            Phase::Read => "read",
            Phase::Close => "close",
        };
        f.pad(name)
    }
}

/// Latency summary of one phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub phase: Phase,
    pub min_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
    pub std_dev_ns: f64,
    pub percentiles: Vec<PercentileValue>,
    pub total_samples: u64,
}

/// Percentile value pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_ns: u64,
}

/// Request rate and body volume over the collection window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    pub requests_per_second: f64,
    pub bytes_per_second: f64,
    pub total_requests: u64,
    pub total_bytes: u64,
    pub duration_ns: u64,
}

/// Everything the latency report prints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub ok: u64,
    pub failed: u64,
    pub phases: Vec<LatencyMetrics>,
    pub throughput: ThroughputMetrics,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Latency collector using HDR histogram for accurate measurement
pub struct LatencyCollector {
    histogram: Histogram<u64>,
    phase: Phase,
}

impl LatencyCollector {
    pub fn new(phase: Phase) -> Result<Self> {
        // 3 significant figures, auto-resizing
        let histogram = Histogram::<u64>::new(3)
            .map_err(|e| FloodError::Metrics(e.to_string()))?;
        Ok(Self { histogram, phase })
    }

    pub fn record(&mut self, latency: Duration) {
        let latency_ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(latency_ns);
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    pub fn get_metrics(&self, percentiles: &[f64]) -> LatencyMetrics {
        let percentiles = percentiles
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value_ns: self.histogram.value_at_percentile(p),
            })
            .collect();

        LatencyMetrics {
            phase: self.phase,
            min_ns: self.histogram.min(),
            max_ns: self.histogram.max(),
            mean_ns: self.histogram.mean(),
            std_dev_ns: self.histogram.stdev(),
            percentiles,
            total_samples: self.histogram.len(),
        }
    }
}

/// Throughput calculator for request and body-byte rates
pub struct ThroughputCalculator {
    start_time: Instant,
    request_count: u64,
    byte_count: u64,
}

impl Default for ThroughputCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputCalculator {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            request_count: 0,
            byte_count: 0,
        }
    }

    pub fn record_request(&mut self, body_bytes: u64) {
        self.request_count += 1;
        self.byte_count += body_bytes;
    }

    pub fn get_metrics(&self) -> ThroughputMetrics {
        let elapsed = self.start_time.elapsed();
        let duration_secs = elapsed.as_secs_f64();
        let rate = |count: u64| {
            if duration_secs > 0.0 {
                count as f64 / duration_secs
            } else {
                0.0
            }
        };

        ThroughputMetrics {
            requests_per_second: rate(self.request_count),
            bytes_per_second: rate(self.byte_count),
            total_requests: self.request_count,
            total_bytes: self.byte_count,
            duration_ns: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}

/// One histogram per phase plus outcome counters
pub struct MetricsCollector {
    phases: Vec<LatencyCollector>,
    throughput: ThroughputCalculator,
    percentiles: Vec<f64>,
    ok: u64,
    failed: u64,
}

impl MetricsCollector {
    pub fn new(percentiles: Vec<f64>) -> Result<Self> {
        let phases = Phase::ALL
            .iter()
            .map(|&phase| LatencyCollector::new(phase))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            phases,
            throughput: ThroughputCalculator::new(),
            percentiles,
            ok: 0,
            failed: 0,
        })
    }

    /// Record one finished iteration
    pub fn record_request(&mut self, timer: &Timer, body_bytes: u64, valid: bool) {
        for collector in &mut self.phases {
            collector.record(collector.phase.elapsed(timer));
        }
        self.throughput.record_request(body_bytes);
        if valid {
            self.ok += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn get_metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            ok: self.ok,
            failed: self.failed,
            phases: self
                .phases
                .iter()
                .map(|collector| collector.get_metrics(&self.percentiles))
                .collect(),
            throughput: self.throughput.get_metrics(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl PerformanceMetrics {
    /// Human-readable summary, one line per phase
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Latency Report ({} OK, {} FAILED, {:.2} req/s, {})",
            self.ok,
            self.failed,
            self.throughput.requests_per_second,
            format_throughput(self.throughput.bytes_per_second)
        )];

        for phase in &self.phases {
            if phase.total_samples == 0 {
                lines.push(format!(" {:<8} no samples", phase.phase));
                continue;
            }
            let percentiles: Vec<String> = phase
                .percentiles
                .iter()
                .map(|p| format!("p{}={}", p.percentile, format_duration_ns(p.value_ns)))
                .collect();
            lines.push(format!(
                " {:<8} min={} mean={} {} max={}",
                phase.phase,
                format_duration_ns(phase.min_ns),
                format_duration_ns(phase.mean_ns as u64),
                percentiles.join(" "),
                format_duration_ns(phase.max_ns)
            ));
        }
        lines
    }
}

/// Format throughput value for human-readable output
pub fn format_throughput(bytes_per_second: f64) -> String {
    if bytes_per_second < 1024.0 {
        format!("{:.2} B/s", bytes_per_second)
    } else if bytes_per_second < 1024.0 * 1024.0 {
        format!("{:.2} KB/s", bytes_per_second / 1024.0)
    } else if bytes_per_second < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB/s", bytes_per_second / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB/s", bytes_per_second / (1024.0 * 1024.0 * 1024.0))
    }
}
