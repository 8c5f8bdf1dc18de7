use super::Sample;
use crate::config::{schema, ConfigTree};
use crate::context::OutputSink;
use crate::defaults;
use crate::error::{FloodError, Result};
use crate::metrics::MetricsCollector;
use std::fmt;
use std::str::FromStr;

/// Output format of the latency summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    /// Text summary followed by one JSON line
    Json,
}

impl FromStr for ReportFormat {
    type Err = FloodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(FloodError::invalid(schema::PROFILE_REPORT_FORMAT, s)),
        }
    }
}

/// Per-phase latency histograms summarized at the end of the run.
pub struct LatencyReport {
    profile: String,
    format: ReportFormat,
    collector: MetricsCollector,
}

impl fmt::Debug for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyReport")
            .field("profile", &self.profile)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl LatencyReport {
    pub fn new(profile: impl Into<String>, format: ReportFormat) -> Result<Self> {
        Ok(Self {
            profile: profile.into(),
            format,
            collector: MetricsCollector::new(defaults::PERCENTILES.to_vec())?,
        })
    }

    /// Read `<report_format>` from the named profile.
    pub fn init(config: &ConfigTree, profile_name: &str) -> Result<Self> {
        let format = config
            .find_root()
            .find_child_matching(schema::PROFILE, schema::NAME, profile_name)
            .and_then(|profile| profile.child_text(schema::PROFILE_REPORT_FORMAT))
            .filter(|text| !text.is_empty())
            .map(str::parse::<ReportFormat>)
            .transpose()?
            .unwrap_or_default();
        Self::new(profile_name, format)
    }

    pub fn process_stats(&mut self, sample: &Sample<'_>) -> Result<()> {
        self.collector.record_request(
            sample.timer,
            sample.response.body_length(),
            sample.verification.is_valid(),
        );
        Ok(())
    }

    pub fn report_stats(&self, out: &OutputSink) -> Result<()> {
        let metrics = self.collector.get_metrics();
        let mut lines = metrics.to_lines();
        lines[0] = format!("Profile '{}' {}", self.profile, lines[0]);

        if self.format == ReportFormat::Json {
            let json = serde_json::to_string(&metrics)
                .map_err(|e| FloodError::Metrics(e.to_string()))?;
            lines.push(json);
        }
        out.block(lines)?;
        Ok(())
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }
}
