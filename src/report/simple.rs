use super::Sample;
use crate::context::OutputSink;
use crate::error::Result;

/// Prints `OK`/`FAIL` per request and a tally at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimpleReport {
    successes: u64,
    failures: u64,
}

impl SimpleReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_stats(&mut self, out: &OutputSink, sample: &Sample<'_>) -> Result<()> {
        if sample.verification.is_valid() {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        out.line(sample.verification)?;
        Ok(())
    }

    pub fn report_stats(&self, out: &OutputSink) -> Result<()> {
        out.block([
            "Report Follows ------------".to_string(),
            format!(" #OK      - {}", self.successes),
            format!(" #FAILED  - {}", self.failures),
            format!(" Total ---- {}", self.hit_count()),
        ])?;
        Ok(())
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn hit_count(&self) -> u64 {
        self.successes + self.failures
    }
}
