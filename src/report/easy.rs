use super::Sample;
use crate::context::OutputSink;
use crate::error::Result;
use crate::utils::current_timestamp_us;

/// One `<timestamp µs> OK|FAIL` line per request.
#[derive(Debug, Default, Clone)]
pub struct EasyReport;

impl EasyReport {
    pub fn new() -> Self {
        Self
    }

    pub fn process_stats(&mut self, out: &OutputSink, sample: &Sample<'_>) -> Result<()> {
        out.line(format_args!("{} {}", current_timestamp_us(), sample.verification))?;
        Ok(())
    }
}
