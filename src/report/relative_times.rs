use super::Sample;
use crate::context::OutputSink;
use crate::error::Result;
use std::thread;

/// One line per request with phase offsets in microseconds:
///
/// `begin connect write read close OK|FAIL thread uri`
#[derive(Debug, Default, Clone)]
pub struct RelativeTimesReport;

impl RelativeTimesReport {
    pub fn new() -> Self {
        Self
    }

    pub fn process_stats(&mut self, out: &OutputSink, sample: &Sample<'_>) -> Result<()> {
        let timer = sample.timer;
        let current = thread::current();
        let thread_name = current.name().unwrap_or("main");

        out.line(format_args!(
            "{} {} {} {} {} {} {} {}",
            timer.begin_us(),
            timer.connect().as_micros(),
            timer.write().as_micros(),
            timer.read().as_micros(),
            timer.close().as_micros(),
            sample.verification,
            thread_name,
            sample.request.uri()
        ))?;
        Ok(())
    }
}
