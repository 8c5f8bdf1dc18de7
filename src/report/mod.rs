//! # Reporters
//!
//! A reporter sees every finished iteration and prints a summary when the
//! profile run ends. All output goes through the runtime context's
//! [`OutputSink`](crate::context::OutputSink), one line or block at a time,
//! so reports from concurrent farmers never interleave mid-line.

use crate::http::{Request, Response, Timer};
use crate::verify::Verification;

mod easy;
mod latency;
mod relative_times;
mod simple;

pub use easy::EasyReport;
pub use latency::{LatencyReport, ReportFormat};
pub use relative_times::RelativeTimesReport;
pub use simple::SimpleReport;

/// What a reporter is told about one iteration.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub request: &'a Request,
    pub response: &'a Response,
    pub verification: Verification,
    pub timer: &'a Timer,
}

/// Per-run reporter state, tagged by report type.
#[derive(Debug)]
pub enum ReportState {
    /// No reporter; the generic report stages do nothing.
    Empty,
    Simple(SimpleReport),
    Easy(EasyReport),
    RelativeTimes(RelativeTimesReport),
    Latency(Box<LatencyReport>),
}

impl ReportState {
    /// Report type name, as used in handler mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportState::Empty => "empty report",
            ReportState::Simple(_) => "simple report",
            ReportState::Easy(_) => "easy report",
            ReportState::RelativeTimes(_) => "relative_times report",
            ReportState::Latency(_) => "latency report",
        }
    }
}
