use crate::utils::current_timestamp_us;
use std::time::{Duration, Instant};

/// Per-iteration timestamps.
///
/// `begin` is taken before the connection is set up; the remaining marks are
/// recorded as the pipeline passes connect, write, first read and close.
/// Unrecorded marks read as zero offsets.
#[derive(Debug, Clone)]
pub struct Timer {
    begin: Instant,
    begin_wall_us: i64,
    connect: Option<Instant>,
    write: Option<Instant>,
    read: Option<Instant>,
    close: Option<Instant>,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            begin: Instant::now(),
            begin_wall_us: current_timestamp_us(),
            connect: None,
            write: None,
            read: None,
            close: None,
        }
    }

    pub fn mark_connect(&mut self) {
        self.connect = Some(Instant::now());
    }

    pub fn mark_write(&mut self) {
        self.write = Some(Instant::now());
    }

    pub fn mark_read(&mut self) {
        self.read = Some(Instant::now());
    }

    pub fn mark_close(&mut self) {
        self.close = Some(Instant::now());
    }

    /// Wall-clock start of the iteration in microseconds since the epoch.
    pub fn begin_us(&self) -> i64 {
        self.begin_wall_us
    }

    pub fn connect(&self) -> Duration {
        self.offset(self.connect)
    }

    pub fn write(&self) -> Duration {
        self.offset(self.write)
    }

    pub fn read(&self) -> Duration {
        self.offset(self.read)
    }

    pub fn close(&self) -> Duration {
        self.offset(self.close)
    }

    fn offset(&self, mark: Option<Instant>) -> Duration {
        mark.map(|m| m.saturating_duration_since(self.begin))
            .unwrap_or_default()
    }
}
