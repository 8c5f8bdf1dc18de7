//! # Flood HTTP Load Generator Library
//!
//! Flood replays parameterized HTTP/HTTPS request sequences ("profiles")
//! against target servers from many threads at once, verifying each
//! response and reporting latency and correctness.
//!
//! ## Architecture Overview
//!
//! A run is described by an XML configuration and executed top-down:
//!
//! - `farm`: starts one OS thread per referenced farmer and joins them all
//! - `farmer`: runs its profiles sequentially, a fixed number of times or
//!   until a wall-clock deadline
//! - `pipeline`: resolves the stage handlers of a profile from a static
//!   registry and drives one request/response cycle per iteration
//! - `profile`: the round-robin URL profile, with sequence expansion,
//!   cookies, delays and response capture
//! - `socket` and `net`: connection strategies (open per request or
//!   keep-alive) over plaintext TCP or TLS
//! - `http`: request serialization and an incremental response parser that
//!   understands chunked, Content-Length and read-until-close framing
//! - `verify` and `report`: response verification and result reporting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use flood::{farm, ConfigTree, OutputSink, RuntimeContext};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ConfigTree::from_path("load.xml".as_ref())?;
//!     let ctx = RuntimeContext::new(OutputSink::stdout())?.with_seed(config.seed()?);
//!
//!     let summary = farm::run_farm(&ctx, &config, "Bingo")?;
//!     println!("{} requests issued", summary.total().cycles);
//!     Ok(())
//! }
//! ```

/// Command-line interface of the `flood` binary
pub mod cli;

/// Configuration tree reader built on `roxmltree`
pub mod config;

/// Runtime context shared by all farmer threads (TLS engine, output sink)
pub mod context;

pub mod error;

/// Farm scheduler: one thread per farmer, fan-out then fan-in
pub mod farm;

/// Farmer: sequential, count- or time-bounded repetition of profiles
pub mod farmer;

/// HTTP request and response model, timers and the response parser
pub mod http;

pub mod logging;

/// HDR histogram latency collection used by the latency report
pub mod metrics;

/// Plaintext and TLS connections behind one blocking contract
pub mod net;

/// Parameter store and `${name}` template expansion
pub mod params;

/// Event pipeline: stage registry, handler resolution and the profile runner
pub mod pipeline;

/// Profile implementations
pub mod profile;

/// Result reporters
pub mod report;

/// Connection strategies
pub mod socket;

pub mod utils;

/// Response verification
pub mod verify;

pub use config::{ConfigNode, ConfigTree};
pub use context::{OutputSink, RuntimeContext};
pub use error::{FloodError, Result};
pub use farm::{run_farm, FarmSummary};
pub use farmer::run_farmer;
pub use pipeline::{run_profile, RunSummary};
pub use verify::Verification;

/// The current version of flood
///
/// Sent in the `User-Agent` header of every request.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default values and engine limits.
pub mod defaults {
    use std::time::Duration;

    /// Size of the response buffer kept when only the first chunk is wanted,
    /// and of each socket read.
    pub const MAX_DOC_LENGTH: usize = 8192;

    /// Upper bound on a response header block before the framing is
    /// considered broken.
    pub const MAX_HEADER_LENGTH: usize = 64 * 1024;

    /// Upper bound on a single chunk-size or trailer line.
    pub const MAX_LINE_LENGTH: usize = 4096;

    /// Timeout applied to connect, read and write on every connection.
    pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

    /// Pause before the single retry of a connect that failed because the
    /// local ephemeral port range was exhausted.
    pub const PORT_EXHAUSTION_BACKOFF: Duration = Duration::from_secs(1);

    /// Number of consecutive would-block results tolerated during a TLS
    /// handshake before giving up.
    pub const TLS_HANDSHAKE_RETRIES: usize = 64;

    /// Farm run by the binary when none is named on the command line.
    pub const FARM_NAME: &str = "Bingo";

    /// Content type of request payloads when the URL does not name one.
    pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

    /// Percentiles printed by the latency report.
    pub const PERCENTILES: [f64; 4] = [50.0, 95.0, 99.0, 99.9];

    /// `User-Agent` header value.
    pub fn user_agent() -> String {
        format!("Flood/{}", super::VERSION)
    }
}
