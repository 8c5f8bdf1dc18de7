//! HTTP/1.1 data model: requests, responses, the incremental response
//! parser and per-iteration timers.

pub mod parser;
pub mod request;
pub mod response;
pub mod timer;

pub use parser::{CaptureMode, ParseState, Progress, ResponseParser};
pub use request::{ParsedUri, Request, Scheme};
pub use response::Response;
pub use timer::Timer;
