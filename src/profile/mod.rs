//! Profile implementations and their per-run state.

pub mod cookies;
pub mod delay;
pub mod round_robin;
pub mod script;
pub mod sequence;
pub mod url;

pub use cookies::{Cookie, CookieJar};
pub use delay::{jittered_delay, Delay};
pub use round_robin::RoundRobinProfile;
pub use url::{Payload, UrlEntry};

/// Per-run profile state, tagged by profile type.
#[derive(Debug)]
pub enum ProfileState {
    RoundRobin(Box<RoundRobinProfile>),
}

impl ProfileState {
    /// Profile type name, as used in handler mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProfileState::RoundRobin(_) => "round_robin profile",
        }
    }
}
