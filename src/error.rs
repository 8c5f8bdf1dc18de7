//! Error taxonomy shared by every stage of a profile run.

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T, E = FloodError> = std::result::Result<T, E>;

/// Errors raised while configuring or running a load test.
///
/// Verification failures are not errors: a non-2xx/3xx response is a normal
/// outcome tallied by the reporter. Everything in here aborts at least the
/// current profile run; [`FloodError::is_fatal`] marks the ones that abort
/// the whole process.
#[derive(Debug, Error)]
pub enum FloodError {
    /// Generic configuration problem with a descriptive message
    #[error("configuration error: {0}")]
    Config(String),

    /// A required node could not be located in the configuration tree
    #[error("missing configuration node <{node}> ({context})")]
    MissingNode { node: String, context: String },

    /// A node or attribute held a value that could not be interpreted
    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },

    /// A profile named an implementation that is not registered for the stage
    #[error("no implementation '{name}' is registered for stage '{stage}'")]
    UnknownHandler { stage: &'static str, name: String },

    /// A stage implementation was handed state built by another implementation
    #[error("stage '{stage}' cannot run '{handler}' against {state} state")]
    HandlerMismatch {
        stage: &'static str,
        handler: &'static str,
        state: &'static str,
    },

    /// The stage still has its generic "not implemented" handler
    #[error("stage '{0}' is not implemented by this profile")]
    NotImplemented(&'static str),

    /// The URL generated for a request could not be used
    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for a response from {peer}")]
    ReadTimeout { peer: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("TLS failure: {0}")]
    Tls(#[from] rustls::Error),

    #[error("proxy failure: {0}")]
    Proxy(String),

    /// A response capture template did not match the response
    #[error("response did not match capture pattern '{pattern}'")]
    CaptureNoMatch { pattern: String },

    #[error("invalid capture pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A response capture script could not run or exited unsuccessfully
    #[error("response script '{script}' failed: {reason}")]
    Script { script: String, reason: String },

    #[error("latency collection failed: {0}")]
    Metrics(String),

    #[error("farmer '{name}' failed: {source}")]
    FarmerFailed {
        name: String,
        #[source]
        source: Box<FloodError>,
    },

    #[error("farmer thread '{0}' panicked")]
    FarmerPanicked(String),
}

impl FloodError {
    /// Whether this error must terminate the process instead of a single run.
    ///
    /// Only a malformed URL qualifies: it is a configuration mistake that
    /// would otherwise repeat on every iteration.
    pub fn is_fatal(&self) -> bool {
        match self {
            FloodError::MalformedUrl { .. } => true,
            FloodError::FarmerFailed { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    pub(crate) fn missing(node: impl Into<String>, context: impl Into<String>) -> Self {
        FloodError::MissingNode {
            node: node.into(),
            context: context.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        FloodError::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}
