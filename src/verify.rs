//! Response verification.
//!
//! A failed verification is an expected outcome that the reporter tallies,
//! never an error.

use crate::http::Response;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verification {
    Valid,
    Invalid,
}

impl Verification {
    pub fn is_valid(self) -> bool {
        self == Verification::Valid
    }

    /// `OK` or `FAIL`, as printed by the reporters.
    pub fn label(self) -> &'static str {
        match self {
            Verification::Valid => "OK",
            Verification::Invalid => "FAIL",
        }
    }
}

impl From<bool> for Verification {
    fn from(valid: bool) -> Self {
        if valid {
            Verification::Valid
        } else {
            Verification::Invalid
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 2xx or 3xx judged from the raw status line bytes.
pub fn verify_200(response: &Response) -> Verification {
    let raw = response.bytes();
    let success = raw.starts_with(b"HTTP/1.1 2") || raw.starts_with(b"HTTP/1.0 2");
    let redirect = raw.get(9) == Some(&b'3');
    Verification::from(success || redirect)
}

/// 2xx or 3xx judged from the second token of the status line.
pub fn verify_status_code(response: &Response) -> Verification {
    let text = response.text();
    let status_line = text.lines().next().unwrap_or_default();
    let code = status_line.split_whitespace().nth(1).unwrap_or_default();
    Verification::from(code.starts_with('2') || code.starts_with('3'))
}
