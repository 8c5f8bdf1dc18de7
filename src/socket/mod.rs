//! # Socket Strategies
//!
//! A strategy owns the connection lifecycle of a profile run: when to open,
//! when to reuse and when to close. Two strategies exist:
//!
//! - [`GenericSocket`]: a fresh connection per request, closed after the
//!   response (`Connection: Close`)
//! - [`KeepAliveSocket`]: one connection reused across requests as long as
//!   the server keeps it alive and the endpoint does not change
//!
//! Both read responses through the same incremental parser, so a kept-alive
//! stream is consumed exactly up to the end of each response and any excess
//! bytes are carried over to the next read.

use crate::defaults;
use crate::error::{FloodError, Result};
use crate::http::{CaptureMode, Request, Response, ResponseParser};
use crate::net::{Connection, ReadStatus};
use std::io;
use tracing::{debug, warn};

mod generic;
mod keepalive;

pub use generic::GenericSocket;
pub use keepalive::KeepAliveSocket;

/// Per-run connection state, tagged by strategy.
#[derive(Debug)]
pub enum SocketState {
    Generic(GenericSocket),
    KeepAlive(KeepAliveSocket),
}

impl SocketState {
    /// Strategy name, as used in handler mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SocketState::Generic(_) => "generic socket",
            SocketState::KeepAlive(_) => "keepalive socket",
        }
    }
}

/// Read one response from `conn`.
///
/// `carry` holds bytes read past the end of the previous response and
/// receives any bytes read past the end of this one. Returns `None` when the
/// peer closed the stream before sending a single byte.
pub(crate) fn receive_response(
    conn: &mut dyn Connection,
    carry: &mut Vec<u8>,
    request: &Request,
) -> Result<Option<Response>> {
    let capture = if request.want_full_response() {
        CaptureMode::Full
    } else {
        CaptureMode::FirstChunk
    };
    let mut parser = ResponseParser::new(request.method(), capture);

    if !carry.is_empty() {
        let pending = std::mem::take(carry);
        let progress = parser.feed(&pending);
        carry.extend_from_slice(&pending[progress.consumed..]);
    }

    let mut buf = vec![0u8; defaults::MAX_DOC_LENGTH];
    while !parser.is_done() {
        let outcome = conn.read_some(&mut buf)?;
        match outcome.status {
            ReadStatus::Ok => {
                let data = &buf[..outcome.bytes];
                let progress = parser.feed(data);
                carry.extend_from_slice(&data[progress.consumed..]);
            }
            ReadStatus::Timeout => {
                if !parser.has_started() {
                    return Err(FloodError::ReadTimeout {
                        peer: conn.peer().to_string(),
                    });
                }
                warn!(
                    "Timed out mid-response from {} ({:?})",
                    conn.peer(),
                    parser.state()
                );
                parser.finish();
                break;
            }
            ReadStatus::Eof => {
                if !parser.has_started() {
                    return Ok(None);
                }
                parser.finish();
                break;
            }
        }
    }

    let response = parser.into_response();
    debug!(
        "Received {:?} from {} ({} body bytes, keepalive={})",
        response.status(),
        conn.peer(),
        response.body_length(),
        response.keepalive()
    );
    Ok(Some(response))
}

pub(crate) fn closed_early(peer: &str) -> FloodError {
    FloodError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("{} closed the connection without responding", peer),
    ))
}

pub(crate) fn not_connected() -> FloodError {
    FloodError::Io(io::Error::new(
        io::ErrorKind::NotConnected,
        "no connection is open for this request",
    ))
}
