//! # Connection Abstraction
//!
//! Plaintext TCP and TLS streams share the blocking [`Connection`] contract.
//! The variant is chosen per request from the target scheme, and requests
//! routed through a proxy connect to the proxy instead (tunnelling with
//! `CONNECT` when the target is `https`).
//!
//! Every read, write and connect honours the runtime context's socket
//! timeout. A read that times out reports [`ReadStatus::Timeout`], which is
//! distinct from the peer closing the stream ([`ReadStatus::Eof`]).

use crate::context::RuntimeContext;
use crate::error::Result;
use crate::http::{Request, Scheme};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub mod proxy;
pub mod tcp;
pub mod tls;

pub use tcp::TcpConnection;
pub use tls::TlsConnection;

/// Outcome classification of a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Data was read
    Ok,
    /// Nothing arrived within the timeout
    Timeout,
    /// The peer closed the stream
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes: usize,
    pub status: ReadStatus,
}

impl ReadOutcome {
    pub fn data(bytes: usize) -> Self {
        Self {
            bytes,
            status: ReadStatus::Ok,
        }
    }

    pub fn timeout() -> Self {
        Self {
            bytes: 0,
            status: ReadStatus::Timeout,
        }
    }

    pub fn eof() -> Self {
        Self {
            bytes: 0,
            status: ReadStatus::Eof,
        }
    }
}

/// A blocking byte stream to a target server.
pub trait Connection: Send + fmt::Debug {
    /// Read whatever is available into `buf`, waiting up to the socket timeout.
    fn read_some(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Send the serialized request.
    fn write_request(&mut self, request: &Request) -> Result<()> {
        self.write_all(request.wire())
    }

    /// Whether a read would return without blocking (data or end of stream)
    /// within `timeout`.
    fn poll_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Shut the connection down. Further use is an error.
    fn close(&mut self);

    /// `host:port` of the remote end, for diagnostics.
    fn peer(&self) -> &str;
}

/// Identity of the remote end a request needs, used to decide whether a
/// kept-alive connection can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    proxy: Option<(String, u16)>,
}

impl Endpoint {
    pub fn of(request: &Request) -> Self {
        let target = request.target();
        Self {
            scheme: target.scheme(),
            host: target.host().to_ascii_lowercase(),
            port: target.port(),
            proxy: request
                .proxy()
                .map(|p| (p.host().to_ascii_lowercase(), p.port())),
        }
    }
}

/// Open a connection suitable for `request`.
pub fn open(ctx: &RuntimeContext, request: &Request) -> Result<Box<dyn Connection>> {
    let target = request.target();
    let timeout = ctx.socket_timeout();

    let connection: Box<dyn Connection> = match (request.proxy(), target.scheme()) {
        (None, Scheme::Http) => Box::new(TcpConnection::connect(target.host(), target.port(), timeout)?),
        (None, Scheme::Https) => {
            let tcp = TcpConnection::connect(target.host(), target.port(), timeout)?;
            Box::new(TlsConnection::establish(ctx.tls(), tcp, target.host())?)
        }
        (Some(proxy), Scheme::Http) => {
            Box::new(TcpConnection::connect(proxy.host(), proxy.port(), timeout)?)
        }
        (Some(proxy), Scheme::Https) => {
            let mut tcp = TcpConnection::connect(proxy.host(), proxy.port(), timeout)?;
            proxy::tunnel(&mut tcp, target)?;
            Box::new(TlsConnection::establish(ctx.tls(), tcp, target.host())?)
        }
    };

    debug!("Opened {} connection to {}", target.scheme(), connection.peer());
    Ok(connection)
}
