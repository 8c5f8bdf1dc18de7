use super::{Connection, ReadOutcome};
use crate::defaults;
use crate::error::{FloodError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Smallest timeout handed to the OS; a zero timeout means "block forever"
/// to `setsockopt` and is rejected by std.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Plaintext TCP connection with connect, read and write timeouts.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: String,
    timeout: Duration,
}

impl TcpConnection {
    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// A connect failing with `EADDRNOTAVAIL` (the local ephemeral port range
    /// is used up) is retried once after
    /// [`defaults::PORT_EXHAUSTION_BACKOFF`].
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        let timeout = timeout.max(MIN_TIMEOUT);

        let stream = match try_connect(host, port, timeout) {
            Err(e) if e.kind() == io::ErrorKind::AddrNotAvailable => {
                warn!(
                    "Local ports exhausted connecting to {}, retrying in {:?}",
                    peer,
                    defaults::PORT_EXHAUSTION_BACKOFF
                );
                thread::sleep(defaults::PORT_EXHAUSTION_BACKOFF);
                try_connect(host, port, timeout)
            }
            other => other,
        }
        .map_err(|source| FloodError::Connect {
            addr: peer.clone(),
            source,
        })?;

        debug!("TCP connection established to {}", peer);
        Ok(Self {
            stream,
            peer,
            timeout,
        })
    }

    pub(crate) fn into_parts(self) -> (TcpStream, String, Duration) {
        (self.stream, self.peer, self.timeout)
    }
}

fn try_connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in (host, port).to_socket_addrs()? {
        match connect_addr(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

fn connect_addr(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;
    socket.connect_timeout(&addr.into(), timeout)?;

    let stream: TcpStream = socket.into();
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// A reset or abort after the peer was done talking reads as end of stream.
pub(crate) fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::UnexpectedEof
    )
}

/// Peek one byte, waiting at most `wait`, and restore the read timeout to
/// `restore` afterwards.
///
/// A zero wait peeks in non-blocking mode so it never sleeps. End of stream
/// counts as readable.
pub(crate) fn peek_readable(stream: &TcpStream, wait: Duration, restore: Duration) -> Result<bool> {
    let mut probe = [0u8; 1];
    let result = if wait.is_zero() {
        stream.set_nonblocking(true)?;
        let result = stream.peek(&mut probe);
        stream.set_nonblocking(false)?;
        result
    } else {
        stream.set_read_timeout(Some(wait.max(MIN_TIMEOUT)))?;
        let result = stream.peek(&mut probe);
        stream.set_read_timeout(Some(restore))?;
        result
    };

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => Ok(false),
        Err(e) if is_peer_gone(&e) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

impl Connection for TcpConnection {
    fn read_some(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        loop {
            match self.stream.read(buf) {
                Ok(0) => return Ok(ReadOutcome::eof()),
                Ok(n) => return Ok(ReadOutcome::data(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Ok(ReadOutcome::timeout()),
                Err(e) if is_peer_gone(&e) => return Ok(ReadOutcome::eof()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool> {
        peek_readable(&self.stream, timeout, self.timeout)
    }

    fn close(&mut self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of {} reported: {}", self.peer, e);
        }
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
