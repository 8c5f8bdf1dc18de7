//! `CONNECT` tunnelling through an HTTP proxy for `https` targets.

use super::{Connection, ReadStatus, TcpConnection};
use crate::defaults;
use crate::error::{FloodError, Result};
use crate::http::ParsedUri;
use tracing::debug;

/// Ask the proxy on `conn` to open a tunnel to `target`.
///
/// Succeeds on any 2xx reply; the connection then carries the raw tunnel.
pub fn tunnel(conn: &mut TcpConnection, target: &ParsedUri) -> Result<()> {
    let authority = target.authority();
    let request = format!(
        "CONNECT {0} HTTP/1.1\r\nHost: {0}\r\nUser-Agent: {1}\r\n\r\n",
        authority,
        defaults::user_agent()
    );
    conn.write_all(request.as_bytes())?;

    let head = read_head(conn)?;
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line.split_whitespace().nth(1).unwrap_or_default();

    if !status.starts_with('2') {
        return Err(FloodError::Proxy(format!(
            "{} refused CONNECT to {}: {}",
            conn.peer(),
            authority,
            status_line.trim()
        )));
    }

    debug!("Tunnel to {} open via {}", authority, conn.peer());
    Ok(())
}

fn read_head(conn: &mut TcpConnection) -> Result<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];

    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        if head.len() > defaults::MAX_HEADER_LENGTH {
            return Err(FloodError::Proxy(format!(
                "oversized CONNECT reply from {}",
                conn.peer()
            )));
        }
        let outcome = conn.read_some(&mut buf)?;
        match outcome.status {
            ReadStatus::Ok => head.extend_from_slice(&buf[..outcome.bytes]),
            ReadStatus::Timeout => {
                return Err(FloodError::ReadTimeout {
                    peer: conn.peer().to_string(),
                })
            }
            ReadStatus::Eof => {
                return Err(FloodError::Proxy(format!(
                    "{} closed the connection during CONNECT",
                    conn.peer()
                )))
            }
        }
    }

    Ok(String::from_utf8_lossy(&head).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn proxy_replying(reply: &'static [u8]) -> (u16, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 256];
            while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = conn.read(&mut buf).unwrap();
                seen.extend_from_slice(&buf[..n]);
            }
            conn.write_all(reply).unwrap();
            String::from_utf8(seen).unwrap()
        });
        (port, handle)
    }

    #[test]
    fn test_tunnel_established() {
        let (port, server) = proxy_replying(b"HTTP/1.1 200 Connection established\r\n\r\n");
        let mut conn = TcpConnection::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let target = ParsedUri::parse("https://secure.example:8443/").unwrap();

        tunnel(&mut conn, &target).unwrap();
        let seen = server.join().unwrap();
        assert!(seen.starts_with("CONNECT secure.example:8443 HTTP/1.1\r\n"));
        assert!(seen.contains("Host: secure.example:8443\r\n"));
    }

    #[test]
    fn test_tunnel_refused() {
        let (port, server) = proxy_replying(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n");
        let mut conn = TcpConnection::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let target = ParsedUri::parse("https://secure.example/").unwrap();

        let err = tunnel(&mut conn, &target).unwrap_err();
        assert!(matches!(err, FloodError::Proxy(ref msg) if msg.contains("407")));
        server.join().unwrap();
    }
}
