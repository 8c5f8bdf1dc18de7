use super::tcp::{is_peer_gone, is_timeout, peek_readable, TcpConnection};
use super::{Connection, ReadOutcome};
use crate::context::TlsEngine;
use crate::defaults;
use crate::error::{FloodError, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;
use tracing::debug;

/// TLS client session over a [`TcpConnection`].
///
/// Server certificates are not verified.
#[derive(Debug)]
pub struct TlsConnection {
    stream: StreamOwned<ClientConnection, TcpStream>,
    peer: String,
    timeout: Duration,
}

impl TlsConnection {
    /// Run the client handshake for `server_name` over `tcp`.
    pub fn establish(engine: &TlsEngine, tcp: TcpConnection, server_name: &str) -> Result<Self> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| FloodError::invalid("TLS server name", server_name))?;
        let session = ClientConnection::new(engine.client_config(), name)?;

        let (sock, peer, timeout) = tcp.into_parts();
        let mut stream = StreamOwned::new(session, sock);
        handshake(&mut stream, &peer)?;

        debug!(
            "TLS session established with {} ({:?})",
            peer,
            stream.conn.protocol_version()
        );
        Ok(Self {
            stream,
            peer,
            timeout,
        })
    }
}

fn handshake(stream: &mut StreamOwned<ClientConnection, TcpStream>, peer: &str) -> Result<()> {
    let mut stalls = 0;

    while stream.conn.is_handshaking() {
        match stream.conn.complete_io(&mut stream.sock) {
            Ok(_) => stalls = 0,
            Err(e)
                if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted =>
            {
                stalls += 1;
                if stalls >= defaults::TLS_HANDSHAKE_RETRIES {
                    return Err(FloodError::ReadTimeout {
                        peer: peer.to_string(),
                    });
                }
                debug!("TLS handshake with {} stalled ({} of {})", peer, stalls, defaults::TLS_HANDSHAKE_RETRIES);
            }
            Err(e) => return Err(tls_failure(e)),
        }
    }
    Ok(())
}

/// Surface a wrapped `rustls::Error` as such, anything else as I/O.
fn tls_failure(e: io::Error) -> FloodError {
    let is_tls = e
        .get_ref()
        .map(|inner| inner.is::<rustls::Error>())
        .unwrap_or(false);
    if is_tls {
        if let Some(inner) = e.into_inner() {
            if let Ok(tls) = inner.downcast::<rustls::Error>() {
                return FloodError::Tls(*tls);
            }
        }
        return FloodError::Io(io::Error::new(io::ErrorKind::Other, "TLS failure"));
    }
    FloodError::Io(e)
}

impl Connection for TlsConnection {
    fn read_some(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        loop {
            match self.stream.read(buf) {
                Ok(0) => return Ok(ReadOutcome::eof()),
                Ok(n) => return Ok(ReadOutcome::data(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Ok(ReadOutcome::timeout()),
                // peers commonly close without sending close_notify
                Err(e) if is_peer_gone(&e) => return Ok(ReadOutcome::eof()),
                Err(e) => return Err(tls_failure(e)),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).map_err(tls_failure)?;
        self.stream.flush().map_err(tls_failure)
    }

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool> {
        let state = self.stream.conn.process_new_packets()?;
        if state.plaintext_bytes_to_read() > 0 || state.peer_has_closed() {
            return Ok(true);
        }
        peek_readable(&self.stream.sock, timeout, self.timeout)
    }

    fn close(&mut self) {
        self.stream.conn.send_close_notify();
        if let Err(e) = self.stream.conn.complete_io(&mut self.stream.sock) {
            debug!("close_notify to {} not delivered: {}", self.peer, e);
        }
        if let Err(e) = self.stream.sock.shutdown(Shutdown::Both) {
            debug!("Shutdown of {} reported: {}", self.peer, e);
        }
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ReadStatus;

    #[test]
    fn test_tls_failure_unwraps_rustls_errors() {
        let wrapped = io::Error::new(io::ErrorKind::InvalidData, rustls::Error::DecryptError);
        assert!(matches!(tls_failure(wrapped), FloodError::Tls(rustls::Error::DecryptError)));

        let plain = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(tls_failure(plain), FloodError::Io(_)));
    }

    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use rustls::{ServerConfig, ServerConnection};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    fn server_config() -> Arc<ServerConfig> {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert: CertificateDer<'static> = certified.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();
        Arc::new(config)
    }

    /// Accept one TLS client, optionally stalling before the handshake, echo
    /// "pong" for "ping", then read until the client closes.
    fn spawn_server(stall: Duration) -> (u16, thread::JoinHandle<(Vec<u8>, usize)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = server_config();

        let handle = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            thread::sleep(stall);

            let session = ServerConnection::new(config).unwrap();
            let mut stream = StreamOwned::new(session, sock);
            let mut request = [0u8; 4];
            stream.read_exact(&mut request).unwrap();
            stream.write_all(b"pong").unwrap();
            stream.flush().unwrap();

            let mut rest = [0u8; 64];
            let trailing = stream.read(&mut rest).unwrap_or(0);
            (request.to_vec(), trailing)
        });
        (port, handle)
    }

    #[test]
    fn test_session_round_trip() {
        let (port, server) = spawn_server(Duration::ZERO);

        let engine = TlsEngine::new().unwrap();
        let tcp = TcpConnection::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let mut client = TlsConnection::establish(&engine, tcp, "localhost").unwrap();

        client.write_all(b"ping").unwrap();
        assert!(client.poll_readable(Duration::from_secs(5)).unwrap());

        let mut reply = Vec::new();
        let mut buf = [0u8; 16];
        while reply.len() < 4 {
            let outcome = client.read_some(&mut buf).unwrap();
            assert_ne!(outcome.status, ReadStatus::Eof);
            reply.extend_from_slice(&buf[..outcome.bytes]);
        }
        assert_eq!(reply, b"pong");

        client.close();
        let (request, trailing) = server.join().unwrap();
        assert_eq!(request, b"ping");
        assert_eq!(trailing, 0);
    }

    #[test]
    fn test_handshake_survives_slow_server() {
        // the server waits several read timeouts before answering the hello
        let (port, server) = spawn_server(Duration::from_millis(200));

        let engine = TlsEngine::new().unwrap();
        let tcp = TcpConnection::connect("127.0.0.1", port, Duration::from_millis(50)).unwrap();
        let mut client = TlsConnection::establish(&engine, tcp, "localhost").unwrap();

        client.write_all(b"ping").unwrap();
        let mut reply = Vec::new();
        let mut buf = [0u8; 16];
        while reply.len() < 4 {
            let outcome = client.read_some(&mut buf).unwrap();
            assert_ne!(outcome.status, ReadStatus::Eof);
            reply.extend_from_slice(&buf[..outcome.bytes]);
        }
        assert_eq!(reply, b"pong");

        client.close();
        assert_eq!(server.join().unwrap().0, b"ping");
    }

    #[test]
    fn test_handshake_against_plaintext_server_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 512];
            let _ = conn.read(&mut buf);
            let _ = conn.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
        });

        let engine = TlsEngine::new().unwrap();
        let tcp = TcpConnection::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        assert!(TlsConnection::establish(&engine, tcp, "localhost").is_err());
        server.join().unwrap();
    }
}
