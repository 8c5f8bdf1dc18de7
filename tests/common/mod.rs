//! Loopback HTTP/1.1 server shared by the integration tests.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub connection: usize,
    pub head: String,
    pub body: Vec<u8>,
}

impl Seen {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

pub struct TestServer {
    pub port: u16,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<Vec<Seen>>,
}

impl TestServer {
    /// Serve exactly `expected` requests, answering each with `respond`.
    ///
    /// Connections are handled one at a time and kept open until the client
    /// closes them or the response carries `Connection: close`.
    pub fn start<F>(expected: usize, respond: F) -> Self
    where
        F: Fn(usize, &Seen) -> Vec<u8> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            while seen.len() < expected {
                let (mut stream, _) = listener.accept().unwrap();
                let connection = counter.fetch_add(1, Ordering::SeqCst);
                let mut pending = Vec::new();

                while seen.len() < expected {
                    let Some((head, body)) = read_request(&mut stream, &mut pending) else {
                        break;
                    };
                    let request = Seen {
                        connection,
                        head,
                        body,
                    };
                    let response = respond(seen.len(), &request);
                    let closing = String::from_utf8_lossy(&response)
                        .to_ascii_lowercase()
                        .contains("connection: close");
                    seen.push(request);
                    if stream.write_all(&response).is_err() || closing {
                        break;
                    }
                }
            }
            seen
        });

        Self {
            port,
            connections,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn finish(self) -> (Vec<Seen>, usize) {
        let seen = self.handle.join().unwrap();
        (seen, self.connections.load(Ordering::SeqCst))
    }
}

fn read_request(stream: &mut TcpStream, pending: &mut Vec<u8>) -> Option<(String, Vec<u8>)> {
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        pending.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&pending[..head_end]).into_owned();
    let length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while pending.len() < head_end + length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        pending.extend_from_slice(&buf[..n]);
    }

    let body = pending[head_end..head_end + length].to_vec();
    pending.drain(..head_end + length);
    Some((head, body))
}

/// `200 OK` with a Content-Length body.
pub fn ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Same as [`ok`], asking the client to close.
pub fn ok_close(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// `200 OK` with the body split into the given chunks.
pub fn chunked(chunks: &[&str]) -> Vec<u8> {
    let mut out = String::from("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
    for chunk in chunks {
        out.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), chunk));
    }
    out.push_str("0\r\n\r\n");
    out.into_bytes()
}

pub fn status(code: u16, reason: &str) -> Vec<u8> {
    format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n", code, reason).into_bytes()
}
