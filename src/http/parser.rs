//! Incremental HTTP/1.x response parser.
//!
//! The parser is fed whatever a socket read returned and keeps its own
//! carry-over state, so chunk-size lines, chunk data and the header block may
//! be split across any number of reads. It stops consuming at the end of the
//! response; bytes past that point belong to the next response on a
//! keep-alive connection and are left for the caller.
//!
//! Framing is decided once the header block is complete, in priority order:
//!
//! 1. `HEAD` requests and 1xx/204/304 responses have no body
//! 2. `Transfer-Encoding: chunked`
//! 3. `Content-Length`
//! 4. otherwise the body runs until the peer closes the connection
//!
//! Broken framing never fails the parse. It downgrades the response to
//! read-until-close and clears the keep-alive flag so the connection is
//! reopened for the next request.

use super::response::Response;
use crate::defaults;
use http::Method;
use std::collections::HashMap;

/// How much of the body the caller wants to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Keep at most [`defaults::MAX_DOC_LENGTH`] bytes of response; the rest
    /// is read and discarded.
    FirstChunk,
    /// Keep every body byte.
    Full,
}

/// Parser position within the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Headers,
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkDataEnd,
    Trailers,
    Fixed { remaining: u64 },
    UntilEof,
    Done,
}

/// Result of one [`ResponseParser::feed`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Input bytes that belonged to this response.
    pub consumed: usize,
    /// Decoded body bytes produced from them.
    pub body_bytes: usize,
}

#[derive(Debug)]
pub struct ResponseParser {
    state: ParseState,
    capture: CaptureMode,
    head_request: bool,
    head: Vec<u8>,
    head_complete: bool,
    line: Vec<u8>,
    body: Vec<u8>,
    body_length: u64,
    status: Option<u16>,
    headers: HashMap<String, String>,
    keepalive: bool,
    chunked: bool,
    malformed: bool,
}

impl ResponseParser {
    pub fn new(method: &Method, capture: CaptureMode) -> Self {
        Self {
            state: ParseState::Headers,
            capture,
            head_request: *method == Method::HEAD,
            head: Vec::new(),
            head_complete: false,
            line: Vec::new(),
            body: Vec::new(),
            body_length: 0,
            status: None,
            headers: HashMap::new(),
            keepalive: false,
            chunked: false,
            malformed: false,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Whether any part of a response has been seen.
    pub fn has_started(&self) -> bool {
        !self.head.is_empty()
    }

    /// Consume as much of `data` as belongs to this response.
    pub fn feed(&mut self, data: &[u8]) -> Progress {
        let mut progress = Progress::default();
        let mut rest = data;

        while !rest.is_empty() && !self.is_done() {
            let before_len = rest.len();
            let before_state = self.state;
            rest = self.step(rest, &mut progress.body_bytes);
            if rest.len() == before_len && self.state == before_state {
                break;
            }
        }

        progress.consumed = data.len() - rest.len();
        progress
    }

    /// Signal that no more bytes will arrive (end of stream or timeout).
    ///
    /// A body that was expected to continue is marked malformed and the
    /// connection is no longer considered reusable.
    pub fn finish(&mut self) {
        match self.state {
            ParseState::Done => return,
            ParseState::UntilEof => {}
            ParseState::Headers => {
                if !self.head.is_empty() {
                    self.parse_head();
                }
                self.malformed = true;
            }
            _ => self.malformed = true,
        }
        self.keepalive = false;
        self.state = ParseState::Done;
    }

    pub fn into_response(self) -> Response {
        let head_len = self.head.len();
        let mut buffer = self.head;
        buffer.extend_from_slice(&self.body);

        Response {
            buffer,
            head_len,
            status: self.status,
            headers: self.headers,
            keepalive: self.keepalive,
            chunked: self.chunked,
            body_length: self.body_length,
            malformed: self.malformed,
        }
    }

    fn step<'a>(&mut self, rest: &'a [u8], body_bytes: &mut usize) -> &'a [u8] {
        match self.state {
            ParseState::Headers => self.read_headers(rest),
            ParseState::ChunkSize => {
                let (line, rest) = self.take_line(rest);
                if let Some(line) = line {
                    match parse_chunk_size(&line) {
                        Some(0) => self.state = ParseState::Trailers,
                        Some(size) => self.state = ParseState::ChunkData { remaining: size },
                        None => self.degrade(),
                    }
                }
                rest
            }
            ParseState::ChunkData { remaining } => {
                let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(rest.len());
                *body_bytes += self.capture(&rest[..n]);
                let remaining = remaining - n as u64;
                self.state = if remaining == 0 {
                    ParseState::ChunkDataEnd
                } else {
                    ParseState::ChunkData { remaining }
                };
                &rest[n..]
            }
            ParseState::ChunkDataEnd => {
                let (line, rest) = self.take_line(rest);
                match line {
                    Some(line) if line.is_empty() => self.state = ParseState::ChunkSize,
                    Some(_) => self.degrade(),
                    None => {}
                }
                rest
            }
            ParseState::Trailers => {
                let (line, rest) = self.take_line(rest);
                if let Some(line) = line {
                    if line.is_empty() {
                        self.state = ParseState::Done;
                    }
                }
                rest
            }
            ParseState::Fixed { remaining } => {
                let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(rest.len());
                *body_bytes += self.capture(&rest[..n]);
                let remaining = remaining - n as u64;
                self.state = if remaining == 0 {
                    ParseState::Done
                } else {
                    ParseState::Fixed { remaining }
                };
                &rest[n..]
            }
            ParseState::UntilEof => {
                *body_bytes += self.capture(rest);
                &[]
            }
            ParseState::Done => rest,
        }
    }

    fn read_headers<'a>(&mut self, rest: &'a [u8]) -> &'a [u8] {
        let search_from = self.head.len().saturating_sub(3);
        self.head.extend_from_slice(rest);

        if let Some(pos) = find(&self.head[search_from..], b"\r\n\r\n") {
            let end = search_from + pos + 4;
            let surplus = self.head.len() - end;
            self.head.truncate(end);
            self.on_head_complete();
            return &rest[rest.len() - surplus..];
        }

        if self.head.len() > defaults::MAX_HEADER_LENGTH {
            self.parse_head();
            self.degrade();
        }
        &[]
    }

    fn on_head_complete(&mut self) {
        self.parse_head();
        if self.malformed {
            return;
        }

        let no_body = self.head_request
            || matches!(self.status, Some(100..=199) | Some(204) | Some(304));
        if no_body {
            self.state = ParseState::Done;
            return;
        }

        let chunked = self
            .headers
            .get("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        if chunked {
            self.chunked = true;
            self.state = ParseState::ChunkSize;
            return;
        }

        match self.headers.get("content-length").map(|v| v.trim().parse::<u64>()) {
            Some(Ok(0)) => self.state = ParseState::Done,
            Some(Ok(length)) => self.state = ParseState::Fixed { remaining: length },
            Some(Err(_)) => self.degrade(),
            None => {
                self.keepalive = false;
                self.state = ParseState::UntilEof;
            }
        }
    }

    fn parse_head(&mut self) {
        if self.head_complete {
            return;
        }
        self.head_complete = true;

        let text = String::from_utf8_lossy(&self.head).into_owned();
        let mut lines = text.split("\r\n");

        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.split_whitespace();
        let version = parts.next().unwrap_or_default();
        self.status = parts.next().and_then(|code| code.parse::<u16>().ok());

        for line in lines.filter(|l| !l.is_empty()) {
            if let Some((name, value)) = line.split_once(':') {
                self.headers
                    .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let connection = self
            .headers
            .get("connection")
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        self.keepalive = if connection.contains("close") {
            false
        } else if version.eq_ignore_ascii_case("HTTP/1.0") {
            connection.contains("keep-alive")
        } else {
            true
        };

        if !version.starts_with("HTTP/") || self.status.is_none() {
            self.degrade();
        }
    }

    fn degrade(&mut self) {
        self.malformed = true;
        self.keepalive = false;
        self.state = ParseState::UntilEof;
    }

    fn take_line<'a>(&mut self, rest: &'a [u8]) -> (Option<Vec<u8>>, &'a [u8]) {
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.line.extend_from_slice(&rest[..pos]);
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                (Some(line), &rest[pos + 1..])
            }
            None => {
                self.line.extend_from_slice(rest);
                if self.line.len() > defaults::MAX_LINE_LENGTH {
                    self.line.clear();
                    self.degrade();
                }
                (None, &[])
            }
        }
    }

    fn capture(&mut self, bytes: &[u8]) -> usize {
        self.body_length += bytes.len() as u64;
        match self.capture {
            CaptureMode::Full => self.body.extend_from_slice(bytes),
            CaptureMode::FirstChunk => {
                let room = defaults::MAX_DOC_LENGTH.saturating_sub(self.head.len() + self.body.len());
                self.body.extend_from_slice(&bytes[..room.min(bytes.len())]);
            }
        }
        bytes.len()
    }
}

fn parse_chunk_size(line: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(line).ok()?;
    let size = text.split(';').next()?.trim();
    if size.is_empty() {
        return None;
    }
    u64::from_str_radix(size, 16).ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
