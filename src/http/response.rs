use super::parser::{CaptureMode, ResponseParser};
use http::Method;
use std::borrow::Cow;
use std::collections::HashMap;

/// A received HTTP response.
///
/// The buffer holds the header block followed by the captured (de-chunked)
/// body bytes. In first-chunk capture mode the body is truncated; the total
/// number of body bytes read off the wire is still available through
/// [`Response::body_length`].
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub(crate) buffer: Vec<u8>,
    pub(crate) head_len: usize,
    pub(crate) status: Option<u16>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) keepalive: bool,
    pub(crate) chunked: bool,
    pub(crate) body_length: u64,
    pub(crate) malformed: bool,
}

impl Response {
    /// Parse a complete response held in memory, capturing the full body.
    ///
    /// The end of `raw` is treated as the end of the stream.
    pub fn parse(raw: &[u8], method: &Method) -> Self {
        let mut parser = ResponseParser::new(method, CaptureMode::Full);
        parser.feed(raw);
        parser.finish();
        parser.into_response()
    }

    /// Header block followed by the captured body.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Lossy text view of [`Response::bytes`], used for pattern matching.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn head(&self) -> &[u8] {
        &self.buffer[..self.head_len]
    }

    pub fn body(&self) -> &[u8] {
        &self.buffer[self.head_len..]
    }

    /// Numeric status code, if the status line could be read.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Header value by case-insensitive name; the last occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Whether the connection may carry another request.
    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    pub fn chunked(&self) -> bool {
        self.chunked
    }

    /// Body bytes received, including any not kept in the buffer.
    pub fn body_length(&self) -> u64 {
        self.body_length
    }

    /// Whether the framing could not be followed.
    pub fn malformed(&self) -> bool {
        self.malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_in_memory() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nX-A: 1\r\nx-a: 2\r\n\r\nbody";
        let resp = Response::parse(raw, &Method::GET);
        assert_eq!(resp.status(), Some(200));
        assert_eq!(resp.body(), b"body");
        assert_eq!(resp.header("X-A"), Some("2"));
        assert!(resp.keepalive());
        assert!(resp.head().ends_with(b"\r\n\r\n"));
        assert!(resp.text().starts_with("HTTP/1.1 200"));
    }
}
