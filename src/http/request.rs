use crate::defaults;
use crate::error::{FloodError, Result};
use http::{Method, Uri};
use std::fmt;

/// URI schemes flood can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated absolute `http`/`https` URI.
///
/// Missing ports take the scheme's default, a missing path becomes `/`, and
/// embedded `user:password@` credentials are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedUri {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
    hostinfo: String,
}

impl ParsedUri {
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = |reason: &str| FloodError::MalformedUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = raw
            .trim()
            .parse()
            .map_err(|e: http::uri::InvalidUri| malformed(&e.to_string()))?;

        let scheme = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("http") => Scheme::Http,
            Some(s) if s.eq_ignore_ascii_case("https") => Scheme::Https,
            Some(_) => return Err(malformed("only http and https are supported")),
            None => return Err(malformed("missing scheme")),
        };

        let authority = uri.authority().ok_or_else(|| malformed("missing host"))?;
        if authority.as_str().contains('@') {
            return Err(malformed("user information is not allowed in the URL"));
        }

        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        if host.is_empty() {
            return Err(malformed("missing host"));
        }

        let port = authority
            .port_u16()
            .unwrap_or_else(|| scheme.default_port());

        let path = match uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query: uri.query().map(str::to_string),
            hostinfo: authority.as_str().to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host name or address, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Authority exactly as written, used for the `Host` header.
    pub fn hostinfo(&self) -> &str {
        &self.hostinfo
    }

    /// `path[?query]`, the origin-form request target.
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// `scheme://hostinfo/path[?query]`, the absolute-form request target.
    pub fn absolute(&self) -> String {
        format!("{}://{}{}", self.scheme, self.hostinfo, self.request_target())
    }

    /// `host:port` with IPv6 hosts bracketed, as used by `CONNECT`.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// One HTTP request, built fresh for every iteration.
#[derive(Debug, Clone)]
pub struct Request {
    uri: String,
    target: ParsedUri,
    proxy: Option<ParsedUri>,
    method: Method,
    keepalive: bool,
    payload: Option<Vec<u8>>,
    content_type: Option<String>,
    want_full_response: bool,
    wire: Vec<u8>,
}

impl Request {
    /// Validate `uri` and create a request with no payload.
    pub fn new(uri: impl Into<String>, method: Method) -> Result<Self> {
        let uri = uri.into();
        let target = ParsedUri::parse(&uri)?;
        Ok(Self {
            uri,
            target,
            proxy: None,
            method,
            keepalive: false,
            payload: None,
            content_type: None,
            want_full_response: false,
            wire: Vec::new(),
        })
    }

    pub fn with_payload(mut self, payload: Vec<u8>, content_type: Option<String>) -> Self {
        self.payload = Some(payload);
        self.content_type = content_type;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ParsedUri>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_full_response(mut self, wanted: bool) -> Self {
        self.want_full_response = wanted;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn target(&self) -> &ParsedUri {
        &self.target
    }

    pub fn proxy(&self) -> Option<&ParsedUri> {
        self.proxy.as_ref()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    pub fn set_keepalive(&mut self, keepalive: bool) {
        self.keepalive = keepalive;
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(defaults::CONTENT_TYPE)
    }

    pub fn want_full_response(&self) -> bool {
        self.want_full_response
    }

    /// Serialized bytes produced by [`Request::serialize`].
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Serialize the request line, headers and body into the wire buffer.
    ///
    /// `extra_headers` are complete `Name: value` lines without line endings;
    /// they follow the fixed `User-Agent`, `Connection` and `Host` headers.
    pub fn serialize(&mut self, extra_headers: &[String]) {
        let request_target = match (&self.proxy, self.target.scheme()) {
            (Some(_), Scheme::Http) => self.target.absolute(),
            _ => self.target.request_target(),
        };

        let mut head = format!(
            "{} {} HTTP/1.1\r\nUser-Agent: {}\r\nConnection: {}\r\nHost: {}\r\n",
            self.method,
            request_target,
            defaults::user_agent(),
            if self.keepalive { "Keep-Alive" } else { "Close" },
            self.target.hostinfo(),
        );

        for header in extra_headers {
            head.push_str(header);
            head.push_str("\r\n");
        }

        if let Some(payload) = &self.payload {
            head.push_str(&format!(
                "Content-Length: {}\r\nContent-Type: {}\r\n",
                payload.len(),
                self.content_type()
            ));
        }
        head.push_str("\r\n");

        let mut wire = head.into_bytes();
        if let Some(payload) = &self.payload {
            wire.extend_from_slice(payload);
        }
        self.wire = wire;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_filled_in() {
        let uri = ParsedUri::parse("https://example.com").unwrap();
        assert_eq!(uri.scheme(), Scheme::Https);
        assert_eq!(uri.port(), 443);
        assert_eq!(uri.path(), "/");
        assert_eq!(uri.hostinfo(), "example.com");

        let uri = ParsedUri::parse("http://10.0.0.1:8080/a/b?x=1&y=2").unwrap();
        assert_eq!(uri.port(), 8080);
        assert_eq!(uri.request_target(), "/a/b?x=1&y=2");
        assert_eq!(uri.hostinfo(), "10.0.0.1:8080");
    }

    #[test]
    fn test_ipv6_host() {
        let uri = ParsedUri::parse("http://[::1]:9000/").unwrap();
        assert_eq!(uri.host(), "::1");
        assert_eq!(uri.authority(), "[::1]:9000");
        assert_eq!(uri.hostinfo(), "[::1]:9000");
    }

    #[test]
    fn test_rejects_malformed_urls() {
        for raw in [
            "/relative/path",
            "ftp://example.com/",
            "http://user:pw@example.com/",
            "not a url",
        ] {
            let err = ParsedUri::parse(raw).unwrap_err();
            assert!(err.is_fatal(), "{} should be fatal", raw);
        }
    }

    #[test]
    fn test_serialize_get() {
        let mut req = Request::new("http://localhost:8080/index.html?q=1", Method::GET).unwrap();
        req.serialize(&[]);
        let text = String::from_utf8(req.wire().to_vec()).unwrap();
        assert_eq!(
            text,
            format!(
                "GET /index.html?q=1 HTTP/1.1\r\nUser-Agent: Flood/{}\r\nConnection: Close\r\nHost: localhost:8080\r\n\r\n",
                crate::VERSION
            )
        );
    }

    #[test]
    fn test_serialize_post_with_payload_and_headers() {
        let mut req = Request::new("http://h/form", Method::POST)
            .unwrap()
            .with_payload(b"a=1&b=2".to_vec(), None);
        req.set_keepalive(true);
        req.serialize(&["X-Test: yes".to_string()]);
        let text = String::from_utf8(req.wire().to_vec()).unwrap();
        assert!(text.starts_with("POST /form HTTP/1.1\r\n"));
        assert!(text.contains("Connection: Keep-Alive\r\n"));
        assert!(text.contains("X-Test: yes\r\n"));
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.contains("Content-Type: application/x-www-form-urlencoded\r\n"));
        assert!(text.ends_with("\r\n\r\na=1&b=2"));
    }

    #[test]
    fn test_proxy_uses_absolute_form_for_plain_http() {
        let proxy = ParsedUri::parse("http://proxy:3128").unwrap();
        let mut req = Request::new("http://origin/x", Method::GET)
            .unwrap()
            .with_proxy(Some(proxy.clone()));
        req.serialize(&[]);
        assert!(req.wire().starts_with(b"GET http://origin/x HTTP/1.1\r\n"));

        let mut tls = Request::new("https://origin/x", Method::GET)
            .unwrap()
            .with_proxy(Some(proxy));
        tls.serialize(&[]);
        assert!(tls.wire().starts_with(b"GET /x HTTP/1.1\r\n"));
    }
}
