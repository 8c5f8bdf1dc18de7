use super::{closed_early, not_connected, receive_response};
use crate::context::RuntimeContext;
use crate::error::{FloodError, Result};
use crate::http::{Request, Response};
use crate::net::{self, Connection, Endpoint};
use std::time::Duration;
use tracing::debug;

/// Connection-reuse strategy.
///
/// The connection is reopened when the previous response was not
/// keep-alive, when the request targets a different endpoint, or when the
/// idle connection became readable (the server closed it or sent unsolicited
/// bytes). A request written to a reused connection that the server closed
/// in the meantime is resent once on a fresh connection.
#[derive(Debug, Default)]
pub struct KeepAliveSocket {
    conn: Option<Box<dyn Connection>>,
    endpoint: Option<Endpoint>,
    reopen: bool,
    reused: bool,
    carry: Vec<u8>,
    opened: u64,
}

impl KeepAliveSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_conn(&mut self, ctx: &RuntimeContext, request: &mut Request) -> Result<()> {
        request.set_keepalive(true);
        let endpoint = Endpoint::of(request);

        let reusable = !self.reopen
            && self.carry.is_empty()
            && self.endpoint.as_ref() == Some(&endpoint)
            && match self.conn.as_deref_mut() {
                Some(conn) => !conn.poll_readable(Duration::ZERO).unwrap_or(true),
                None => false,
            };

        if reusable {
            self.reused = true;
            return Ok(());
        }
        self.reconnect(ctx, request)
    }

    pub fn send_req(&mut self, ctx: &RuntimeContext, request: &Request) -> Result<()> {
        let conn = self.conn.as_deref_mut().ok_or_else(not_connected)?;
        match conn.write_request(request) {
            Err(FloodError::Io(e)) if self.reused => {
                debug!("Write to reused connection failed ({}), reconnecting", e);
                self.reconnect(ctx, request)?;
                self.conn
                    .as_deref_mut()
                    .ok_or_else(not_connected)?
                    .write_request(request)
            }
            other => other,
        }
    }

    pub fn recv_resp(&mut self, ctx: &RuntimeContext, request: &Request) -> Result<Response> {
        let conn = self.conn.as_deref_mut().ok_or_else(not_connected)?;
        if let Some(response) = receive_response(conn, &mut self.carry, request)? {
            return Ok(response);
        }
        if !self.reused {
            return Err(closed_early(conn.peer()));
        }

        debug!(
            "Kept-alive connection to {} was closed by the server, resending",
            conn.peer()
        );
        self.reconnect(ctx, request)?;
        let conn = self.conn.as_deref_mut().ok_or_else(not_connected)?;
        conn.write_request(request)?;
        receive_response(conn, &mut self.carry, request)?.ok_or_else(|| closed_early(conn.peer()))
    }

    /// Close unless the server agreed to keep the connection alive.
    pub fn end_conn(&mut self, response: &Response) {
        if !response.keepalive() {
            self.close_current();
            self.reopen = true;
        }
    }

    /// Number of connections opened so far.
    pub fn connections_opened(&self) -> u64 {
        self.opened
    }

    fn reconnect(&mut self, ctx: &RuntimeContext, request: &Request) -> Result<()> {
        self.close_current();
        self.conn = Some(net::open(ctx, request)?);
        self.endpoint = Some(Endpoint::of(request));
        self.reopen = false;
        self.reused = false;
        self.opened += 1;
        Ok(())
    }

    fn close_current(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.carry.clear();
    }

    #[cfg(test)]
    pub(crate) fn with_connection(conn: Box<dyn Connection>, request: &Request) -> Self {
        let mut socket = Self::new();
        socket.conn = Some(conn);
        socket.endpoint = Some(Endpoint::of(request));
        socket.opened = 1;
        socket
    }
}

impl Drop for KeepAliveSocket {
    fn drop(&mut self) {
        self.close_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputSink;
    use crate::socket::mock::{ScriptedConnection, Step};
    use http::Method;

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(OutputSink::memory().0).unwrap()
    }

    fn request(uri: &str) -> Request {
        let mut req = Request::new(uri, Method::GET).unwrap();
        req.set_keepalive(true);
        req.serialize(&[]);
        req
    }

    #[test]
    fn test_reuses_connection_for_same_endpoint() {
        let req = request("http://mock/a");
        let conn = ScriptedConnection::new([
            Step::Data(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nA".to_vec()),
        ]);
        let mut socket = KeepAliveSocket::with_connection(Box::new(conn), &req);

        let resp = socket.recv_resp(&ctx(), &req).unwrap();
        socket.end_conn(&resp);
        assert!(!socket.reopen);

        // idle connection has nothing pending, so it is reused
        let mut next = request("http://mock/b");
        socket.begin_conn(&ctx(), &mut next).unwrap();
        assert!(socket.reused);
        assert!(next.keepalive());
        assert_eq!(socket.connections_opened(), 1);
    }

    #[test]
    fn test_close_response_forces_reopen() {
        let req = request("http://mock/a");
        let conn = ScriptedConnection::new([Step::Data(
            b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 1\r\n\r\nA".to_vec(),
        )]);
        let mut socket = KeepAliveSocket::with_connection(Box::new(conn), &req);

        let resp = socket.recv_resp(&ctx(), &req).unwrap();
        assert!(!resp.keepalive());
        socket.end_conn(&resp);
        assert!(socket.reopen);
        assert!(socket.conn.is_none());
    }

    #[test]
    fn test_drop_closes_injected_connection() {
        let req = request("http://mock/a");
        let socket = KeepAliveSocket::with_connection(Box::new(ScriptedConnection::new([])), &req);
        assert_eq!(socket.connections_opened(), 1);
        assert!(socket.endpoint.is_some());
        drop(socket);
    }

    #[test]
    fn test_unreused_connection_closed_early_is_an_error() {
        let req = request("http://mock/a");
        let mut socket = KeepAliveSocket::with_connection(Box::new(ScriptedConnection::new([])), &req);
        assert!(socket.recv_resp(&ctx(), &req).is_err());
    }
}
