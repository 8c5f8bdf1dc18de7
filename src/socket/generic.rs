use super::{closed_early, not_connected, receive_response};
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::net::{self, Connection};

/// Open-per-request strategy.
#[derive(Debug, Default)]
pub struct GenericSocket {
    conn: Option<Box<dyn Connection>>,
}

impl GenericSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection for `request`, which is marked non-keep-alive.
    pub fn begin_conn(&mut self, ctx: &RuntimeContext, request: &mut Request) -> Result<()> {
        request.set_keepalive(false);
        self.conn = Some(net::open(ctx, request)?);
        Ok(())
    }

    pub fn send_req(&mut self, request: &Request) -> Result<()> {
        self.conn
            .as_deref_mut()
            .ok_or_else(not_connected)?
            .write_request(request)
    }

    pub fn recv_resp(&mut self, request: &Request) -> Result<Response> {
        let conn = self.conn.as_deref_mut().ok_or_else(not_connected)?;
        let mut carry = Vec::new();
        receive_response(conn, &mut carry, request)?.ok_or_else(|| closed_early(conn.peer()))
    }

    /// Always closes.
    pub fn end_conn(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    #[cfg(test)]
    pub(crate) fn with_connection(conn: Box<dyn Connection>) -> Self {
        Self { conn: Some(conn) }
    }
}
