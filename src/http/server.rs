//! HTTP responder
//!
//! [`HttpResponder`] puts the request parser and response model on top of a
//! [`TcpResponder`]: the single accepted connection is read into a
//! [`Request`], the callback fills in a [`Response`], and the response is
//! written back before the connection is closed.

use super::{Request, Response};
use crate::net::{self, Config, Connection, SessionOps, TcpResponder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, Level};

/// Response callback
///
/// Called once per accepted connection with a fresh response, the parsed
/// request and the shared value passed to [`HttpResponder::start`].
pub type Callback<T> = dyn Fn(&mut Response, &Request, &mut T) + Send + Sync;

/// Single-connection HTTP/1.1 responder
pub struct HttpResponder<T> {
    inner: TcpResponder<T>,
}

impl<T: Send + 'static> HttpResponder<T> {
    /// Create a responder that answers with `callback`
    pub fn new<F>(config: Config, callback: F) -> Self
    where
        F: Fn(&mut Response, &Request, &mut T) + Send + Sync + 'static,
    {
        let callback: Arc<Callback<T>> = Arc::new(callback);
        let chunk_size = config.chunk_size();
        let inner = TcpResponder::new(config, move |conn, shared| {
            let request = read_request(conn, chunk_size)?;

            let mut response = Response::new();
            debug!("calling");
            callback(&mut response, &request, shared);

            write_response(conn, &response)
        });

        HttpResponder { inner }
    }

    /// Bind, serve one request in the background, and wait for it
    ///
    /// See [`TcpResponder::start`].
    pub fn start<F>(&mut self, shared: T, on_ready: F) -> net::Result<T>
    where
        F: FnOnce(SocketAddr),
    {
        self.inner.start(shared, on_ready)
    }

    /// Bind and launch the worker without waiting for it
    pub fn spawn(&mut self, shared: T) -> net::Result<SocketAddr> {
        self.inner.spawn(shared)
    }

    /// Wait for the worker launched by [`spawn`](Self::spawn)
    pub fn join(&mut self) -> net::Result<T> {
        self.inner.join()
    }
}

impl<T> HttpResponder<T> {
    pub fn config(&self) -> &Config {
        self.inner.config()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr()
    }

    /// Close the listening socket and any in-flight connection
    pub fn stop(&mut self) {
        self.inner.stop();
    }
}

/// Read one request: lines until the headers are complete, then the body
///
/// The body is read in chunks of at most `chunk_size` bytes until
/// `Content-Length` bytes have arrived.
pub fn read_request<S: SessionOps>(conn: &mut Connection<S>, chunk_size: usize) -> net::Result<Request> {
    let mut request = Request::new();
    let mut raw = tracing::enabled!(Level::DEBUG).then(String::new);

    while !request.headers_complete() {
        let line = conn.read_line()?;
        if let Some(raw) = raw.as_mut() {
            raw.push_str(&String::from_utf8_lossy(&line));
        }
        request.feed(&line)?;
    }

    if let Some(raw) = raw {
        debug!(client = ?conn.peer(), "request:\n{}", indent(&raw));
    }

    let mut read = 0;
    while request.remaining() > 0 {
        let data = conn.read_partial(chunk_size.min(request.remaining()))?;
        read += data.len();
        request.feed(&data)?;
    }
    debug!(client = ?conn.peer(), "request body: {} bytes read", read);

    Ok(request)
}

/// Serialize `response` and write it to the connection
pub fn write_response<S: SessionOps>(conn: &mut Connection<S>, response: &Response) -> net::Result<()> {
    let wire = response.to_wire();

    if tracing::enabled!(Level::DEBUG) {
        debug!(client = ?conn.peer(), "response:\n{}", indent(&String::from_utf8_lossy(&wire)));
    }

    conn.write_all(&wire)
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {}\n", line)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::session::tests::ScriptedSession;
    use crate::net::Error;

    #[test]
    fn test_read_request_fragmented() {
        let mut conn = Connection::new(ScriptedSession::new(&[
            b"POST /upload?id=1 HT",
            b"TP/1.1\r\nContent-Length: 11\r\nHost: lo",
            b"calhost\r\n\r\nhello",
            b" ",
            b"world",
        ]));

        let request = read_request(&mut conn, 4).unwrap();
        assert!(request.is_complete());
        assert_eq!(request.host(), Some("localhost"));
        assert_eq!(request.path(), Some("/upload"));
        assert_eq!(request.body(), b"hello world");
    }

    #[test]
    fn test_read_request_disconnect_before_request_line() {
        let mut conn = Connection::new(ScriptedSession::new(&[b"GET /te"]));
        assert!(matches!(read_request(&mut conn, 1024), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_read_request_short_body() {
        let mut conn = Connection::new(ScriptedSession::new(&[
            b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n",
            b"short",
        ]));
        assert!(matches!(read_request(&mut conn, 1024), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_read_request_malformed() {
        let mut conn = Connection::new(ScriptedSession::new(&[b"get / HTTP/1.1\r\n\r\n"]));
        assert!(matches!(
            read_request(&mut conn, 1024),
            Err(Error::Http(crate::http::Error::Request(_)))
        ));
    }

    #[test]
    fn test_write_response() {
        let mut conn = Connection::new(ScriptedSession::new(&[]));
        let mut response = Response::new();
        response.set_body("payload");

        write_response(&mut conn, &response).unwrap();
        assert_eq!(conn.get_ref().written, response.to_wire());
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("GET / HTTP/1.1\r\nHost: a\r\n"), "    GET / HTTP/1.1\n    Host: a\n");
    }
}
