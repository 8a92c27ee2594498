//! HTTP client implementation
//!
//! A deliberately small blocking client used to drive a responder from the
//! `on_ready` action of a test. Requests are written as raw bytes so tests
//! can send exactly what they want, malformed input included.

use super::{ReceivedResponse, ResponseParser, FORM_CONTENT_TYPE};
use crate::net::{self, Connection, FdSessionOps};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// HTTP client
pub struct HttpClient {
    conn: Connection<FdSessionOps>,
    host: String,
    parser: ResponseParser,
}

impl HttpClient {
    /// Connect to a responder
    pub fn connect(addr: SocketAddr) -> net::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(HttpClient {
            conn: Connection::new(FdSessionOps::new(stream)).with_peer(addr),
            host: addr.to_string(),
            parser: ResponseParser::new(),
        })
    }

    /// Set the timeout for reads and writes
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.conn.set_timeout(Some(timeout));
    }

    /// Write raw bytes to the connection
    pub fn send_raw(&mut self, data: &[u8]) -> net::Result<()> {
        self.conn.write_all(data)
    }

    /// Send a GET request and wait for the response
    pub fn get(&mut self, target: &str) -> net::Result<ReceivedResponse> {
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            target, self.host
        );
        self.send_raw(request.as_bytes())?;
        self.receive_response()
    }

    /// Send a URL-encoded form POST and wait for the response
    pub fn post_form(&mut self, target: &str, body: &str) -> net::Result<ReceivedResponse> {
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            target,
            self.host,
            FORM_CONTENT_TYPE,
            body.len(),
            body
        );
        self.send_raw(request.as_bytes())?;
        self.receive_response()
    }

    /// Receive an HTTP response
    pub fn receive_response(&mut self) -> net::Result<ReceivedResponse> {
        self.parser.reset();

        loop {
            let data = match self.conn.read_partial(4096) {
                Ok(data) => data,
                Err(net::Error::ConnectionClosed) => return Ok(self.parser.finish()?),
                Err(e) => return Err(e),
            };

            if let Some(response) = self.parser.parse(&data)? {
                return Ok(response);
            }
        }
    }

    /// Close the connection
    pub fn close(&mut self) -> net::Result<()> {
        self.conn.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_get_sends_request_line_and_host() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let mut client = HttpClient::connect(addr).unwrap();
        let response = client.get("/path?a=1").unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), b"ok");

        let sent = handle.join().unwrap();
        assert!(sent.starts_with("GET /path?a=1 HTTP/1.1\r\n"));
        assert!(sent.contains(&format!("Host: {}\r\n", addr)));
    }

    #[test]
    fn test_response_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"HTTP/1.1 200 OK\r\n\r\nuntil close").unwrap();
        });

        let mut client = HttpClient::connect(addr).unwrap();
        let response = client.receive_response().unwrap();
        assert_eq!(response.body_string(), "until close");

        handle.join().unwrap();
    }
}
