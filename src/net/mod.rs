//! Connection lifecycle for NanoServe
//!
//! This module owns the listening socket and the single connection a
//! responder serves. It knows nothing about HTTP: the caller supplies a
//! handler that receives the raw [`Connection`] and a shared value used to
//! report results back to the test driver.
//!
//! # Examples
//!
//! ```no_run
//! use nanoserve::net::{Config, TcpResponder};
//! use std::io::Write;
//! use std::net::TcpStream;
//!
//! let mut responder = TcpResponder::new(Config::new("127.0.0.1", 0), |conn, buf: &mut Vec<u8>| {
//!     buf.extend_from_slice(&conn.read_partial(1024)?);
//!     Ok(())
//! });
//!
//! let received = responder
//!     .start(Vec::new(), |addr| {
//!         let mut stream = TcpStream::connect(addr).unwrap();
//!         stream.write_all(b"hello").unwrap();
//!     })
//!     .unwrap();
//! responder.stop();
//!
//! assert_eq!(received, b"hello");
//! ```

pub mod listener;
pub mod responder;
pub mod session;

pub use listener::bind;
pub use responder::{Handler, TcpResponder};
pub use session::{Connection, FdSessionOps, PollEvents, SessionOps};

use std::net::SocketAddr;
use std::time::Duration;

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, Error>;

/// Connection lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot resolve address: {0}")]
    Resolve(String),

    /// The peer closed the stream before the read could be satisfied
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] crate::http::Error),

    #[error("Responder worker panicked")]
    WorkerPanicked,

    #[error("Responder not started")]
    NotStarted,

    #[error("Responder already started")]
    AlreadyStarted,
}

/// Default ceiling for a single partial read
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Listen backlog passed to `listen(2)`
pub const LISTEN_BACKLOG: i32 = 128;

/// Responder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    host: String,
    port: u16,
    read_timeout: Option<Duration>,
    chunk_size: usize,
}

impl Config {
    /// Create a configuration listening on `host:port`
    ///
    /// Port `0` asks the system for an ephemeral port; the bound address is
    /// handed to the `on_ready` action of [`TcpResponder::start`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Config {
            host: host.into(),
            port,
            read_timeout: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Fail reads that stay idle for longer than `timeout`
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the per-read ceiling used while reading request bodies
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("localhost", 2000);
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 2000);
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new("127.0.0.1", 0)
            .with_read_timeout(Duration::from_millis(250))
            .with_chunk_size(0);

        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        // A zero ceiling would never make progress
        assert_eq!(config.chunk_size(), 1);
    }

    #[test]
    fn test_http_error_conversion() {
        let err: Error = crate::http::Error::Request("bad".to_string()).into();
        assert!(matches!(err, Error::Http(crate::http::Error::Request(_))));
    }
}
