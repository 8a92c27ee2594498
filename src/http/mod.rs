//! HTTP/1.1 layer for NanoServe
//!
//! This module turns the single connection served by a
//! [`TcpResponder`](crate::net::TcpResponder) into one HTTP request and one
//! `200 OK` response.
//!
//! # Architecture
//!
//! - [`Request`] is an incremental parser: the responder feeds it the request
//!   line, header lines and body chunks as they arrive
//! - [`Response`] is filled in by the caller's callback and serialized with
//!   [`Response::to_wire`]
//! - [`HttpResponder`] ties both to the connection lifecycle
//! - [`HttpClient`] and [`ResponseParser`] drive a responder from tests
//!
//! # Examples
//!
//! ```no_run
//! use nanoserve::http::{HttpClient, HttpResponder};
//! use nanoserve::net::Config;
//!
//! let mut responder = HttpResponder::new(Config::new("127.0.0.1", 0), |res, req, seen: &mut Vec<String>| {
//!     seen.push(req.params()["uuid"].clone());
//!     res.set_body("<html><body>Hello</body></html>");
//! });
//!
//! let seen = responder
//!     .start(Vec::new(), |addr| {
//!         let mut client = HttpClient::connect(addr).unwrap();
//!         let response = client.get("/test?uuid=42").unwrap();
//!         assert_eq!(response.status(), 200);
//!     })
//!     .unwrap();
//! responder.stop();
//!
//! assert_eq!(seen, ["42"]);
//! ```

pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;

pub use client::HttpClient;
pub use headers::Headers;
pub use message::{Method, RequestTarget};
pub use parser::{ReceivedResponse, ResponseParser};
pub use request::{ParserState, Request, FORM_CONTENT_TYPE};
pub use response::Response;
pub use server::{read_request, write_response, HttpResponder};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request line or header line
    #[error("Request error: {0}")]
    Request(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Incomplete message")]
    Incomplete,
}

/// CRLF line ending
pub const CRLF: &str = "\r\n";
