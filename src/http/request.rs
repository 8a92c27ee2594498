//! Incremental HTTP request parser
//!
//! A [`Request`] is built by feeding it the request line, then one header
//! line at a time, then body bytes. The current [`ParserState`] decides how
//! each fed chunk is interpreted:
//!
//! - `Start`: the chunk is the request line
//! - `Headers`: the chunk is a header line; an empty line ends the headers
//! - `Body`: the chunk is raw body data, kept up to `Content-Length` bytes
//!
//! # Examples
//!
//! ```
//! use nanoserve::http::Request;
//!
//! let mut req = Request::new();
//! req.feed(b"POST /submit?uuid=42 HTTP/1.1\r\n").unwrap();
//! req.feed(b"Content-Type: application/x-www-form-urlencoded\r\n").unwrap();
//! req.feed(b"Content-Length: 5\r\n").unwrap();
//! req.feed(b"\r\n").unwrap();
//! assert!(req.headers_complete());
//!
//! req.feed(b"f=foo").unwrap();
//! assert!(req.is_complete());
//! assert_eq!(req.params()["uuid"], "42");
//! assert_eq!(req.params()["f"], "foo");
//! ```

use super::{Error, Headers, Method, RequestTarget, Result};
use bytes::BytesMut;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use url::form_urlencoded;

/// Content type whose body is decoded into [`Request::form`]
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn request_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<method>[A-Z]+)\s+(?P<target>\S+)\s+(?P<version>HTTP/\d\.\d)$")
            .expect("valid request line regex")
    })
}

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Expecting the request line
    Start,
    /// Expecting a header line or the blank line ending the headers
    Headers,
    /// Expecting body bytes
    Body,
}

#[derive(Debug, Clone)]
struct RequestLine {
    method: Method,
    target: RequestTarget,
    version: String,
}

/// HTTP request under construction
#[derive(Debug, Clone, Default)]
pub struct Request {
    line: Option<RequestLine>,
    headers: Headers,
    headers_complete: bool,
    expected_body: usize,
    body: BytesMut,
}

impl Request {
    /// Create an empty request in the `Start` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current parser state
    pub fn state(&self) -> ParserState {
        if self.line.is_none() {
            ParserState::Start
        } else if !self.headers_complete {
            ParserState::Headers
        } else {
            ParserState::Body
        }
    }

    /// Feed the next line, or body chunk once the headers are complete
    ///
    /// Lines may carry their `\r\n` or `\n` terminator and must be UTF-8. A
    /// rejected line leaves the request unchanged.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        match self.state() {
            ParserState::Start => self.parse_request_line(text_line(data)?),
            ParserState::Headers => self.parse_header(text_line(data)?),
            ParserState::Body => {
                self.parse_body(data);
                Ok(())
            }
        }
    }

    fn parse_request_line(&mut self, line: &str) -> Result<()> {
        let caps = request_line_re()
            .captures(line)
            .ok_or_else(|| Error::Request(format!("cannot parse request: '{}'", line)))?;

        let method = Method::from_token(&caps["method"])?;
        let target = RequestTarget::parse(&caps["target"])?;
        let version = caps["version"].to_string();

        self.line = Some(RequestLine {
            method,
            target,
            version,
        });
        Ok(())
    }

    fn parse_header(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            self.expected_body = self.declared_length()?;
            self.headers_complete = true;
            return Ok(());
        }

        let (name, value) = Headers::parse_header_line(line)
            .map_err(|_| Error::Request(format!("cannot parse header: '{}'", line)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn parse_body(&mut self, data: &[u8]) {
        let take = self.remaining().min(data.len());
        if take < data.len() {
            tracing::trace!(extra = data.len() - take, "ignoring bytes past content-length");
        }
        self.body.extend_from_slice(&data[..take]);
    }

    fn declared_length(&self) -> Result<usize> {
        match self.headers.get("content-length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidContentLength(value.to_string())),
            None => Ok(0),
        }
    }

    /// Whether the blank line ending the headers has been seen
    pub fn headers_complete(&self) -> bool {
        self.headers_complete
    }

    /// Body bytes still expected
    pub fn remaining(&self) -> usize {
        self.expected_body.saturating_sub(self.body.len())
    }

    /// Whether headers and the declared body have been fully read
    pub fn is_complete(&self) -> bool {
        self.headers_complete && self.remaining() == 0
    }

    /// Request method, once the request line is parsed
    pub fn method(&self) -> Option<&Method> {
        self.line.as_ref().map(|l| &l.method)
    }

    /// Request target, once the request line is parsed
    pub fn uri(&self) -> Option<&RequestTarget> {
        self.line.as_ref().map(|l| &l.target)
    }

    /// HTTP version token exactly as sent
    pub fn http_version(&self) -> Option<&str> {
        self.line.as_ref().map(|l| l.version.as_str())
    }

    pub fn path(&self) -> Option<&str> {
        self.uri().map(RequestTarget::path)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Declared body length, if the header is present and valid
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Whether the body is a URL-encoded form
    pub fn is_form(&self) -> bool {
        self.content_type() == Some(FORM_CONTENT_TYPE)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decoded query string pairs, in order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let query = self.uri().and_then(RequestTarget::query).unwrap_or_default();
        decode_pairs(query.as_bytes())
    }

    /// Decoded form body pairs, in order; empty unless [`is_form`](Self::is_form)
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        if self.is_form() {
            decode_pairs(&self.body)
        } else {
            Vec::new()
        }
    }

    /// Query parameters; a repeated key keeps its last value
    pub fn query(&self) -> HashMap<String, String> {
        self.query_pairs().into_iter().collect()
    }

    /// Form parameters; a repeated key keeps its last value
    pub fn form(&self) -> HashMap<String, String> {
        self.form_pairs().into_iter().collect()
    }

    /// Query parameters overlaid with form parameters
    pub fn params(&self) -> HashMap<String, String> {
        let mut params = self.query();
        params.extend(self.form());
        params
    }
}

fn decode_pairs(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input).into_owned().collect()
}

/// Strip one trailing line terminator
fn chomp(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .or_else(|| line.strip_suffix(b"\r"))
        .unwrap_or(line)
}

/// Strip the terminator and reject lines that are not UTF-8
fn text_line(data: &[u8]) -> Result<&str> {
    let line = chomp(data);
    std::str::from_utf8(line)
        .map_err(|_| Error::Request(format!("line is not UTF-8: '{}'", line.escape_ascii())))
}
