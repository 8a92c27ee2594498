//! HTTP response model
//!
//! Every response is `200 OK`. Header values that would otherwise change
//! between calls (`Date`, `ETag`) are fixed when the response is created, so
//! serializing the same response twice yields the same bytes.

use super::CRLF;
use bytes::Bytes;
use std::time::SystemTime;
use uuid::Uuid;

/// Value of the `Server` header
pub const SERVER: &str = "NanoServe";

/// `Content-Type` used until the callback sets another one
pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// HTTP response built by the responder callback
#[derive(Debug, Clone)]
pub struct Response {
    body: Bytes,
    content_length: usize,
    content_type: String,
    date: String,
    last_modified: Option<String>,
    etag: String,
}

impl Response {
    /// Create an empty response dated now, with a fresh entity tag
    pub fn new() -> Self {
        Response {
            body: Bytes::new(),
            content_length: 0,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            date: httpdate::fmt_http_date(SystemTime::now()),
            last_modified: None,
            etag: format!("\"{}\"", Uuid::new_v4()),
        }
    }

    pub fn status_code(&self) -> u16 {
        200
    }

    pub fn status_text(&self) -> &'static str {
        "OK"
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replace the body; `Content-Length` follows it
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
        self.content_length = self.body.len();
    }

    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// `Last-Modified` value; same as [`date`](Self::date) unless overridden
    pub fn last_modified(&self) -> &str {
        self.last_modified.as_deref().unwrap_or(&self.date)
    }

    pub fn set_last_modified(&mut self, time: SystemTime) {
        self.last_modified = Some(httpdate::fmt_http_date(time));
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Headers in the order they are written
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Date", self.date.clone()),
            ("Content-Type", self.content_type.clone()),
            ("Content-Length", self.content_length.to_string()),
            ("Last-Modified", self.last_modified().to_string()),
            ("Server", SERVER.to_string()),
            ("ETag", self.etag.clone()),
            ("Connection", "close".to_string()),
        ]
    }

    /// Convert the response to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());

        // Status line
        buf.extend_from_slice(
            format!("HTTP/1.1 {} {}", self.status_code(), self.status_text()).as_bytes(),
        );
        buf.extend_from_slice(CRLF.as_bytes());

        // Headers
        for (name, value) in self.headers() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF.as_bytes());
        }

        // Empty line
        buf.extend_from_slice(CRLF.as_bytes());

        // Body
        buf.extend_from_slice(&self.body);

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> &'a str {
        headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let res = Response::new();
        let headers = res.headers();

        assert_eq!(res.status_code(), 200);
        assert_eq!(res.status_text(), "OK");
        assert_eq!(header(&headers, "Content-Type"), DEFAULT_CONTENT_TYPE);
        assert_eq!(header(&headers, "Content-Length"), "0");
        assert_eq!(header(&headers, "Server"), "NanoServe");
        assert_eq!(header(&headers, "Connection"), "close");
        assert_eq!(header(&headers, "Last-Modified"), res.date());
        assert!(httpdate::parse_http_date(res.date()).is_ok());
    }

    #[test]
    fn test_header_order() {
        let names: Vec<_> = Response::new().headers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["Date", "Content-Type", "Content-Length", "Last-Modified", "Server", "ETag", "Connection"]
        );
    }

    #[test]
    fn test_to_wire_is_stable() {
        let mut res = Response::new();
        res.set_body("<html></html>");

        let first = res.to_wire();
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(first, res.to_wire());
    }

    #[test]
    fn test_etag_is_unique() {
        let a = Response::new();
        let b = Response::new();

        assert_ne!(a.etag(), b.etag());
        assert!(a.etag().starts_with('"') && a.etag().ends_with('"'));
        assert_eq!(a.etag().len(), 38);
    }

    #[test]
    fn test_set_body_updates_length() {
        let mut res = Response::new();

        res.set_body("héllo");
        assert_eq!(res.content_length(), 6);

        res.set_body(Vec::new());
        assert_eq!(res.content_length(), 0);

        res.set_body(vec![0u8, 159, 146, 150, 255]);
        assert_eq!(res.content_length(), 5);

        let wire = res.to_wire();
        assert!(wire.ends_with(b"\r\n\r\n\x00\x9f\x92\x96\xff"));
        assert!(String::from_utf8_lossy(&wire).contains("Content-Length: 5\r\n"));
    }

    #[test]
    fn test_wire_format() {
        let mut res = Response::new();
        res.set_content_type("text/plain");
        res.set_body("hi");

        let wire = String::from_utf8(res.to_wire()).unwrap();
        let expected = format!(
            "HTTP/1.1 200 OK\r\n\
             Date: {date}\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: 2\r\n\
             Last-Modified: {date}\r\n\
             Server: NanoServe\r\n\
             ETag: {etag}\r\n\
             Connection: close\r\n\
             \r\n\
             hi",
            date = res.date(),
            etag = res.etag(),
        );
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_last_modified_override() {
        let mut res = Response::new();
        res.set_last_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(784111777));

        assert_eq!(res.last_modified(), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_ne!(res.last_modified(), res.date());
    }
}
