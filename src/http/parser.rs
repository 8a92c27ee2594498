//! HTTP response parsing
//!
//! Client-side counterpart of [`Request`](super::Request): an incremental
//! parser for the responses a responder writes back.

use super::{Error, Headers, Result};

/// Find the next CRLF in a buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON
/// Example: HTTP/1.1 200 OK
pub fn parse_status_line(line: &str) -> Result<(String, u16, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        return Err(Error::Parse(format!("Invalid status line: '{}'", line)));
    }

    let status = parts[1]
        .parse::<u16>()
        .ok()
        .filter(|code| (100..600).contains(code))
        .ok_or_else(|| Error::InvalidStatus(parts[1].to_string()))?;
    let reason = parts.get(2).copied().unwrap_or_default().to_string();

    Ok((parts[0].to_string(), status, reason))
}

/// Response as received by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedResponse {
    version: String,
    status: u16,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
}

impl ReceivedResponse {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    StatusLine,
    Headers,
    Body,
    Complete,
}

/// HTTP response parser
pub struct ResponseParser {
    state: ParserState,
    buffer: Vec<u8>,
    version: String,
    status: u16,
    reason: String,
    headers: Headers,
    content_length: Option<usize>,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::StatusLine,
            buffer: Vec::new(),
            version: String::new(),
            status: 0,
            reason: String::new(),
            headers: Headers::new(),
            content_length: None,
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(response)) when a response with a `Content-Length` is
    /// complete, Ok(None) if more data is needed (or the body runs until end
    /// of stream, see [`finish`](Self::finish)), or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<ReceivedResponse>> {
        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                ParserState::StatusLine | ParserState::Headers => {
                    let Some(crlf_pos) = find_crlf(&self.buffer) else {
                        return Ok(None);
                    };
                    let line = String::from_utf8_lossy(&self.buffer[..crlf_pos]).to_string();
                    self.buffer.drain(..crlf_pos + 2);
                    self.parse_line(&line)?;
                }
                ParserState::Body => {
                    return match self.content_length {
                        Some(len) if self.buffer.len() >= len => {
                            self.buffer.truncate(len);
                            Ok(Some(self.complete()))
                        }
                        _ => Ok(None),
                    };
                }
                ParserState::Complete => return Ok(None),
            }
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        if self.state == ParserState::StatusLine {
            let (version, status, reason) = parse_status_line(line)?;
            self.version = version;
            self.status = status;
            self.reason = reason;
            self.state = ParserState::Headers;
            return Ok(());
        }

        if line.is_empty() {
            self.content_length = match self.headers.get("Content-Length") {
                Some(value) => Some(
                    value
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| Error::InvalidContentLength(value.to_string()))?,
                ),
                None => None,
            };
            self.state = ParserState::Body;
            return Ok(());
        }

        let (name, value) = Headers::parse_header_line(line)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Signal end of stream
    ///
    /// A response without `Content-Length` ends here; anything else that is
    /// not complete yet is [`Error::Incomplete`].
    pub fn finish(&mut self) -> Result<ReceivedResponse> {
        match (self.state, self.content_length) {
            (ParserState::Body, None) => Ok(self.complete()),
            _ => Err(Error::Incomplete),
        }
    }

    fn complete(&mut self) -> ReceivedResponse {
        self.state = ParserState::Complete;
        ReceivedResponse {
            version: std::mem::take(&mut self.version),
            status: self.status,
            reason: std::mem::take(&mut self.reason),
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.buffer),
        }
    }

    /// Reset the parser for reuse
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
