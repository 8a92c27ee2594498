//! HTTP headers handling
//!
//! Header names are normalized to lowercase on insertion and a repeated
//! name replaces the earlier value.

use super::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// `Name: value`, name is a letter followed by letters or hyphens
fn header_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z][-A-Za-z]*):\s+(?P<value>.+)$").expect("valid header regex")
    })
}

/// HTTP headers collection
///
/// Headers keep their first insertion position; lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Insert a header, replacing any value already stored under that name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();

        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Get the value for a header (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over all headers as `(lowercase name, value)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parse a header line (terminator already stripped) into name and value
    ///
    /// The value is kept as sent apart from the whitespace after the colon.
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        let caps = header_line_re()
            .captures(line)
            .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;

        Ok((caps["name"].to_string(), caps["value"].to_string()))
    }
}
