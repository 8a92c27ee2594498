//! HTTP message types
//!
//! Request method and request target as they appear on the request line.

use super::{Error, Result};
use std::fmt;
use url::Url;

/// HTTP methods
///
/// Any other uppercase token is carried as [`Method::Extension`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
    Extension(String),
}

impl Method {
    /// Parse a method token, normalizing it to uppercase
    pub fn from_token(token: &str) -> Result<Self> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::Request(format!("invalid method: '{}'", token)));
        }

        let token = token.to_ascii_uppercase();
        Ok(match token.as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "PATCH" => Method::Patch,
            _ => Method::Extension(token),
        })
    }

    /// Convert method to string
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::Extension(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request target split into path and query
///
/// Origin-form (`/path?query`), absolute-form (`http://host/path?query`) and
/// asterisk-form (`*`) targets are accepted. Fragments are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    path: String,
    query: Option<String>,
}

impl RequestTarget {
    /// Parse the target token of a request line
    pub fn parse(target: &str) -> Result<Self> {
        if target.contains("://") {
            let url = Url::parse(target)
                .map_err(|e| Error::Request(format!("invalid request target '{}': {}", target, e)))?;
            return Ok(RequestTarget {
                path: url.path().to_string(),
                query: url.query().map(str::to_string),
            });
        }

        let target = target.split('#').next().unwrap_or_default();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };

        Ok(RequestTarget {
            path: path.to_string(),
            query,
        })
    }

    /// Path component, not percent-decoded
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, without the leading `?`
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{}?{}", self.path, query),
            None => write!(f, "{}", self.path),
        }
    }
}
