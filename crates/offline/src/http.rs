use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An outgoing request as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }
}

/// Where a response came from, mirroring the browser's response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin.
    Basic,
    /// Cross-origin with CORS.
    Cors,
    /// Cross-origin without CORS; status and body are hidden.
    Opaque,
    /// Network error.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, kind: ResponseKind, body: Vec<u8>) -> Self {
        Self {
            status,
            kind,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only complete same-origin responses are worth keeping.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_are_normalized() {
        assert_eq!(Request::new("get", "/").method, "GET");
        assert_eq!(Request::get("/a").method, "GET");
    }

    #[test]
    fn cacheable_requires_ok_and_basic() {
        assert!(Response::new(200, ResponseKind::Basic, vec![]).is_cacheable());
        assert!(!Response::new(200, ResponseKind::Cors, vec![]).is_cacheable());
        assert!(!Response::new(206, ResponseKind::Basic, vec![]).is_cacheable());
        assert!(!Response::new(404, ResponseKind::Basic, vec![]).is_cacheable());
    }

    #[test]
    fn headers_are_case_insensitive() {
        let r = Response::new(200, ResponseKind::Basic, vec![]).with_header("Content-Type", "text/html");
        assert_eq!(r.header("content-type"), Some("text/html"));
    }
}
