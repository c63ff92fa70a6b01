//! The HTTP seam: requests go out through a [`Transport`], responses come
//! back with a streaming body.
//!
//! [`HttpTransport`] is the blocking `ureq` implementation. Non-2xx
//! statuses are ordinary responses; only failures to get a response at all
//! are errors.

use std::io::{self, Read};

use serde::de::DeserializeOwned;
use tent_core::post::{MEDIA_TYPE_ERROR, media_type};

use crate::config::ClientConfig;
use crate::error::{Error, Result, TentError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: Vec::new(), body: None }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct Response {
    pub status: u16,
    /// Method of the request that produced this response.
    pub method: Method,
    /// Effective URL, after any redirects.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in the order received.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Read the whole body. A read that runs past the deadline is a
    /// `ReadTimeout`.
    pub fn read_body(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self.body.read_to_end(&mut buf) {
            Ok(_) => Ok(buf),
            Err(err) => Err(self.read_error(err)),
        }
    }

    /// Like [`read_body`](Self::read_body), but a body cut short keeps what
    /// arrived before the cut.
    pub fn read_body_lenient(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self.body.read_to_end(&mut buf) {
            Ok(_) => Ok(buf),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::debug!(url = %self.url, read = buf.len(), "Response body ended early");
                Ok(buf)
            }
            Err(err) => Err(self.read_error(err)),
        }
    }

    pub fn read_json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.read_body()?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn read_error(&self, err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                Error::ReadTimeout { method: self.method, url: self.url.clone() }
            }
            _ => Error::Transport {
                method: self.method,
                url: self.url.clone(),
                message: err.to_string(),
            },
        }
    }

    /// Turn an unexpected status into an error, decoding a Tent error body
    /// when the server sent one.
    pub fn into_bad_status(self) -> Error {
        let status = self.status;
        let method = self.method;
        let url = self.url.clone();
        let is_tent_error = self
            .header("content-type")
            .is_some_and(|ct| media_type(ct) == MEDIA_TYPE_ERROR);
        let tent_error = if is_tent_error {
            self.read_json::<TentError>().ok()
        } else {
            None
        };
        Error::BadStatus { status, method, url, tent_error }
    }
}

/// Sends one request and returns the server's response, whatever its status.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> Result<Response>;
}

/// Blocking HTTP over a shared `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .redirects(config.max_redirects)
            .user_agent(&config.user_agent)
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> Result<Response> {
        let Request { method, url, headers, body } = request;
        tracing::debug!(%method, %url, "Sending request");

        let mut req = self.agent.request(method.as_str(), &url);
        for (name, value) in &headers {
            req = req.set(name, value);
        }
        let result = match &body {
            Some(body) => req.send_bytes(body),
            None => req.call(),
        };
        let res = match result {
            Ok(res) | Err(ureq::Error::Status(_, res)) => res,
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::Transport { method, url, message: err.to_string() });
            }
        };

        // Names repeat once per occurrence; `all` already returns every value.
        let mut names: Vec<String> = Vec::new();
        for name in res.headers_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let headers = names
            .into_iter()
            .flat_map(|name| {
                res.all(&name)
                    .into_iter()
                    .map(|value| (name.clone(), value.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(Response {
            status: res.status(),
            method,
            url: res.get_url().to_string(),
            headers,
            body: Box::new(res.into_reader()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StalledBody, reply};

    #[test]
    fn header_lookup_is_case_insensitive() {
        let res = reply(200)
            .header("Link", "<a>; rel=x")
            .header("link", "<b>; rel=y")
            .into_response(Method::Head, "https://a.example/");
        assert_eq!(res.header("LINK"), Some("<a>; rel=x"));
        assert_eq!(res.header_all("Link").collect::<Vec<_>>(), vec!["<a>; rel=x", "<b>; rel=y"]);
        assert_eq!(res.header("etag"), None);
    }

    #[test]
    fn header_value_outlives_the_name_it_was_looked_up_by() {
        let res = reply(200).header("ETag", "\"v1\"").into_response(Method::Get, "https://a.example/");
        let etag = {
            let name = String::from("etag");
            res.header(&name)
        };
        assert_eq!(etag, Some("\"v1\""));
    }

    #[test]
    fn stalled_body_is_a_read_timeout() {
        let mut res = reply(200).into_response(Method::Get, "https://a.example/posts/1");
        res.body = Box::new(StalledBody);
        let err = res.read_json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::ReadTimeout { method: Method::Get, .. }));
    }

    #[test]
    fn truncated_body_is_kept_when_lenient() {
        let mut res = reply(200).into_response(Method::Get, "https://a.example/");
        res.body = Box::new((&b"<link"[..]).chain(TruncatedBody));
        assert_eq!(res.read_body_lenient().unwrap(), b"<link");

        let mut res = reply(200).into_response(Method::Get, "https://a.example/");
        res.body = Box::new((&b"<link"[..]).chain(TruncatedBody));
        assert!(matches!(res.read_body(), Err(Error::Transport { .. })));
    }

    struct TruncatedBody;

    impl Read for TruncatedBody {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-body"))
        }
    }

    #[test]
    fn bad_status_decodes_tent_errors() {
        let res = reply(403)
            .header("Content-Type", "application/vnd.tent.error.v0+json")
            .body(br#"{"error":"Unauthorized"}"#)
            .into_response(Method::Post, "https://a.example/posts");
        match res.into_bad_status() {
            Error::BadStatus { status, tent_error, .. } => {
                assert_eq!(status, 403);
                assert_eq!(tent_error.unwrap().error, "Unauthorized");
            }
            other => panic!("unexpected {other:?}"),
        }

        let res = reply(500).body(b"oops").into_response(Method::Get, "https://a.example/");
        assert!(matches!(res.into_bad_status(), Error::BadStatus { tent_error: None, .. }));
    }

    #[test]
    fn request_builder() {
        let req = Request::new(Method::Post, "https://a.example/posts")
            .header("Content-Type", "application/json")
            .body(b"{}".to_vec());
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
    }
}
