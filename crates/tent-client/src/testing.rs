//! A scripted transport for exercising discovery and requests offline.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::transport::{Method, Request, Response, Transport};

/// A canned response.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: u16,
    url: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    stall: bool,
}

pub(crate) fn reply(status: u16) -> Reply {
    Reply { status, url: None, headers: Vec::new(), body: Vec::new(), stall: false }
}

impl Reply {
    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    pub(crate) fn json(self, content_type: &str, body: &str) -> Self {
        self.header("Content-Type", content_type).body(body.as_bytes())
    }

    /// Report `url` as the effective URL, as if redirected there.
    pub(crate) fn redirected_to(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Headers arrive, the body never does.
    pub(crate) fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub(crate) fn into_response(self, method: Method, url: &str) -> Response {
        let body: Box<dyn Read + Send> =
            if self.stall { Box::new(StalledBody) } else { Box::new(Cursor::new(self.body)) };
        Response {
            status: self.status,
            method,
            url: self.url.unwrap_or_else(|| url.to_string()),
            headers: self.headers,
            body,
        }
    }
}

/// A body whose every read hits the deadline.
pub(crate) struct StalledBody;

impl Read for StalledBody {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "timed out reading response"))
    }
}

/// Answers requests from a fixed route table and records every request.
/// Unknown routes fail like a refused connection.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: HashMap<(Method, String), std::result::Result<Reply, String>>,
    log: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, method: Method, url: &str, reply: Reply) -> Self {
        self.routes.insert((method, url.to_string()), Ok(reply));
        self
    }

    pub(crate) fn fail(mut self, method: Method, url: &str, message: &str) -> Self {
        self.routes.insert((method, url.to_string()), Err(message.to_string()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| format!("{} {}", r.method, r.url)).collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> Result<Response> {
        self.log.lock().unwrap().push(request.clone());
        match self.routes.get(&(request.method, request.url.clone())) {
            Some(Ok(reply)) => Ok(reply.clone().into_response(request.method, &request.url)),
            Some(Err(message)) => Err(Error::Transport {
                method: request.method,
                url: request.url,
                message: message.clone(),
            }),
            None => Err(Error::Transport {
                method: request.method,
                url: request.url,
                message: "connection refused".into(),
            }),
        }
    }
}
