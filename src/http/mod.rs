use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Display, Formatter};

mod client;
pub use client::{LimitedHttp, ReqwestHttp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Head,
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
        };
        write!(f, "{}", s)
    }
}

/// A described HTTP request: method, URL, headers and optional byte body.
/// Describing a request performs no I/O; only `Http::execute` does.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(self, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut req = self.with_header("Content-Type", content_type);
        req.body = Some(body.into());
        req
    }

    pub fn with_json<T: Serialize>(self, value: &T) -> crate::err::Result<Self> {
        let encoded = serde_json::to_vec(value)?;
        Ok(self.with_body("application/json", encoded))
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> crate::err::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure executing a request. `Network` is transport-level (DNS, connect,
/// timeout); `Status` means the server answered with a non-success code.
#[derive(Debug)]
pub enum HttpError {
    Network(String),
    Status { code: u16, body: String },
}

impl HttpError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpError::Network(_) => None,
            HttpError::Status { code, .. } => Some(*code),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Network(msg) => write!(f, "network error: {}", msg),
            HttpError::Status { code, .. } => write!(f, "server answered {}", code),
        }
    }
}

impl std::error::Error for HttpError {}

pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// The single transport contract the core consumes. Production code uses
/// [`ReqwestHttp`]; tests substitute an in-memory double.
#[async_trait]
pub trait Http: Send + Sync {
    /// Execute a described request. A non-success status code is an
    /// `Err(HttpError::Status)`.
    async fn execute(&self, req: Request) -> HttpResult<Response>;

    /// Existence-probe variant: a 404 becomes `Ok(None)` instead of an error.
    async fn execute_opt(&self, req: Request) -> HttpResult<Option<Response>> {
        match self.execute(req).await {
            Ok(resp) => Ok(Some(resp)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
