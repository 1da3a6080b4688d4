use crate::config::TransferPrefs;
use crate::constants::HTTP_REQUEST_TIMEOUT_SECS;
use crate::err::Result;
use crate::http::{Http, HttpError, HttpResult, Method, Request, Response};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bounds how many requests are in flight at once across the wrapped
/// transport. Per-form jobs all share one of these, so the connection
/// setting caps actual network concurrency, not just pool retention.
pub struct LimitedHttp<T> {
    inner: T,
    permits: Semaphore,
}

impl<T: Http> LimitedHttp<T> {
    pub fn new(inner: T, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_in_flight.max(1)),
        }
    }
}

#[async_trait]
impl<T: Http> Http for LimitedHttp<T> {
    async fn execute(&self, req: Request) -> HttpResult<Response> {
        // The semaphore is owned here and never closed.
        let _permit = self.permits.acquire().await.ok();
        self.inner.execute(req).await
    }
}

/// Production [`Http`] implementation over a shared `reqwest` connection
/// pool, configured once per pipeline invocation.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// Build the production transport: a reqwest pool for connection reuse,
    /// wrapped so that at most `max_http_connections` requests run at once.
    pub fn from_prefs(prefs: &TransferPrefs) -> Result<LimitedHttp<Self>> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(prefs.max_http_connections);
        if let Some(proxy) = &prefs.http_proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        let client = Self {
            client: builder.build()?,
        };
        Ok(LimitedHttp::new(client, prefs.max_http_connections))
    }
}

#[async_trait]
impl Http for ReqwestHttp {
    async fn execute(&self, req: Request) -> HttpResult<Response> {
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Head => reqwest::Method::HEAD,
        };

        let mut builder = self.client.request(method, &req.url);
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        if (200..300).contains(&status) {
            Ok(Response { status, body })
        } else {
            Err(HttpError::Status {
                code: status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}
