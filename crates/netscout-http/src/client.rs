//! Pluggable HTTP transports

use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field, info_span, warn, Instrument};

/// Executes one prepared request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends `request` and returns the response head with an unread body.
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> std::result::Result<reqwest::Response, BoxError>;
}

#[async_trait]
impl HttpClient for reqwest::Client {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> std::result::Result<reqwest::Response, BoxError> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> std::result::Result<reqwest::Response, BoxError> {
        (**self).execute(request).await
    }
}

/// Records a span and the elapsed time of every request sent through the
/// wrapped transport.
#[derive(Debug, Clone)]
pub struct TracingClient<C> {
    inner: C,
}

impl<C> TracingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for TracingClient<C> {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> std::result::Result<reqwest::Response, BoxError> {
        let span = info_span!(
            "http.request",
            http.method = %request.method(),
            http.url = %request.url(),
            http.status_code = field::Empty,
        );
        let started = Instant::now();

        let result = self.inner.execute(request).instrument(span.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        span.in_scope(|| match &result {
            Ok(response) => {
                span.record("http.status_code", response.status().as_u16());
                debug!(elapsed_ms, "HTTP request completed");
            }
            Err(e) => warn!(elapsed_ms, error = %e, "HTTP request failed"),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Teapot {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for Teapot {
        async fn execute(
            &self,
            _request: reqwest::Request,
        ) -> std::result::Result<reqwest::Response, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = http::Response::builder().status(418).body(String::new())?;
            Ok(response.into())
        }
    }

    fn get(url: &str) -> reqwest::Request {
        reqwest::Request::new(reqwest::Method::GET, url.parse().unwrap())
    }

    #[tokio::test]
    async fn test_tracing_client_delegates() {
        let client = TracingClient::new(Teapot {
            calls: AtomicUsize::new(0),
        });

        let response = client.execute(get("http://device.local/desc.xml")).await.unwrap();

        assert_eq!(response.status().as_u16(), 418);
        assert_eq!(client.into_inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_arc_client_delegates() {
        let client: Arc<dyn HttpClient> = Arc::new(Teapot {
            calls: AtomicUsize::new(0),
        });

        let response = client.execute(get("http://device.local/")).await.unwrap();
        assert_eq!(response.status().as_u16(), 418);
    }
}
