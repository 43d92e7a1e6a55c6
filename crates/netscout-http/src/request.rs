//! Request builder and the handler pipeline

use crate::client::{HttpClient, TracingClient};
use crate::error::{BoxError, HttpError, Result};
use crate::response::HttpResponse;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Mutates a request before it is sent.
pub type PreRequestHandler =
    Arc<dyn Fn(&mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Inspects a buffered response.
pub type PostResponseHandler =
    Arc<dyn Fn(&HttpResponse) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Decides what to do with the last post-response failure, if any.
///
/// Returning `Ok` marks the failure as handled.
pub type ErrorHandler =
    Arc<dyn Fn(&HttpResponse, Option<&BoxError>) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Builds and sends one HTTP request through ordered handler stages.
///
/// `send` runs, in order:
/// 1. pre-request handlers (the first failure aborts)
/// 2. the transport (a failure aborts)
/// 3. post-response handlers over the buffered body (failures are logged,
///    the last one is kept, and later handlers still run)
/// 4. error handlers with the kept failure (a failure aborts, success
///    clears it)
///
/// A failure still kept after step 4 is returned as [`HttpError::Process`].
#[derive(Clone)]
pub struct RequestBuilder {
    base: Url,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    pre_request: Vec<(String, PreRequestHandler)>,
    post_response: Vec<(String, PostResponseHandler)>,
    error_handlers: Vec<(String, ErrorHandler)>,
    client: Arc<dyn HttpClient>,
}

impl RequestBuilder {
    /// Creates a GET request to `base` using a default `reqwest` client.
    pub fn new(base: &str) -> Result<Self> {
        let url = Url::parse(base).map_err(|_| HttpError::InvalidUrl(base.to_string()))?;
        Ok(Self::from_url(url))
    }

    pub fn from_url(base: Url) -> Self {
        Self {
            base,
            method: Method::GET,
            path: String::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            pre_request: Vec::new(),
            post_response: Vec::new(),
            error_handlers: Vec::new(),
            client: Arc::new(reqwest::Client::new()),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the path joined onto the base URL.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header, replacing any previous value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::Build(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Build(format!("invalid value for header '{}': {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets several headers at once.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Sets a raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets the content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| HttpError::Build(format!("cannot encode JSON body: {}", e)))?;
        self.body = Some(Bytes::from(body));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Appends a named pre-request handler.
    pub fn pre_request<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.pre_request.push((name.into(), Arc::new(f)));
        self
    }

    /// Appends a named post-response handler.
    pub fn post_response<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&HttpResponse) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.post_response.push((name.into(), Arc::new(f)));
        self
    }

    /// Appends a named error handler.
    pub fn on_error<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&HttpResponse, Option<&BoxError>) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.error_handlers.push((name.into(), Arc::new(f)));
        self
    }

    /// Replaces the transport.
    pub fn client(mut self, client: impl HttpClient + 'static) -> Self {
        self.client = Arc::new(client);
        self
    }

    /// Wraps the current transport in a [`TracingClient`].
    pub fn traced(mut self) -> Self {
        self.client = Arc::new(TracingClient::new(Arc::clone(&self.client)));
        self
    }

    /// Base URL with the path joined and query parameters applied.
    pub fn url(&self) -> Result<Url> {
        let mut url = self.base.clone();

        let path = self.path.trim_start_matches('/');
        if !path.is_empty() {
            let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
            url.set_path(&joined);
        }

        if url.cannot_be_a_base() {
            return Err(HttpError::InvalidUrl(url.to_string()));
        }

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Runs the pipeline and returns the buffered response.
    pub async fn send(&self) -> Result<HttpResponse> {
        let started = Instant::now();

        let mut request = reqwest::Request::new(self.method.clone(), self.url()?);
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(body.clone().into());
        }
        debug!(method = %request.method(), url = %request.url(), "Request built");

        for (name, handler) in &self.pre_request {
            debug!(handler = %name, elapsed_ms = elapsed_ms(started), "Pre-request handler");
            if let Err(e) = handler(&mut request) {
                error!(handler = %name, error = %e, "Pre-request handler failed");
                return Err(HttpError::handler(name.as_str(), e));
            }
        }

        let method = request.method().clone();
        let url = request.url().clone();

        debug!(elapsed_ms = elapsed_ms(started), "Sending request");
        let response = self.client.execute(request).await.map_err(|e| {
            error!(method = %method, url = %url, error = %e, "Cannot send request");
            HttpError::Transport(e)
        })?;
        let response = HttpResponse::read(method, url, response).await?;

        // A later successful handler does not clear an earlier failure;
        // only error handlers can.
        let mut failure: Option<BoxError> = None;
        for (name, handler) in &self.post_response {
            debug!(handler = %name, elapsed_ms = elapsed_ms(started), "Post-response handler");
            if let Err(e) = handler(&response) {
                info!(handler = %name, error = %e, "Cannot handle response");
                failure = Some(e);
            }
        }

        for (name, handler) in &self.error_handlers {
            debug!(handler = %name, elapsed_ms = elapsed_ms(started), "Error handler");
            match handler(&response, failure.as_ref()) {
                Ok(()) => failure = None,
                Err(e) => {
                    error!(handler = %name, error = %e, "Error handler failed");
                    return Err(HttpError::handler(name.as_str(), e));
                }
            }
        }

        match failure {
            Some(e) => Err(HttpError::Process(e)),
            None => {
                debug!(
                    status = response.status().as_u16(),
                    elapsed_ms = elapsed_ms(started),
                    "Request finished"
                );
                Ok(response)
            }
        }
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("base", &self.base.as_str())
            .field("path", &self.path)
            .field("query", &self.query)
            .field("pre_request", &handler_names(&self.pre_request))
            .field("post_response", &handler_names(&self.post_response))
            .field("error_handlers", &handler_names(&self.error_handlers))
            .finish_non_exhaustive()
    }
}

fn handler_names<H>(handlers: &[(String, H)]) -> Vec<&str> {
    handlers.iter().map(|(name, _)| name.as_str()).collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
