//! REST verb helpers over a shared base request

use crate::client::HttpClient;
use crate::error::Result;
use crate::request::RequestBuilder;
use reqwest::Method;

/// A base URL plus request defaults shared by every call.
///
/// Headers, handlers and the transport configured on the defaults apply to
/// each request created from it.
#[derive(Debug, Clone)]
pub struct Rest {
    defaults: RequestBuilder,
}

impl Rest {
    pub fn new(base: &str) -> Result<Self> {
        Ok(Self::from_builder(RequestBuilder::new(base)?))
    }

    pub fn from_builder(defaults: RequestBuilder) -> Self {
        Self { defaults }
    }

    /// Replaces the transport used by every request.
    pub fn with_client(self, client: impl HttpClient + 'static) -> Self {
        Self {
            defaults: self.defaults.client(client),
        }
    }

    /// Shared request defaults
    pub fn defaults(&self) -> &RequestBuilder {
        &self.defaults
    }

    /// Starts a request with `method` to `path` under the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.defaults.clone().method(method).path(path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    pub fn head(&self, path: &str) -> RequestBuilder {
        self.request(Method::HEAD, path)
    }

    pub fn options(&self, path: &str) -> RequestBuilder {
        self.request(Method::OPTIONS, path)
    }
}
