//! HTTP request pipeline for talking to discovered devices
//!
//! Discovery yields locations (an SSDP `LOCATION` URL, an mDNS host and
//! port); this crate is the small client used to follow them up:
//! - [`RequestBuilder`] assembles a request over a base URL and runs it
//!   through ordered pre-request, post-response and error handlers
//! - [`HttpClient`] is the pluggable transport (`reqwest::Client` by default)
//! - [`TracingClient`] wraps any transport with a span per request
//! - [`Rest`] shares defaults across verb helpers
//!
//! # Example
//!
//! ```no_run
//! use netscout_http::Rest;
//!
//! # async fn run() -> netscout_http::Result<()> {
//! let hub = Rest::new("http://192.168.1.30:1400")?;
//! let response = hub
//!     .get("/xml/device_description.xml")
//!     .traced()
//!     .send()
//!     .await?
//!     .error_for_status()?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod rest;

pub use client::{HttpClient, TracingClient};
pub use error::{BoxError, HttpError, Result};
pub use request::{ErrorHandler, PostResponseHandler, PreRequestHandler, RequestBuilder};
pub use response::HttpResponse;
pub use rest::Rest;
