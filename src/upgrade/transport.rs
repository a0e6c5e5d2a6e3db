//! Network transport used by the update pipeline.
//!
//! The pipeline only needs two requests: a form POST to the version-check
//! endpoint and a binary GET for the package. [`Transport`] captures exactly
//! that so hosts can substitute their own HTTP stack; [`HttpTransport`] is
//! the reqwest-backed default.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::RequestOptions;

/// Failure of a single request, before any payload interpretation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be built, sent, or its body read.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },
}

impl TransportError {
    /// Whether the server said the resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404 })
    }
}

/// The two requests the update pipeline makes.
pub trait Transport: Send + Sync {
    /// POST `options.data` as a form to `url` and return the response body.
    ///
    /// Any response the server sends counts as success here, whatever its
    /// status; only failing to obtain a response is an error. The caller
    /// decides whether the body is meaningful.
    fn post_form(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// GET `url` and return the raw response bytes.
    ///
    /// Non-success statuses are reported as [`TransportError::Status`].
    fn get_bytes(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the pkgswap user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be initialised
    /// (for example when no TLS backend is available).
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pkgswap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
        })
    }

    fn apply_options(
        &self,
        mut request: reqwest::RequestBuilder,
        options: &RequestOptions,
    ) -> reqwest::RequestBuilder {
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(secs) = options.timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }
        request
    }
}

impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, options: &RequestOptions) -> Result<String, TransportError> {
        let request = self.apply_options(self.client.post(url).form(&options.data), options);

        let response = request.send().await.map_err(|e| TransportError::Request(e.to_string()))?;
        debug!("POST {} -> {}", url, response.status());

        response.text().await.map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn get_bytes(&self, url: &str, options: &RequestOptions) -> Result<Vec<u8>, TransportError> {
        let request = self.apply_options(self.client.get(url), options);

        let response = request.send().await.map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status();
        debug!("GET {} -> {}", url, status);

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
