//! Single-attempt HTTP transport

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::str::FromStr;
use std::time::Duration;
use storyflow_core::{CoreError, HttpRequest, HttpResponse};

/// Sends one HTTP request, once
///
/// A request that never produced a response fails with
/// [`CoreError::HttpTransportError`]; any other error means the request
/// itself is unusable and retrying it is pointless.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and read the full response
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, CoreError>;
}

/// [`Transport`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with default timeouts
    pub fn new() -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, CoreError> {
        let method = Method::from_str(&request.method).map_err(|_| {
            CoreError::ValidationError(format!("Invalid HTTP method: {}", request.method))
        })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CoreError::HttpTransportError(format!("{}: {}", request, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::HttpTransportError(format!("{}: failed to read body: {}", request, e)))?;

        Ok(HttpResponse { status, body })
    }
}
