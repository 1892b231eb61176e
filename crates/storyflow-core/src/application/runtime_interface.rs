//! Collaborator contracts consumed by the engine
//!
//! The line interpreter, the container scheduler and the HTTP transport live
//! outside this crate. The engine only sees them through these traits.

use crate::domain::sentinel::LineOutcome;
use crate::domain::story::{Line, Story};
use crate::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Content type of every JSON body the engine sends
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Executes a single line of a story
///
/// Implementations handle every line method. Block-owning methods call back
/// into [`crate::application::interpreter`] to run their children and must
/// honour the [`LineOutcome`] contract: `Break` stops the owning loop only,
/// `Return` unwinds to the story boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineDispatcher: Send + Sync {
    /// Execute `line` of `story`
    async fn dispatch(&self, story: &Story, line: &Line) -> Result<LineOutcome, CoreError>;
}

/// Provisions the containers backing services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether the container started for this line can be shared by every
    /// other call site of the same service
    fn is_service_reusable(&self, story: &Story, line: &Line) -> bool {
        match (line.service.as_deref(), line.command.as_deref()) {
            (Some(service), Some(command)) => story.app().services().is_reusable(service, command),
            _ => false,
        }
    }

    /// Start the container backing the service invoked by `line`
    async fn start_container(&self, story: &Story, line: &Line) -> Result<(), CoreError>;
}

/// An outgoing HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Upper-case HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<String>,
}

impl HttpRequest {
    /// Build a request carrying a JSON body
    ///
    /// Fails when `method` is not a valid HTTP token or the body cannot be
    /// encoded.
    pub fn json(
        method: impl Into<String>,
        url: impl Into<String>,
        body: &serde_json::Value,
    ) -> Result<Self, CoreError> {
        let method = method.into();
        let is_token = !method.is_empty()
            && method
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c));
        if !is_token {
            return Err(CoreError::ValidationError(format!("Invalid HTTP method: {:?}", method)));
        }

        Ok(Self {
            method: method.to_uppercase(),
            url: url.into(),
            headers: vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())],
            body: Some(serde_json::to_string(body)?),
        })
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A received HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }
}

/// HTTP client that retries transport failures
///
/// Only transport failures are retried. Any response, whatever its status,
/// is returned to the caller, who decides what a non-2xx status means.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request`, making at most `max_attempts` attempts
    async fn fetch_with_retry(
        &self,
        max_attempts: u32,
        request: HttpRequest,
    ) -> Result<HttpResponse, CoreError>;
}

/// The collaborators an application runs with
#[derive(Clone)]
pub struct AppRuntime {
    /// Line interpreter
    pub dispatcher: Arc<dyn LineDispatcher>,
    /// Container scheduler
    pub containers: Arc<dyn ContainerRuntime>,
    /// Retrying HTTP client
    pub http: Arc<dyn HttpClient>,
}

impl AppRuntime {
    /// Bundle the collaborators
    pub fn new(
        dispatcher: Arc<dyn LineDispatcher>,
        containers: Arc<dyn ContainerRuntime>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            dispatcher,
            containers,
            http,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_request() {
        let request = HttpRequest::json("post", "http://synapse:80/clear_all", &json!({"app_id": "a"}))
            .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.body.as_deref(), Some(r#"{"app_id":"a"}"#));
        assert_eq!(
            request.headers,
            vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())]
        );
        assert_eq!(request.to_string(), "POST http://synapse:80/clear_all");
    }

    #[test]
    fn test_json_request_rejects_invalid_method() {
        for method in ["", "de lete", "GET\r\n"] {
            let err = HttpRequest::json(method, "http://h:80/", &json!(null)).unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)), "{:?}", method);
        }
    }

    #[test]
    fn test_response_success_is_2xx() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(199, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }
}
