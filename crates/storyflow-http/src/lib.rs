//!
//! Retrying HTTP client for the storyflow runtime
//!
//! [`RetryingHttpClient`] implements the core [`HttpClient`] contract on top
//! of any single-attempt [`Transport`]; [`ReqwestTransport`] is the
//! production transport.
//!
//! [`HttpClient`]: storyflow_core::HttpClient

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod retry;
pub mod transport;

pub use retry::{RetryPolicy, RetryingHttpClient};
pub use transport::{ReqwestTransport, Transport};

/// The client wired up for production use
pub type ReqwestHttpClient = RetryingHttpClient<ReqwestTransport>;

/// Build a retrying client over a default reqwest transport
pub fn reqwest_client() -> Result<ReqwestHttpClient, storyflow_core::CoreError> {
    Ok(RetryingHttpClient::new(ReqwestTransport::new()?))
}
