//! Best-effort subscription teardown
//!
//! Nothing here returns an error. Every failure is logged and counted so that
//! shutdown can carry on through a degraded environment.

use crate::application::runtime_interface::{HttpClient, HttpRequest};
use crate::config::AppConfig;
use crate::domain::app_state::AppState;
use crate::domain::subscription::Subscription;
use crate::CoreError;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

/// Outcome counts of [`unsubscribe_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnsubscribeReport {
    /// Subscriptions an unsubscribe call was made for
    pub attempted: usize,
    /// Calls answered with a 2xx status
    pub succeeded: usize,
    /// Calls answered with another status, never answered, or whose request
    /// could not be built
    pub failed: usize,
    /// Subscriptions whose event declares no unsubscribe endpoint
    pub skipped: usize,
}

/// Outcome of a full teardown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Whether the broker acknowledged the bulk clear
    pub cleared_all: bool,
    /// Per-subscription results
    pub unsubscribe: UnsubscribeReport,
}

/// Ask the subscription broker to drop everything registered for `app_id`
///
/// Returns whether the broker answered with a 2xx status.
pub async fn clear_all_subscriptions(
    http: &dyn HttpClient,
    config: &AppConfig,
    app_id: &str,
) -> bool {
    let url = config.synapse_clear_all_url();
    let request = match HttpRequest::json("POST", &url, &json!({ "app_id": app_id })) {
        Ok(request) => request,
        Err(e) => {
            error!(app_id = %app_id, error = %e, "Failed to build clear-all request");
            return false;
        }
    };

    match http.fetch_with_retry(config.http_max_attempts, request).await {
        Ok(response) if response.is_success() => {
            debug!(app_id = %app_id, status = response.status, "Unsubscribed all with broker");
            true
        }
        Ok(response) => {
            error!(app_id = %app_id, status = response.status, "Failed to unsubscribe all with broker");
            false
        }
        Err(e) => {
            error!(app_id = %app_id, error = %e, "Failed to unsubscribe all with broker");
            false
        }
    }
}

/// Unsubscribe every registered subscription from its service
///
/// Each subscription is handled independently; a failure never stops the
/// remaining ones from being attempted. The registry is left untouched.
pub async fn unsubscribe_all(
    http: &dyn HttpClient,
    config: &AppConfig,
    state: &AppState,
) -> UnsubscribeReport {
    let mut report = UnsubscribeReport::default();

    for subscription in state.subscriptions().snapshot() {
        let request = match unsubscribe_request(state, &subscription) {
            Ok(Some(request)) => request,
            Ok(None) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(
                    subscription_id = %subscription.id,
                    service = %subscription.streaming_service.name,
                    error = %e,
                    "Failed to build unsubscribe request"
                );
                report.attempted += 1;
                report.failed += 1;
                continue;
            }
        };

        report.attempted += 1;
        debug!(subscription_id = %subscription.id, request = %request, "Unsubscribing");

        match http.fetch_with_retry(config.http_max_attempts, request).await {
            Ok(response) if response.is_success() => {
                debug!(subscription_id = %subscription.id, status = response.status, "Unsubscribed");
                report.succeeded += 1;
            }
            Ok(response) => {
                error!(
                    subscription_id = %subscription.id,
                    service = %subscription.streaming_service.name,
                    status = response.status,
                    "Failed to unsubscribe"
                );
                report.failed += 1;
            }
            Err(e) => {
                error!(
                    subscription_id = %subscription.id,
                    service = %subscription.streaming_service.name,
                    error = %e,
                    "Failed to unsubscribe"
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// `Ok(None)` when the event declares no unsubscribe endpoint
fn unsubscribe_request(
    state: &AppState,
    subscription: &Subscription,
) -> Result<Option<HttpRequest>, CoreError> {
    let service = &subscription.streaming_service;
    let Some(target) = state
        .services()
        .unsubscribe_target(&service.name, &service.command, &subscription.event)
    else {
        debug!(
            subscription_id = %subscription.id,
            service = %service.name,
            event = %subscription.event,
            "No unsubscribe call required"
        );
        return Ok(None);
    };

    let url = format!("http://{}:{}{}", service.hostname, target.port, target.path);
    HttpRequest::json(target.method, url, subscription.unsubscribe_body()).map(Some)
}
