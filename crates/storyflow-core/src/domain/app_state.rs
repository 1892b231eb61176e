use crate::domain::service::ServiceCatalog;
use crate::domain::subscription::SubscriptionRegistry;
use crate::types::CaseInsensitiveMap;
use serde::Serialize;
use serde_json::Value;

/// Read-only context exposed to stories, computed once per application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppContext {
    /// Environment entries whose value is not a nested object
    pub secrets: CaseInsensitiveMap<Value>,
    /// Public hostname of the application
    pub hostname: String,
    /// Release version
    pub version: u64,
}

impl AppContext {
    /// Derive the context from the application environment
    pub fn derive(
        environment: &CaseInsensitiveMap<Value>,
        app_dns: &str,
        app_domain: &str,
        version: u64,
    ) -> Self {
        let secrets = environment
            .iter()
            .filter(|(_, value)| !value.is_object())
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        Self {
            secrets,
            hostname: format!("{}.{}", app_dns, app_domain),
            version,
        }
    }
}

/// Identity and shared state of a running application
///
/// Shared by every [`Story`](crate::domain::story::Story) handle of the
/// application; the subscription registry is the only mutable part.
#[derive(Debug)]
pub struct AppState {
    /// Stable application id
    pub app_id: String,
    /// DNS-safe application name
    pub app_dns: String,
    /// Release version
    pub version: u64,
    /// Owner id
    pub owner_uuid: String,
    /// Case-insensitive environment
    pub environment: CaseInsensitiveMap<Value>,
    /// Derived read-only context
    pub context: AppContext,
    services: ServiceCatalog,
    subscriptions: SubscriptionRegistry,
}

impl AppState {
    /// Build the state, deriving the context from the environment
    pub fn new(
        app_id: impl Into<String>,
        app_dns: impl Into<String>,
        version: u64,
        owner_uuid: impl Into<String>,
        environment: CaseInsensitiveMap<Value>,
        services: ServiceCatalog,
        app_domain: &str,
    ) -> Self {
        let app_dns = app_dns.into();
        let context = AppContext::derive(&environment, &app_dns, app_domain, version);

        Self {
            app_id: app_id.into(),
            app_dns,
            version,
            owner_uuid: owner_uuid.into(),
            environment,
            context,
            services,
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    /// The service catalog
    pub fn services(&self) -> &ServiceCatalog {
        &self.services
    }

    /// The subscription registry
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }
}
