use crate::CoreError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Runtime identity of the service instance that owns a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingService {
    /// Service name in the catalog
    pub name: String,
    /// Streaming command the subscription was made on
    pub command: String,
    /// Container name
    pub container_name: String,
    /// Hostname the container answers on
    pub hostname: String,
}

/// An active event subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id, unique per application
    pub id: String,
    /// Service instance the subscription was made with
    pub streaming_service: StreamingService,
    /// Triggering event name
    pub event: String,
    /// Opaque payload; `sub_body` is sent back when unsubscribing
    pub payload: Value,
    /// When the subscription was registered
    pub subscribed_at: DateTime<Utc>,
}

impl Subscription {
    /// Body sent to the service when unsubscribing
    pub fn unsubscribe_body(&self) -> &Value {
        self.payload.get("sub_body").unwrap_or(&Value::Null)
    }
}

/// In-memory table of active subscriptions of one application
///
/// Cloning yields another handle on the same table.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Arc<DashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, replacing any entry with the same id
    pub fn add(
        &self,
        id: impl Into<String>,
        streaming_service: StreamingService,
        event: impl Into<String>,
        payload: Value,
    ) {
        let id = id.into();
        let subscription = Subscription {
            id: id.clone(),
            streaming_service,
            event: event.into(),
            payload,
            subscribed_at: Utc::now(),
        };

        tracing::debug!(
            subscription_id = %id,
            service = %subscription.streaming_service.name,
            event = %subscription.event,
            "Subscription registered"
        );
        self.subscriptions.insert(id, subscription);
    }

    /// Look up a subscription
    pub fn get(&self, id: &str) -> Option<Subscription> {
        self.subscriptions.get(id).map(|entry| entry.clone())
    }

    /// Remove a subscription; removing an unknown id is a caller defect
    pub fn remove(&self, id: &str) -> Result<Subscription, CoreError> {
        self.subscriptions
            .remove(id)
            .map(|(_, subscription)| subscription)
            .ok_or_else(|| CoreError::SubscriptionNotFound(id.to_string()))
    }

    /// Copy of every registered subscription, in no particular order
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn streaming_service() -> StreamingService {
        StreamingService {
            name: "http".to_string(),
            command: "server".to_string(),
            container_name: "http-1".to_string(),
            hostname: "http-1.local".to_string(),
        }
    }

    #[test]
    fn test_add_then_get() {
        let registry = SubscriptionRegistry::new();
        registry.add("sub-1", streaming_service(), "listen", json!({"sub_body": {"id": 1}}));

        let sub = registry.get("sub-1").unwrap();
        assert_eq!(sub.id, "sub-1");
        assert_eq!(sub.event, "listen");
        assert_eq!(sub.unsubscribe_body(), &json!({"id": 1}));
    }

    #[test]
    fn test_get_missing_is_absent() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.get("never-added").is_none());
    }

    #[test]
    fn test_remove_then_get_is_absent() {
        let registry = SubscriptionRegistry::new();
        registry.add("sub-1", streaming_service(), "listen", json!({}));

        let removed = registry.remove("sub-1").unwrap();
        assert_eq!(removed.id, "sub-1");
        assert!(registry.get("sub-1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_missing_fails() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.remove("ghost").unwrap_err(),
            CoreError::SubscriptionNotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_duplicate_id_last_write_wins() {
        let registry = SubscriptionRegistry::new();
        registry.add("sub-1", streaming_service(), "listen", json!({"v": 1}));
        registry.add("sub-1", streaming_service(), "stream", json!({"v": 2}));

        assert_eq!(registry.len(), 1);
        let sub = registry.get("sub-1").unwrap();
        assert_eq!(sub.event, "stream");
        assert_eq!(sub.payload, json!({"v": 2}));
    }

    #[test]
    fn test_clones_share_the_table() {
        let registry = SubscriptionRegistry::new();
        let handle = registry.clone();
        handle.add("sub-1", streaming_service(), "listen", json!({}));

        assert_eq!(registry.snapshot().len(), 1);
        registry.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_missing_sub_body_is_null() {
        let registry = SubscriptionRegistry::new();
        registry.add("sub-1", streaming_service(), "listen", json!({"other": true}));
        assert_eq!(registry.get("sub-1").unwrap().unsubscribe_body(), &Value::Null);
    }
}
