//! Service catalog and chain resolution
//!
//! The catalog is the typed form of the release's `services.json`:
//! service -> config -> actions -> command -> events -> event -> http.

use crate::domain::story::{Line, LineMethod, Story};
use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Default port for service HTTP endpoints
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default method for unsubscribe calls
pub const DEFAULT_UNSUBSCRIBE_METHOD: &str = "POST";

/// A service referenced by an `execute` line
///
/// Only the catalog name is carried here. The hostname a started container
/// answers on is recorded on [`StreamingService`](crate::domain::subscription::StreamingService)
/// when a subscription is registered against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Service {
    /// Service name
    pub name: String,
}

/// A command requested on a service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    /// Command name
    pub name: String,
}

/// Resolved `(service, command)` pair of an `execute` line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chain {
    /// The service being invoked
    pub service: Service,
    /// The command invoked on it
    pub command: Command,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service.name, self.command.name)
    }
}

/// One entry of the service catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Parsed service configuration
    #[serde(default)]
    pub config: ServiceConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Commands exposed by the service
    #[serde(default)]
    pub actions: HashMap<String, ActionConfig>,
}

/// Configuration of a single command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Events a streaming command can emit
    #[serde(default)]
    pub events: HashMap<String, EventConfig>,

    /// Dedicated run block; commands with one get their own container
    #[serde(default)]
    pub run: Option<Value>,
}

/// Configuration of one event of a streaming command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// HTTP subscription settings
    #[serde(default)]
    pub http: Option<EventHttpConfig>,
}

/// HTTP settings of an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventHttpConfig {
    /// Port shared by the event's endpoints
    #[serde(default)]
    pub port: Option<u16>,

    /// Endpoint used to subscribe
    #[serde(default)]
    pub subscribe: Option<HttpEndpoint>,

    /// Endpoint used to unsubscribe
    #[serde(default)]
    pub unsubscribe: Option<HttpEndpoint>,
}

/// A single HTTP endpoint on a service container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEndpoint {
    /// HTTP method, case-insensitive
    #[serde(default)]
    pub method: Option<String>,

    /// Port overriding the event-level port
    #[serde(default)]
    pub port: Option<u16>,

    /// Request path, used verbatim
    pub path: String,
}

/// Fully defaulted unsubscribe call for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeTarget {
    /// Upper-cased HTTP method
    pub method: String,
    /// Target port
    pub port: u16,
    /// Request path
    pub path: String,
}

/// The loaded service catalog plus the registry of internal commands
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceCatalog {
    services: HashMap<String, ServiceDefinition>,
    internal: HashMap<String, HashSet<String>>,
}

impl ServiceCatalog {
    /// Create a catalog from parsed service definitions
    pub fn new(services: HashMap<String, ServiceDefinition>) -> Self {
        Self {
            services,
            internal: HashMap::new(),
        }
    }

    /// Parse a catalog from the JSON form of `services.json`
    pub fn from_json(value: Value) -> Result<Self, CoreError> {
        let services: HashMap<String, ServiceDefinition> = serde_json::from_value(value)?;
        Ok(Self::new(services))
    }

    /// Register a command that runs inside the runtime without a container
    pub fn register_internal(&mut self, service: impl Into<String>, command: impl Into<String>) {
        self.internal
            .entry(service.into())
            .or_default()
            .insert(command.into());
    }

    /// Builder form of [`ServiceCatalog::register_internal`]
    pub fn with_internal(mut self, service: &str, command: &str) -> Self {
        self.register_internal(service, command);
        self
    }

    /// Look up a service definition
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    /// Look up a command's configuration
    pub fn action(&self, service: &str, command: &str) -> Option<&ActionConfig> {
        self.services
            .get(service)
            .and_then(|definition| definition.config.actions.get(command))
    }

    /// Whether `service.command` is handled internally and needs no container
    pub fn is_internal(&self, service: &str, command: &str) -> bool {
        self.internal
            .get(service)
            .map_or(false, |commands| commands.contains(command))
    }

    /// Default reusability predicate
    ///
    /// A command without a dedicated `run` block is served by the service's
    /// long-lived container, so any number of call sites share one start.
    pub fn is_reusable(&self, service: &str, command: &str) -> bool {
        self.action(service, command)
            .map_or(false, |action| action.run.is_none())
    }

    /// Resolve the `(service, command)` chain of an `execute` line
    pub fn resolve_chain(&self, story: &Story, line: &Line) -> Result<Chain, CoreError> {
        if line.method != LineMethod::Execute {
            return Err(CoreError::ResolutionError(format!(
                "line {} of {} is a {} line, not execute",
                line.ln,
                story.name(),
                line.method
            )));
        }

        let service = line.service.as_deref().ok_or_else(|| {
            CoreError::ResolutionError(format!(
                "line {} of {} names no service",
                line.ln,
                story.name()
            ))
        })?;
        let command = line.command.as_deref().ok_or_else(|| {
            CoreError::ResolutionError(format!(
                "line {} of {} names no command for {}",
                line.ln,
                story.name(),
                service
            ))
        })?;

        let known = self.is_internal(service, command) || self.action(service, command).is_some();
        if !known {
            let reason = if self.services.contains_key(service) || self.internal.contains_key(service) {
                format!("command {}.{} is not defined", service, command)
            } else {
                format!("service {} is not defined", service)
            };
            return Err(CoreError::ResolutionError(format!(
                "line {} of {}: {}",
                line.ln,
                story.name(),
                reason
            )));
        }

        Ok(Chain {
            service: Service {
                name: service.to_string(),
            },
            command: Command {
                name: command.to_string(),
            },
        })
    }

    /// HTTP settings of an event, if the catalog declares any
    pub fn event_http(&self, service: &str, command: &str, event: &str) -> Option<&EventHttpConfig> {
        self.action(service, command)
            .and_then(|action| action.events.get(event))
            .and_then(|event| event.http.as_ref())
    }

    /// Unsubscribe call for an event, or `None` when no call is required
    pub fn unsubscribe_target(
        &self,
        service: &str,
        command: &str,
        event: &str,
    ) -> Option<UnsubscribeTarget> {
        let http = self.event_http(service, command, event)?;
        let endpoint = http.unsubscribe.as_ref()?;

        Some(UnsubscribeTarget {
            method: endpoint
                .method
                .as_deref()
                .unwrap_or(DEFAULT_UNSUBSCRIBE_METHOD)
                .to_uppercase(),
            port: endpoint.port.or(http.port).unwrap_or(DEFAULT_HTTP_PORT),
            path: endpoint.path.clone(),
        })
    }
}
