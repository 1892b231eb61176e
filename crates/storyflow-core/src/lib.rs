//!
//! Storyflow Core - story orchestration engine
//!
//! This crate brings an application's stories to life: it starts the
//! containers behind every service the stories call, runs the entrypoint
//! stories, tracks event subscriptions and tears them down again. Line
//! interpretation, container scheduling and HTTP transport are supplied by
//! the embedding runtime through the traits in
//! [`application::runtime_interface`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - stories, services, subscriptions and application state
pub mod domain;

/// Application layer - bootstrap, interpreter glue and teardown
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

/// Runtime configuration
pub mod config;

/// In-memory collaborators for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export key types
pub use config::AppConfig;
pub use error::CoreError;
pub use types::CaseInsensitiveMap;

// Application interfaces
pub use application::app::App;
pub use application::runtime_interface::{
    AppRuntime, ContainerRuntime, HttpClient, HttpRequest, HttpResponse, LineDispatcher,
};
pub use application::teardown::{TeardownReport, UnsubscribeReport};

// Re-export main API types for easy use
pub use domain::app_definition::{AppDefinition, StoriesDocument};
pub use domain::app_state::{AppContext, AppState};
pub use domain::sentinel::LineOutcome;
pub use domain::service::{Chain, Command, Service, ServiceCatalog, UnsubscribeTarget};
pub use domain::story::{Line, LineMethod, Story, StoryDefinition};
pub use domain::subscription::{StreamingService, Subscription, SubscriptionRegistry};
