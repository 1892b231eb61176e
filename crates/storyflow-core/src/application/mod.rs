/// Collaborator traits and HTTP request types
pub mod runtime_interface;

/// Line graph traversal and the sentinel contract
pub mod interpreter;

/// Container start fan-out and entrypoint execution
pub mod bootstrap;

/// Subscription teardown
pub mod teardown;

/// Application instance
pub mod app;
