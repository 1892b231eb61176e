/// Control-flow outcome of a line
pub mod sentinel;

/// Lines, story graphs and story handles
pub mod story;

/// Service catalog and chain resolution
pub mod service;

/// Subscription registry
pub mod subscription;

/// Application identity, context and shared state
pub mod app_state;

/// Release inputs and loading them from disk
pub mod app_definition;
