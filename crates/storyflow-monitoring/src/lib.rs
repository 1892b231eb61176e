//! Observability setup for the storyflow runtime.
//!
//! Every crate in the workspace logs through `tracing`; this crate installs
//! the subscriber that formats and filters those events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, init_test_logging, LogExt, LogFormat, LoggingConfig};
