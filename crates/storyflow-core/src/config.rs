//! Runtime configuration
//!
//! Values come from defaults overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Runtime configuration of an application instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host of the subscription broker
    #[serde(default = "default_synapse_host")]
    pub synapse_host: String,

    /// Port of the subscription broker
    #[serde(default = "default_synapse_port")]
    pub synapse_port: u16,

    /// Domain appended to the app DNS name to form its hostname
    #[serde(default = "default_app_domain")]
    pub app_domain: String,

    /// Attempt budget for teardown HTTP calls
    #[serde(default = "default_http_max_attempts")]
    pub http_max_attempts: u32,
}

fn default_synapse_host() -> String {
    "synapse".to_string()
}

fn default_synapse_port() -> u16 {
    80
}

fn default_app_domain() -> String {
    "storyflow.app".to_string()
}

fn default_http_max_attempts() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            synapse_host: default_synapse_host(),
            synapse_port: default_synapse_port(),
            app_domain: default_app_domain(),
            http_max_attempts: default_http_max_attempts(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("SYNAPSE_HOST") {
            config.synapse_host = host;
        }

        if let Some(port) = lookup("SYNAPSE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.synapse_port = port,
                Err(_) => warn!("Invalid SYNAPSE_PORT value: {}", port),
            }
        }

        if let Some(domain) = lookup("APP_DOMAIN") {
            config.app_domain = domain;
        }

        if let Some(attempts) = lookup("HTTP_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(attempts) if attempts > 0 => config.http_max_attempts = attempts,
                _ => warn!("Invalid HTTP_MAX_ATTEMPTS value: {}", attempts),
            }
        }

        config
    }

    /// URL of the broker's bulk unsubscribe endpoint
    pub fn synapse_clear_all_url(&self) -> String {
        format!("http://{}:{}/clear_all", self.synapse_host, self.synapse_port)
    }
}
