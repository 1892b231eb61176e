//! Release inputs of an application and loading them from disk

use crate::domain::service::{ServiceCatalog, ServiceDefinition};
use crate::domain::story::StoryDefinition;
use crate::types::CaseInsensitiveMap;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Stories file relative to a release directory
pub const STORIES_FILE: &str = "config/stories.json";
/// Services file relative to a release directory
pub const SERVICES_FILE: &str = "config/services.json";
/// Environment file relative to a release directory
pub const ENVIRONMENT_FILE: &str = "config/environment.json";

/// Parsed form of `stories.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoriesDocument {
    /// Every story keyed by name
    #[serde(default)]
    pub stories: HashMap<String, StoryDefinition>,

    /// Stories run at bootstrap, in order
    #[serde(default)]
    pub entrypoint: Vec<String>,
}

/// Everything needed to construct an application
#[derive(Debug, Clone)]
pub struct AppDefinition {
    /// Stable application id
    pub app_id: String,
    /// DNS-safe application name
    pub app_dns: String,
    /// Release version
    pub version: u64,
    /// Owner id
    pub owner_uuid: String,
    /// Stories and entrypoints
    pub stories: StoriesDocument,
    /// Service catalog
    pub services: ServiceCatalog,
    /// Environment, keys case-insensitive
    pub environment: CaseInsensitiveMap<Value>,
}

impl AppDefinition {
    /// Create a definition with empty stories, services and environment
    pub fn new(
        app_id: impl Into<String>,
        app_dns: impl Into<String>,
        version: u64,
        owner_uuid: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_dns: app_dns.into(),
            version,
            owner_uuid: owner_uuid.into(),
            stories: StoriesDocument::default(),
            services: ServiceCatalog::default(),
            environment: CaseInsensitiveMap::new(),
        }
    }

    /// Load stories, services and environment from a release directory
    ///
    /// `config/stories.json` and `config/services.json` are required;
    /// a missing `config/environment.json` means an empty environment.
    pub fn load_dir(
        dir: impl AsRef<Path>,
        app_id: impl Into<String>,
        app_dns: impl Into<String>,
        version: u64,
        owner_uuid: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let dir = dir.as_ref();
        let mut definition = Self::new(app_id, app_dns, version, owner_uuid);

        definition.stories = read_json(&dir.join(STORIES_FILE))?;

        let services: HashMap<String, ServiceDefinition> = read_json(&dir.join(SERVICES_FILE))?;
        definition.services = ServiceCatalog::new(services);

        let environment_path = dir.join(ENVIRONMENT_FILE);
        if environment_path.exists() {
            definition.environment = read_json(&environment_path)?;
        }

        tracing::debug!(
            app_id = %definition.app_id,
            dir = %dir.display(),
            stories = definition.stories.stories.len(),
            "Loaded application definition"
        );

        Ok(definition)
    }

    /// Validate entrypoints and every story's line graph
    pub fn validate(&self) -> Result<(), CoreError> {
        for name in &self.stories.entrypoint {
            if !self.stories.stories.contains_key(name) {
                return Err(CoreError::ValidationError(format!(
                    "entrypoint {} is not a known story",
                    name
                )));
            }
        }

        for (name, story) in &self.stories.stories {
            story.validate(name)?;
        }

        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CoreError::IOError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| CoreError::SerializationError(format!("{}: {}", path.display(), e)))
}
