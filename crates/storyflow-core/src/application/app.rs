//! A running application instance

use crate::application::bootstrap;
use crate::application::runtime_interface::AppRuntime;
use crate::application::teardown::{self, TeardownReport, UnsubscribeReport};
use crate::config::AppConfig;
use crate::domain::app_definition::AppDefinition;
use crate::domain::app_state::AppState;
use crate::domain::story::{Story, StoryDefinition};
use crate::domain::subscription::{StreamingService, Subscription};
use crate::CoreError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// One deployed release of an application
///
/// Owns the story graphs, the shared [`AppState`] and the collaborators the
/// engine runs with. Bootstrap and teardown of the same instance must be
/// sequenced by the caller.
pub struct App {
    state: Arc<AppState>,
    stories: BTreeMap<String, Arc<StoryDefinition>>,
    entrypoints: Vec<String>,
    config: AppConfig,
    runtime: AppRuntime,
}

impl App {
    /// Build an application from a validated definition
    pub fn new(
        definition: AppDefinition,
        config: AppConfig,
        runtime: AppRuntime,
    ) -> Result<Self, CoreError> {
        definition.validate()?;

        let state = AppState::new(
            definition.app_id,
            definition.app_dns,
            definition.version,
            definition.owner_uuid,
            definition.environment,
            definition.services,
            &config.app_domain,
        );

        let stories = definition
            .stories
            .stories
            .into_iter()
            .map(|(name, story)| (name, Arc::new(story)))
            .collect();

        Ok(Self {
            state: Arc::new(state),
            stories,
            entrypoints: definition.stories.entrypoint,
            config,
            runtime,
        })
    }

    /// Application id
    pub fn app_id(&self) -> &str {
        &self.state.app_id
    }

    /// Shared application state
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Runtime configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entrypoint story names, in run order
    pub fn entrypoints(&self) -> &[String] {
        &self.entrypoints
    }

    /// Names of every story, sorted
    pub fn story_names(&self) -> impl Iterator<Item = &str> {
        self.stories.keys().map(String::as_str)
    }

    /// A fresh handle on story `name`, with an empty scope
    pub fn story(&self, name: &str) -> Result<Story, CoreError> {
        let definition = self
            .stories
            .get(name)
            .ok_or_else(|| CoreError::StoryNotFound(name.to_string()))?;
        Ok(Story::new(name, definition.clone(), self.state.clone()))
    }

    /// Start services, then run the entrypoint stories
    pub async fn bootstrap(&self) -> Result<(), CoreError> {
        info!(app_id = %self.app_id(), version = self.state.version, "Bootstrapping app");
        self.start_services().await?;
        self.run_stories().await
    }

    /// Start the containers for every service referenced by any story
    pub async fn start_services(&self) -> Result<(), CoreError> {
        let stories = self
            .stories
            .keys()
            .map(|name| self.story(name))
            .collect::<Result<Vec<_>, _>>()?;

        bootstrap::start_services(self.runtime.containers.as_ref(), &stories).await
    }

    /// Run the entrypoint stories in declaration order
    pub async fn run_stories(&self) -> Result<(), CoreError> {
        let stories = self
            .entrypoints
            .iter()
            .map(|name| self.story(name))
            .collect::<Result<Vec<_>, _>>()?;

        bootstrap::run_stories(self.runtime.dispatcher.as_ref(), &stories).await
    }

    /// Register a subscription, replacing any with the same id
    pub fn add_subscription(
        &self,
        id: impl Into<String>,
        streaming_service: StreamingService,
        event: impl Into<String>,
        payload: Value,
    ) {
        self.state
            .subscriptions()
            .add(id, streaming_service, event, payload);
    }

    /// Look up a subscription
    pub fn get_subscription(&self, id: &str) -> Option<Subscription> {
        self.state.subscriptions().get(id)
    }

    /// Remove a subscription that must exist
    pub fn remove_subscription(&self, id: &str) -> Result<Subscription, CoreError> {
        self.state.subscriptions().remove(id)
    }

    /// Ask the broker to drop every subscription of this app
    pub async fn clear_subscriptions_synapse(&self) -> bool {
        teardown::clear_all_subscriptions(self.runtime.http.as_ref(), &self.config, self.app_id())
            .await
    }

    /// Unsubscribe every registered subscription from its service
    pub async fn unsubscribe_all(&self) -> UnsubscribeReport {
        teardown::unsubscribe_all(self.runtime.http.as_ref(), &self.config, &self.state).await
    }

    /// Tear the application down
    ///
    /// Clears subscriptions with the broker, then unsubscribes each one from
    /// its service whatever the broker said, then empties the registry.
    pub async fn destroy(&self) -> TeardownReport {
        let cleared_all = self.clear_subscriptions_synapse().await;
        let unsubscribe = self.unsubscribe_all().await;
        self.state.subscriptions().clear();

        info!(
            app_id = %self.app_id(),
            cleared_all,
            attempted = unsubscribe.attempted,
            failed = unsubscribe.failed,
            skipped = unsubscribe.skipped,
            "App destroyed"
        );

        TeardownReport {
            cleared_all,
            unsubscribe,
        }
    }
}
