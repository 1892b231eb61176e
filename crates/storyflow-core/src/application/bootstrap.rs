//! Application bootstrap: container start fan-out and entrypoint execution

use crate::application::interpreter::run_story;
use crate::application::runtime_interface::{ContainerRuntime, LineDispatcher};
use crate::domain::service::Chain;
use crate::domain::story::{Line, LineMethod, Story};
use crate::CoreError;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Start the container behind every `execute` line of every story
///
/// All chains are resolved before anything is started, so a catalog error
/// never leaves a partial set of containers behind. Starts then run
/// concurrently and every one of them finishes before any outcome is
/// inspected; the first failure in launch order is returned.
pub async fn start_services(
    containers: &dyn ContainerRuntime,
    stories: &[Story],
) -> Result<(), CoreError> {
    let mut pending: Vec<(&Story, &Line, Chain)> = Vec::new();
    let mut reusable_services = HashSet::new();

    for story in stories {
        let services = story.app().services();
        let mut current = story.first_line();

        while let Some(id) = current {
            let line = story.line(id)?;
            current = line.next.as_deref();

            if line.method != LineMethod::Execute {
                continue;
            }

            let chain = services.resolve_chain(story, line)?;

            // Best effort only: the scheduler tolerates duplicate starts
            if containers.is_service_reusable(story, line)
                && !reusable_services.insert(chain.service.name.clone())
            {
                debug!(
                    story = %story.name(),
                    line = %line.ln,
                    service = %chain.service.name,
                    "Reusable service already scheduled"
                );
                continue;
            }

            if services.is_internal(&chain.service.name, &chain.command.name) {
                continue;
            }

            pending.push((story, line, chain));
        }
    }

    info!(count = pending.len(), "Starting service containers");

    let starts = pending.into_iter().map(|(story, line, chain)| async move {
        let result = containers.start_container(story, line).await;
        (story, chain, result)
    });

    let results = futures::future::join_all(starts).await;

    for (story, chain, result) in results {
        if let Err(e) = result {
            error!(
                story = %story.name(),
                service = %chain.service.name,
                command = %chain.command.name,
                error = %e,
                "Failed to start service container"
            );
            return Err(e);
        }
    }

    Ok(())
}

/// Run the entrypoint stories one after another
///
/// The first failing story stops the run; its error is logged and returned
/// unchanged.
pub async fn run_stories(
    dispatcher: &dyn LineDispatcher,
    entrypoints: &[Story],
) -> Result<(), CoreError> {
    for story in entrypoints {
        if let Err(e) = run_story(dispatcher, story).await {
            error!(story = %story.name(), error = %e, "Failed to bootstrap story");
            return Err(e);
        }
        debug!(story = %story.name(), "Entrypoint story finished");
    }

    Ok(())
}
