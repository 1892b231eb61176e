//! Line graph traversal
//!
//! These functions own the control-flow half of interpretation: which line
//! runs next, and how `Break` and `Return` unwind. What a line actually does
//! is left to the [`LineDispatcher`].

use crate::application::runtime_interface::LineDispatcher;
use crate::domain::sentinel::LineOutcome;
use crate::domain::story::{Line, Story};
use crate::CoreError;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

/// Execute a story from its first line to its terminal line
///
/// Returns the value carried by a `Return`, or `None` when the story ran off
/// its last line.
pub async fn run_story(
    dispatcher: &dyn LineDispatcher,
    story: &Story,
) -> Result<Option<Value>, CoreError> {
    let span = info_span!("story", story = %story.name());
    walk_story(dispatcher, story).instrument(span).await
}

async fn walk_story(
    dispatcher: &dyn LineDispatcher,
    story: &Story,
) -> Result<Option<Value>, CoreError> {
    let mut current = story.first_line();

    while let Some(id) = current {
        let line = story.line(id)?;
        debug!(line = %line.ln, method = %line.method, "Executing line");

        match dispatcher.dispatch(story, line).await? {
            LineOutcome::Return(value) => return Ok(value),
            LineOutcome::Break => {
                warn!(line = %line.ln, "Break outside of a loop ends the story");
                return Ok(None);
            }
            LineOutcome::Data(_) => current = line.successor(),
        }
    }

    Ok(None)
}

/// Execute the nested block of `owner`
///
/// Runs from `owner.enter` while lines still belong to `owner`. A sentinel
/// stops the block and is handed back to the caller untouched; otherwise the
/// last line's data is returned.
pub async fn execute_block(
    dispatcher: &dyn LineDispatcher,
    story: &Story,
    owner: &Line,
) -> Result<LineOutcome, CoreError> {
    let mut current = owner.enter.as_deref();
    let mut last = LineOutcome::default();

    while let Some(id) = current {
        let line = story.line(id)?;
        if line.parent.as_deref() != Some(owner.ln.as_str()) {
            break;
        }

        let outcome = dispatcher.dispatch(story, line).await?;
        if outcome.is_sentinel() {
            return Ok(outcome);
        }

        last = outcome;
        current = line.successor();
    }

    Ok(last)
}

/// Execute the block of `owner` once per item
///
/// Each item is bound to the owner's first output name before the block runs.
/// `Break` ends the loop and yields no data; `Return` is passed up.
pub async fn for_each<I>(
    dispatcher: &dyn LineDispatcher,
    story: &Story,
    owner: &Line,
    items: I,
) -> Result<LineOutcome, CoreError>
where
    I: IntoIterator<Item = Value>,
{
    for item in items {
        if let Some(name) = owner.first_output() {
            story.set_variable(name, item);
        }

        match execute_block(dispatcher, story, owner).await? {
            LineOutcome::Break => return Ok(LineOutcome::Data(None)),
            outcome @ LineOutcome::Return(_) => return Ok(outcome),
            LineOutcome::Data(_) => {}
        }
    }

    Ok(LineOutcome::Data(None))
}

/// Execute the block of `owner` while `condition` holds
///
/// The condition is evaluated before every iteration. Sentinels behave as in
/// [`for_each`].
pub async fn loop_while<F>(
    dispatcher: &dyn LineDispatcher,
    story: &Story,
    owner: &Line,
    mut condition: F,
) -> Result<LineOutcome, CoreError>
where
    F: FnMut(&Story) -> Result<bool, CoreError>,
{
    while condition(story)? {
        match execute_block(dispatcher, story, owner).await? {
            LineOutcome::Break => return Ok(LineOutcome::Data(None)),
            outcome @ LineOutcome::Return(_) => return Ok(outcome),
            LineOutcome::Data(_) => {}
        }
    }

    Ok(LineOutcome::Data(None))
}
