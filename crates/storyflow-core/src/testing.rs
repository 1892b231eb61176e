//! In-memory collaborators for tests
//!
//! Available with the `testing` feature.

use crate::application::interpreter;
use crate::application::runtime_interface::{
    ContainerRuntime, HttpClient, HttpRequest, HttpResponse, LineDispatcher,
};
use crate::domain::app_state::AppState;
use crate::domain::sentinel::LineOutcome;
use crate::domain::service::ServiceCatalog;
use crate::domain::story::{Line, Story};
use crate::types::CaseInsensitiveMap;
use crate::CoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Application state with fixed identity around the given catalog
pub fn app_state(services: ServiceCatalog) -> AppState {
    AppState::new(
        "app-1",
        "my-app",
        1,
        "owner-1",
        CaseInsensitiveMap::new(),
        services,
        "storyflow.app",
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What [`ScriptedDispatcher`] does for a line
#[derive(Debug, Clone)]
pub enum LineAction {
    /// Produce this value
    Data(Value),
    /// Emit `Break`
    Break,
    /// Emit `Return`
    Return(Option<Value>),
    /// Fail with this error
    Fail(CoreError),
    /// Run the line's block once
    Block,
    /// Run the line's block once per item
    ForEach(Vec<Value>),
    /// Run the line's block this many times through a `while` condition
    Repeat(usize),
}

/// Line dispatcher driven by a per-line script
///
/// Unscripted lines produce no data, except block owners which run their
/// block once.
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    actions: HashMap<String, LineAction>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedDispatcher {
    /// Create a dispatcher with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of line `ln`
    pub fn on(mut self, ln: &str, action: LineAction) -> Self {
        self.actions.insert(ln.to_string(), action);
        self
    }

    /// `(story, line)` pairs in dispatch order
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }

    /// Dispatched line ids in order
    pub fn lines(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(_, ln)| ln.clone()).collect()
    }

    /// Names of stories in the order their first line was dispatched
    pub fn stories(&self) -> Vec<String> {
        let mut stories: Vec<String> = Vec::new();
        for (story, _) in lock(&self.calls).iter() {
            if stories.last() != Some(story) {
                stories.push(story.clone());
            }
        }
        stories
    }
}

#[async_trait]
impl LineDispatcher for ScriptedDispatcher {
    async fn dispatch(&self, story: &Story, line: &Line) -> Result<LineOutcome, CoreError> {
        lock(&self.calls).push((story.name().to_string(), line.ln.clone()));

        let action = match self.actions.get(&line.ln) {
            Some(action) => action.clone(),
            None if line.is_block_owner() => LineAction::Block,
            None => return Ok(LineOutcome::default()),
        };

        match action {
            LineAction::Data(value) => Ok(LineOutcome::data(value)),
            LineAction::Break => Ok(LineOutcome::Break),
            LineAction::Return(value) => Ok(LineOutcome::Return(value)),
            LineAction::Fail(error) => Err(error),
            LineAction::Block => interpreter::execute_block(self, story, line).await,
            LineAction::ForEach(items) => interpreter::for_each(self, story, line, items).await,
            LineAction::Repeat(times) => {
                let mut remaining = times;
                interpreter::loop_while(self, story, line, move |_| {
                    if remaining == 0 {
                        return Ok(false);
                    }
                    remaining -= 1;
                    Ok(true)
                })
                .await
            }
        }
    }
}

/// A container start seen by [`RecordingContainerRuntime`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCall {
    /// Story the line belongs to
    pub story: String,
    /// Line id
    pub line: String,
    /// Service name
    pub service: String,
    /// Command name
    pub command: String,
}

/// Container runtime that records starts instead of scheduling anything
#[derive(Debug, Default)]
pub struct RecordingContainerRuntime {
    failures: HashMap<String, CoreError>,
    starts: Mutex<Vec<StartCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingContainerRuntime {
    /// Create a runtime where every start succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start of `service` fail with `error`
    pub fn fail_on(mut self, service: &str, error: CoreError) -> Self {
        self.failures.insert(service.to_string(), error);
        self
    }

    /// Recorded starts in call order
    pub fn starts(&self) -> Vec<StartCall> {
        lock(&self.starts).clone()
    }

    /// Service names of recorded starts
    pub fn started_services(&self) -> Vec<String> {
        lock(&self.starts).iter().map(|s| s.service.clone()).collect()
    }

    /// Number of starts in progress right now
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of starts observed in progress at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for RecordingContainerRuntime {
    async fn start_container(&self, story: &Story, line: &Line) -> Result<(), CoreError> {
        let service = line.service.clone().unwrap_or_default();
        lock(&self.starts).push(StartCall {
            story: story.name().to_string(),
            line: line.ln.clone(),
            service: service.clone(),
            command: line.command.clone().unwrap_or_default(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        // Let sibling starts make progress before this one completes
        tokio::task::yield_now().await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failures.get(&service) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// HTTP client answering from per-URL scripts
///
/// Each scripted result is consumed by one call. Once a URL's script is
/// exhausted it answers `200` with an empty body.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<HttpResponse, CoreError>>>>,
    requests: Mutex<Vec<(u32, HttpRequest)>>,
}

impl ScriptedHttpClient {
    /// Create a client that answers `200` to everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with `status` for `url`
    pub fn respond(self, url: &str, status: u16) -> Self {
        self.push(url, Ok(HttpResponse::new(status, "")))
    }

    /// Queue a transport failure for `url`
    pub fn fail(self, url: &str, error: CoreError) -> Self {
        self.push(url, Err(error))
    }

    fn push(self, url: &str, result: Result<HttpResponse, CoreError>) -> Self {
        lock(&self.scripts)
            .entry(url.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Requests received, with the attempt budget each was sent with
    pub fn requests(&self) -> Vec<(u32, HttpRequest)> {
        lock(&self.requests).clone()
    }

    /// URLs requested, in order
    pub fn urls(&self) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .map(|(_, request)| request.url.clone())
            .collect()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn fetch_with_retry(
        &self,
        max_attempts: u32,
        request: HttpRequest,
    ) -> Result<HttpResponse, CoreError> {
        let scripted = lock(&self.scripts)
            .get_mut(&request.url)
            .and_then(|queue| queue.pop_front());
        lock(&self.requests).push((max_attempts, request));

        scripted.unwrap_or_else(|| Ok(HttpResponse::new(200, "")))
    }
}
