//! End-to-end lifecycle of an application: load, bootstrap, subscribe, destroy.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storyflow_core::application::interpreter;
use storyflow_core::testing::{
    LineAction, RecordingContainerRuntime, ScriptedDispatcher, ScriptedHttpClient,
};
use storyflow_core::{
    App, AppConfig, AppDefinition, AppRuntime, CoreError, Line, LineDispatcher, LineMethod,
    LineOutcome, Story, StreamingService, UnsubscribeReport,
};
use tempfile::TempDir;

fn write(dir: &Path, file: &str, value: Value) {
    let path = dir.join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn services() -> Value {
    json!({
        "db": {"config": {"actions": {"query": {}}}},
        "mailer": {"config": {"actions": {"send": {"run": {"command": ["send"]}}}}},
        "http": {"config": {"actions": {"server": {"events": {
            "listen": {"http": {"port": 8000, "unsubscribe": {"path": "/unsub"}}},
            "ping": {"http": {"port": 8000}}
        }}}}}
    })
}

fn stories() -> Value {
    json!({
        "stories": {
            "orders.story": {
                "entrypoint": "1",
                "tree": {
                    "1": {"ln": "1", "method": "execute", "service": "db", "command": "query", "next": "2", "output": ["rows"]},
                    "2": {"ln": "2", "method": "execute", "service": "mailer", "command": "send"}
                }
            },
            "reports.story": {
                "entrypoint": "10",
                "tree": {
                    "10": {"ln": "10", "method": "execute", "service": "db", "command": "query", "next": "11"},
                    "11": {"ln": "11", "method": "execute", "service": "log", "command": "info"}
                }
            }
        },
        "entrypoint": ["reports.story", "orders.story"]
    })
}

fn release() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "config/stories.json", stories());
    write(dir.path(), "config/services.json", services());
    write(dir.path(), "config/environment.json", json!({"SMTP_HOST": "mail", "nested": {"a": 1}}));
    dir
}

fn definition(dir: &TempDir) -> AppDefinition {
    let mut definition = AppDefinition::load_dir(dir.path(), "app-1", "orders", 7, "owner-1").unwrap();
    definition.services.register_internal("log", "info");
    definition
}

fn streaming_service(host: &str) -> StreamingService {
    StreamingService {
        name: "http".to_string(),
        command: "server".to_string(),
        container_name: host.to_string(),
        hostname: host.to_string(),
    }
}

#[tokio::test]
async fn test_bootstrap_starts_each_service_once_then_runs_entrypoints() {
    let dir = release();
    let dispatcher = Arc::new(ScriptedDispatcher::new());
    let containers = Arc::new(RecordingContainerRuntime::new());
    let runtime = AppRuntime::new(
        dispatcher.clone(),
        containers.clone(),
        Arc::new(ScriptedHttpClient::new()),
    );
    let app = App::new(definition(&dir), AppConfig::default(), runtime).unwrap();

    app.bootstrap().await.unwrap();

    // db.query is shared by both stories, mailer.send runs its own container,
    // log.info is internal
    let mut started = containers.started_services();
    started.sort();
    assert_eq!(started, vec!["db", "mailer"]);

    assert_eq!(dispatcher.stories(), vec!["reports.story", "orders.story"]);
    assert_eq!(app.state().context.hostname, "orders.storyflow.app");
    assert!(app.state().context.secrets.contains_key("smtp_host"));
    assert!(!app.state().context.secrets.contains_key("nested"));
}

#[tokio::test]
async fn test_failed_container_start_prevents_story_execution() {
    let dir = release();
    let dispatcher = Arc::new(ScriptedDispatcher::new());
    let containers = Arc::new(
        RecordingContainerRuntime::new()
            .fail_on("mailer", CoreError::ContainerStartError("mailer: crash loop".to_string())),
    );
    let runtime = AppRuntime::new(dispatcher.clone(), containers.clone(), Arc::new(ScriptedHttpClient::new()));
    let app = App::new(definition(&dir), AppConfig::default(), runtime).unwrap();

    let err = app.bootstrap().await.unwrap_err();

    assert_eq!(err, CoreError::ContainerStartError("mailer: crash loop".to_string()));
    assert_eq!(containers.in_flight(), 0);
    assert!(dispatcher.calls().is_empty());
}

#[tokio::test]
async fn test_entrypoint_failure_is_surfaced() {
    let dir = release();
    let dispatcher = Arc::new(
        ScriptedDispatcher::new()
            .on("10", LineAction::Fail(CoreError::StoryExecutionError("db timeout".to_string()))),
    );
    let runtime = AppRuntime::new(
        dispatcher.clone(),
        Arc::new(RecordingContainerRuntime::new()),
        Arc::new(ScriptedHttpClient::new()),
    );
    let app = App::new(definition(&dir), AppConfig::default(), runtime).unwrap();

    let err = app.bootstrap().await.unwrap_err();

    assert_eq!(err, CoreError::StoryExecutionError("db timeout".to_string()));
    assert_eq!(dispatcher.stories(), vec!["reports.story"]);
}

/// Dispatcher that asserts every container was started before any line ran
struct StartedFirst {
    containers: Arc<RecordingContainerRuntime>,
    dispatched: AtomicUsize,
}

#[async_trait]
impl LineDispatcher for StartedFirst {
    async fn dispatch(&self, _story: &Story, _line: &Line) -> Result<LineOutcome, CoreError> {
        assert_eq!(self.containers.starts().len(), 2);
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        Ok(LineOutcome::default())
    }
}

#[tokio::test]
async fn test_services_are_live_before_stories_run() {
    let dir = release();
    let containers = Arc::new(RecordingContainerRuntime::new());
    let dispatcher = Arc::new(StartedFirst {
        containers: containers.clone(),
        dispatched: AtomicUsize::new(0),
    });
    let runtime = AppRuntime::new(dispatcher.clone(), containers, Arc::new(ScriptedHttpClient::new()));
    let app = App::new(definition(&dir), AppConfig::default(), runtime).unwrap();

    app.bootstrap().await.unwrap();

    assert_eq!(dispatcher.dispatched.load(Ordering::SeqCst), 4);
}

/// Dispatcher that iterates `for` lines over their JSON array args
struct LoopingDispatcher;

#[async_trait]
impl LineDispatcher for LoopingDispatcher {
    async fn dispatch(&self, story: &Story, line: &Line) -> Result<LineOutcome, CoreError> {
        match &line.method {
            LineMethod::For => {
                let items = line.args.as_array().cloned().unwrap_or_default();
                interpreter::for_each(self, story, line, items).await
            }
            LineMethod::If => interpreter::execute_block(self, story, line).await,
            LineMethod::Break => Ok(LineOutcome::Break),
            LineMethod::Return => Ok(LineOutcome::Return(Some(line.args.clone()))),
            LineMethod::Set => {
                if let Some(name) = line.first_output() {
                    let count = story.variable(name).and_then(|v| v.as_u64()).unwrap_or(0);
                    story.set_variable(name, json!(count + 1));
                }
                Ok(LineOutcome::default())
            }
            _ => Ok(LineOutcome::default()),
        }
    }
}

#[tokio::test]
async fn test_break_and_return_through_nested_blocks() {
    // for item in [1, 2, 3]:
    //     count += 1
    //     if ...:
    //         break
    // count += 1
    // for item in [1, 2]:
    //     if ...:
    //         return "early"
    // count += 1
    let story_json = json!({
        "entrypoint": "1",
        "tree": {
            "1": {"ln": "1", "method": "for", "next": "2", "enter": "2", "exit": "5", "output": ["item"], "args": [1, 2, 3]},
            "2": {"ln": "2", "method": "set", "next": "3", "parent": "1", "output": ["count"]},
            "3": {"ln": "3", "method": "if", "next": "4", "enter": "4", "exit": "5", "parent": "1"},
            "4": {"ln": "4", "method": "break", "next": "5", "parent": "3"},
            "5": {"ln": "5", "method": "set", "next": "6", "output": ["count"]},
            "6": {"ln": "6", "method": "for", "next": "7", "enter": "7", "exit": "9", "output": ["item"], "args": [1, 2]},
            "7": {"ln": "7", "method": "if", "next": "8", "enter": "8", "exit": "9", "parent": "6"},
            "8": {"ln": "8", "method": "return", "next": "9", "parent": "7", "args": "early"},
            "9": {"ln": "9", "method": "set", "output": ["count"]}
        }
    });

    let mut definition = AppDefinition::new("app-1", "loops", 1, "owner-1");
    definition.stories = serde_json::from_value(json!({
        "stories": {"loops.story": story_json},
        "entrypoint": ["loops.story"]
    }))
    .unwrap();
    let runtime = AppRuntime::new(
        Arc::new(LoopingDispatcher),
        Arc::new(RecordingContainerRuntime::new()),
        Arc::new(ScriptedHttpClient::new()),
    );
    let app = App::new(definition, AppConfig::default(), runtime).unwrap();
    let story = app.story("loops.story").unwrap();

    let result = interpreter::run_story(&LoopingDispatcher, &story).await.unwrap();

    // Break left the first loop after one pass; the line after it still ran.
    // Return left both the `if` and the second loop and ended the story.
    assert_eq!(result, Some(json!("early")));
    assert_eq!(story.variable("count"), Some(json!(2)));
    assert_eq!(story.variable("item"), Some(json!(1)));
}

#[tokio::test]
async fn test_destroy_is_best_effort() {
    let dir = release();
    let config = AppConfig::default();
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond(&config.synapse_clear_all_url(), 500)
            .respond("http://host-b:8000/unsub", 503)
            .fail(
                "http://host-c:8000/unsub",
                CoreError::HttpTransportError("connection reset".to_string()),
            ),
    );
    let runtime = AppRuntime::new(
        Arc::new(ScriptedDispatcher::new()),
        Arc::new(RecordingContainerRuntime::new()),
        http.clone(),
    );
    let app = App::new(definition(&dir), config, runtime).unwrap();

    for host in ["host-a", "host-b", "host-c", "host-d"] {
        app.add_subscription(
            format!("sub-{}", host),
            streaming_service(host),
            "listen",
            json!({"sub_body": {"host": host}}),
        );
    }
    app.add_subscription("sub-ping", streaming_service("host-e"), "ping", json!({}));

    let report = app.destroy().await;

    assert!(!report.cleared_all);
    assert_eq!(
        report.unsubscribe,
        UnsubscribeReport {
            attempted: 4,
            succeeded: 2,
            failed: 2,
            skipped: 1,
        }
    );

    let urls = http.urls();
    assert_eq!(urls[0], "http://synapse:80/clear_all");
    assert_eq!(urls.len(), 5);
    assert!(!urls.iter().any(|url| url.contains("host-e")));
    assert!(app.state().subscriptions().is_empty());
}

#[tokio::test]
async fn test_subscription_registry_through_app() {
    let dir = release();
    let runtime = AppRuntime::new(
        Arc::new(ScriptedDispatcher::new()),
        Arc::new(RecordingContainerRuntime::new()),
        Arc::new(ScriptedHttpClient::new()),
    );
    let app = App::new(definition(&dir), AppConfig::default(), runtime).unwrap();

    assert!(app.get_subscription("sub-1").is_none());

    app.add_subscription("sub-1", streaming_service("host-a"), "listen", json!({"sub_body": 1}));
    assert_eq!(app.get_subscription("sub-1").unwrap().event, "listen");

    app.remove_subscription("sub-1").unwrap();
    assert!(app.get_subscription("sub-1").is_none());
    assert_eq!(
        app.remove_subscription("sub-1").unwrap_err(),
        CoreError::SubscriptionNotFound("sub-1".to_string())
    );
}
