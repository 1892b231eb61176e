use crate::domain::app_state::AppState;
use crate::CoreError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Method tag of a line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LineMethod {
    /// Invoke `service.command`
    Execute,
    /// Assign a value
    Set,
    /// Conditional block
    If,
    /// Alternative branch of a conditional
    Elif,
    /// Fallback branch of a conditional
    Else,
    /// Iterate a block over a collection
    For,
    /// Repeat a block while a condition holds
    While,
    /// Run a nested story or function
    Run,
    /// Event handler block of a streaming service
    When,
    /// Define a function block
    Function,
    /// Call a function
    Call,
    /// Leave the enclosing story or function
    Return,
    /// Leave the enclosing loop
    Break,
    /// Any method this runtime does not know about
    Other(String),
}

impl From<String> for LineMethod {
    fn from(method: String) -> Self {
        match method.as_str() {
            "execute" => LineMethod::Execute,
            "set" => LineMethod::Set,
            "if" => LineMethod::If,
            "elif" => LineMethod::Elif,
            "else" => LineMethod::Else,
            "for" => LineMethod::For,
            "while" => LineMethod::While,
            "run" => LineMethod::Run,
            "when" => LineMethod::When,
            "function" => LineMethod::Function,
            "call" => LineMethod::Call,
            "return" => LineMethod::Return,
            "break" => LineMethod::Break,
            _ => LineMethod::Other(method),
        }
    }
}

impl From<LineMethod> for String {
    fn from(method: LineMethod) -> Self {
        method.as_str().to_string()
    }
}

impl LineMethod {
    /// The wire name of this method
    pub fn as_str(&self) -> &str {
        match self {
            LineMethod::Execute => "execute",
            LineMethod::Set => "set",
            LineMethod::If => "if",
            LineMethod::Elif => "elif",
            LineMethod::Else => "else",
            LineMethod::For => "for",
            LineMethod::While => "while",
            LineMethod::Run => "run",
            LineMethod::When => "when",
            LineMethod::Function => "function",
            LineMethod::Call => "call",
            LineMethod::Return => "return",
            LineMethod::Break => "break",
            LineMethod::Other(method) => method,
        }
    }
}

impl fmt::Display for LineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Line id, unique within the story
    pub ln: String,

    /// Method tag
    pub method: LineMethod,

    /// Next line in source order, `None` at the end of the story
    #[serde(default)]
    pub next: Option<String>,

    /// First line of the nested block, for block-owning lines
    #[serde(default)]
    pub enter: Option<String>,

    /// First line after the nested block
    #[serde(default)]
    pub exit: Option<String>,

    /// Line owning the block this line belongs to
    #[serde(default)]
    pub parent: Option<String>,

    /// Service name for `execute` lines
    #[serde(default)]
    pub service: Option<String>,

    /// Command name for `execute` lines
    #[serde(default)]
    pub command: Option<String>,

    /// Names bound by this line (loop variables, outputs)
    #[serde(default)]
    pub output: Option<Vec<String>>,

    /// Method-specific payload
    #[serde(default)]
    pub args: Value,
}

impl Line {
    /// Create a bare line with the given id and method
    pub fn new(ln: impl Into<String>, method: LineMethod) -> Self {
        Self {
            ln: ln.into(),
            method,
            next: None,
            enter: None,
            exit: None,
            parent: None,
            service: None,
            command: None,
            output: None,
            args: Value::Null,
        }
    }

    /// Whether this line owns a nested block
    #[inline]
    pub fn is_block_owner(&self) -> bool {
        self.enter.is_some()
    }

    /// Line the interpreter moves to after this one has been fully executed.
    /// Block owners skip over their children.
    pub fn successor(&self) -> Option<&str> {
        if self.is_block_owner() {
            self.exit.as_deref()
        } else {
            self.next.as_deref()
        }
    }

    /// First name bound by this line
    pub fn first_output(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|names| names.first())
            .map(String::as_str)
    }
}

/// Compiled line graph of one story
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryDefinition {
    /// Lines keyed by id
    #[serde(default)]
    pub tree: HashMap<String, Line>,

    /// Id of the first line, `None` for an empty story
    #[serde(default)]
    pub entrypoint: Option<String>,
}

impl StoryDefinition {
    /// Id of the first line
    pub fn first_line(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Look up a line by id
    pub fn line(&self, id: &str) -> Option<&Line> {
        self.tree.get(id)
    }

    /// Validate the line graph
    ///
    /// Every pointer must name a line of this story and walking `next` from
    /// the first line must terminate. The `enter` and `exit` of every line on
    /// that walk must land later on it, so the interpreter only ever moves
    /// forward through lines bootstrap has visited.
    pub fn validate(&self, story_name: &str) -> Result<(), CoreError> {
        for (id, line) in &self.tree {
            if id != &line.ln {
                return Err(CoreError::ValidationError(format!(
                    "{}: line keyed {} declares id {}",
                    story_name, id, line.ln
                )));
            }

            let pointers = [
                ("next", &line.next),
                ("enter", &line.enter),
                ("exit", &line.exit),
                ("parent", &line.parent),
            ];
            for (field, target) in pointers {
                if let Some(target) = target {
                    if !self.tree.contains_key(target) {
                        return Err(CoreError::ValidationError(format!(
                            "{}: line {} has {} pointing to missing line {}",
                            story_name, id, field, target
                        )));
                    }
                }
            }
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut sequence = Vec::new();
        let mut current = self.first_line();
        if let Some(first) = current {
            if !self.tree.contains_key(first) {
                return Err(CoreError::ValidationError(format!(
                    "{}: first line {} does not exist",
                    story_name, first
                )));
            }
        }

        while let Some(id) = current {
            if positions.insert(id, sequence.len()).is_some() {
                return Err(CoreError::ValidationError(format!(
                    "{}: cycle detected in line sequence at line {}",
                    story_name, id
                )));
            }
            sequence.push(id);
            current = self.tree.get(id).and_then(|line| line.next.as_deref());
        }

        // Block pointers must jump forward along `next`, otherwise the
        // interpreter could revisit a line or run one bootstrap never saw
        for (position, id) in sequence.iter().enumerate() {
            let Some(line) = self.tree.get(*id) else {
                continue;
            };
            for (field, target) in [("enter", &line.enter), ("exit", &line.exit)] {
                let Some(target) = target.as_deref() else {
                    continue;
                };
                match positions.get(target) {
                    Some(&target_position) if target_position > position => {}
                    Some(_) => {
                        return Err(CoreError::ValidationError(format!(
                            "{}: line {} has {} pointing back to line {}",
                            story_name, id, field, target
                        )))
                    }
                    None => {
                        return Err(CoreError::ValidationError(format!(
                            "{}: line {} has {} pointing to line {} outside the line sequence",
                            story_name, id, field, target
                        )))
                    }
                }
            }
        }

        Ok(())
    }
}

/// Runtime handle on a story of a running application
///
/// Holds the shared line graph, the owning application's state and the
/// variable scope used by the interpreter while the story executes.
#[derive(Debug)]
pub struct Story {
    name: String,
    definition: Arc<StoryDefinition>,
    app: Arc<AppState>,
    scope: DashMap<String, Value>,
}

impl Story {
    /// Create a story handle with an empty variable scope
    pub fn new(name: impl Into<String>, definition: Arc<StoryDefinition>, app: Arc<AppState>) -> Self {
        Self {
            name: name.into(),
            definition,
            app,
            scope: DashMap::new(),
        }
    }

    /// Story name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State of the application this story belongs to
    pub fn app(&self) -> &AppState {
        &self.app
    }

    /// Id of the first line
    pub fn first_line(&self) -> Option<&str> {
        self.definition.first_line()
    }

    /// Look up a line, failing if the graph points at a line that does not exist
    pub fn line(&self, id: &str) -> Result<&Line, CoreError> {
        self.definition
            .line(id)
            .ok_or_else(|| CoreError::LineNotFound(format!("{} in story {}", id, self.name)))
    }

    /// Bind a variable in the story scope
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.scope.insert(name.into(), value);
    }

    /// Read a variable from the story scope
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.scope.get(name).map(|value| value.clone())
    }
}
