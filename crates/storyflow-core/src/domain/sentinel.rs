//! Control-flow outcome of executing a single line
//!
//! Loops and conditionals need to tell "this block ran and produced data"
//! apart from "unwind to an enclosing construct". Errors travel through
//! `Result`; unwinding travels through [`LineOutcome`].

use serde_json::Value;

/// Result of executing one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Ordinary result, possibly empty
    Data(Option<Value>),
    /// Stop the innermost enclosing loop
    Break,
    /// Unwind every enclosing block up to the story boundary
    Return(Option<Value>),
}

impl Default for LineOutcome {
    fn default() -> Self {
        LineOutcome::Data(None)
    }
}

impl LineOutcome {
    /// Ordinary result carrying a value
    #[inline]
    pub fn data(value: Value) -> Self {
        LineOutcome::Data(Some(value))
    }

    /// Whether this outcome is a control signal (`Break` or `Return`)
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        matches!(self, LineOutcome::Break | LineOutcome::Return(_))
    }

    /// Whether this outcome is ordinary data (including the absence of data)
    #[inline]
    pub fn is_data(&self) -> bool {
        !self.is_sentinel()
    }

    /// Take the carried value, if any
    pub fn into_data(self) -> Option<Value> {
        match self {
            LineOutcome::Data(value) | LineOutcome::Return(value) => value,
            LineOutcome::Break => None,
        }
    }
}

impl From<Value> for LineOutcome {
    fn from(value: Value) -> Self {
        LineOutcome::Data(Some(value))
    }
}

impl From<Option<Value>> for LineOutcome {
    fn from(value: Option<Value>) -> Self {
        LineOutcome::Data(value)
    }
}
