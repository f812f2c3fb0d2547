//! Core data models for the skills-rs library
//!
//! Call requests as sent by the model provider and the outcome handed back to
//! the conversation loop.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SkillError;

/// Identifier correlating a call request with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for CallId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A function call request.
///
/// `arguments` is a JSON-encoded object *string*, the way providers send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CallId>,
    pub name: String,
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build a call from already-structured arguments.
    pub fn from_value(name: impl Into<String>, arguments: &Value) -> Self {
        Self::new(name, arguments.to_string())
    }

    pub fn with_id(mut self, id: CallId) -> Self {
        self.id = Some(id);
        self
    }

    /// Parse the argument string.
    pub fn parse_arguments(&self) -> Result<Value, SkillError> {
        serde_json::from_str(&self.arguments).map_err(|source| SkillError::InvalidJson {
            arguments: self.arguments.clone(),
            source,
        })
    }
}

/// Result of dispatching a [`FunctionCall`], after the function's post-call
/// policy has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CallId>,
    pub name: String,
    /// What to report back; `None` when the return value is not saved.
    pub content: Option<String>,
    /// The content is the final answer rather than a function result.
    #[serde(default)]
    pub interpret_as_response: bool,
}

impl InvocationOutcome {
    pub fn is_final(&self) -> bool {
        self.interpret_as_response
    }
}
