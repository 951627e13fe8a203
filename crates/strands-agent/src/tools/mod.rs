//! Tool capabilities the model can call.
//!
//! A tool is a named capability with a JSON input schema. The registry
//! validates model-supplied arguments against that schema before running
//! the capability, and turns capability failures into error results the
//! model can read.

mod builtin;
mod calculator;
mod current_time;
mod registry;
mod schema;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::ToolDefinition;
use crate::ToolOutput;

pub use builtin::{builtin_names, register_builtins};
pub use calculator::{evaluate, Calculator};
pub use current_time::CurrentTime;
pub use registry::ToolRegistry;
pub use schema::{check_schema, validate_arguments};

/// Error raised by a tool capability. Reported back to the model as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An executable capability. Arguments have already been validated
/// against the tool's declared schema when `call` runs.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(&self, arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

/// Declaration of one tool: its name, what it does, the shape of its
/// arguments, and the capability that runs it.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub capability: Arc<dyn Tool>,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        capability: impl Tool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            capability: Arc::new(capability),
        }
    }

    /// The provider-facing declaration, without the capability.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}
