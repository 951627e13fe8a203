//! Name-keyed registry of tool specs.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::ToolDefinition;
use crate::error::RegistryError;
use crate::{ToolCallRequest, ToolResult};

use super::schema::{check_schema, validate_arguments};
use super::ToolSpec;

/// Tools available to the model, in registration order.
///
/// Populated at startup and then shared read-only (behind an `Arc`) by
/// every session.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateTool(spec.name));
        }
        check_schema(&spec.input_schema).map_err(|reason| RegistryError::InvalidSchema {
            tool: spec.name.clone(),
            reason,
        })?;

        debug!(tool = %spec.name, "Registered tool");
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&ToolSpec, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.specs[i])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Provider-facing declarations for every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.specs.iter().map(ToolSpec::definition).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate the call's arguments and run the tool.
    ///
    /// Unknown tools and schema mismatches are returned as errors. Once the
    /// capability runs, any error or panic it raises comes back as a
    /// `ToolResult` with error status.
    pub async fn invoke(&self, call: &ToolCallRequest) -> Result<ToolResult, RegistryError> {
        let spec = self.resolve(&call.tool_name)?;

        // Some providers send `null` for tools declared without properties.
        let arguments = match &call.arguments {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };

        validate_arguments(&spec.input_schema, &arguments).map_err(|reason| {
            RegistryError::InvalidArguments {
                tool: spec.name.clone(),
                reason,
            }
        })?;

        let Value::Object(arguments) = arguments else {
            return Err(RegistryError::InvalidArguments {
                tool: spec.name.clone(),
                reason: "arguments must be a JSON object".into(),
            });
        };

        debug!(tool = %spec.name, call_id = %call.call_id, "Invoking tool");

        let outcome = AssertUnwindSafe(spec.capability.call(&arguments))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(output)) => ToolResult::ok(&call.call_id, output),
            Ok(Err(err)) => {
                warn!(tool = %spec.name, error = %err, "Tool returned an error");
                ToolResult::error(&call.call_id, err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = %spec.name, panic = %message, "Tool panicked");
                ToolResult::error(&call.call_id, format!("tool panicked: {message}"))
            }
        };
        Ok(result)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
