//! Tool registry and the default sandbox tools.
//!
//! A [`RegisteredTool`] pairs a [`ToolDefinition`] (what the model sees)
//! with a [`ToolExecutor`] (what runs against the execution environment).
//! The registry is a plain name -> tool map; it is read-only while a
//! session is processing input.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::execution::LocalExecutionEnvironment;
use crate::request::ToolDefinition;

mod apply_patch;
mod edit_file;
mod glob;
mod grep;
mod read_file;
mod shell;
mod write_file;

pub use apply_patch::apply_patch_tool;
pub use edit_file::edit_file_tool;
pub use glob::glob_tool;
pub use grep::grep_tool;
pub use read_file::read_file_tool;
pub use shell::shell_tool;
pub use write_file::write_file_tool;

/// Async tool executor over `(arguments, environment)`.
pub type ToolExecutor = Arc<
    dyn for<'a> Fn(
            Map<String, Value>,
            &'a LocalExecutionEnvironment,
        ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>
        + Send
        + Sync,
>;

/// A tool definition together with its executor.
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub executor: ToolExecutor,
}

/// Name-keyed dispatcher for registered tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: RegisteredTool) {
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    pub fn unregister(&mut self, name: &str) {
        self.tools.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Definitions for all registered tools, in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    /// Execute a tool by name. Unknown names fail with an invalid-tool
    /// error; executor errors propagate as-is.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        env: &LocalExecutionEnvironment,
    ) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::InvalidToolCall(format!("Unknown tool: {name}")))?;
        (tool.executor)(arguments, env).await
    }
}

/// Extract a required string argument.
pub(crate) fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidToolCall(format!("missing required argument: {key}")))
}
