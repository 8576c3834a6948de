//! Glob tool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::execution::LocalExecutionEnvironment;
use crate::request::ToolDefinition;
use crate::tools::{RegisteredTool, required_str};

fn execute<'a>(
    arguments: Map<String, Value>,
    env: &'a LocalExecutionEnvironment,
) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
    Box::pin(async move {
        let pattern = required_str(&arguments, "pattern")?;
        let path = arguments
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or(".");
        let matches = env.glob(pattern, path)?;
        Ok(matches.join("\n"))
    })
}

pub fn glob_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "glob",
            "Find files matching a glob pattern.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                },
                "required": ["pattern"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
